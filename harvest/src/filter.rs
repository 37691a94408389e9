//! Filtering normalized channel records.
//!
//! A [`FilterSet`] is an ordered list of [`Predicate`]s that must all hold. The subscriber and
//! video count predicates only look at the record. [`Predicate::ActiveWithin`] needs to know
//! when the channel last uploaded, which costs one API request per channel, so it is asked
//! through [`LatestActivity`] only for records that already passed every other predicate.

use crate::error::InvalidKeyword;
use crate::normalize::Record;
use eyre::Context;
use jiff::{SignedDuration, Timestamp};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// What to do with channels that hide their subscriber count.
///
/// Such channels report no `subscriberCount`, so their normalized count is `0` regardless of
/// their real audience.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum HiddenSubscribers {
    /// Always pass the subscriber range.
    #[default]
    Include,
    /// Always fail the subscriber range.
    Exclude,
    /// Treat the count as zero and check it against the range like any other.
    AsZero,
}

impl HiddenSubscribers {
    const KEYWORDS: &'static [&'static str] = &["include", "exclude", "zero"];
}

impl FromStr for HiddenSubscribers {
    type Err = InvalidKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(Self::Include),
            "exclude" => Ok(Self::Exclude),
            "zero" => Ok(Self::AsZero),
            _ => Err(InvalidKeyword {
                what: "hidden subscriber policy",
                given: s.to_string(),
                accepted: Self::KEYWORDS,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// `min <= subscribers < max`.
    SubscriberRange {
        min: u64,
        max: u64,
        hidden: HiddenSubscribers,
    },
    /// `total_videos >= n`.
    MinVideoCount(u64),
    /// The latest upload is no older than `now - window`.
    ActiveWithin(SignedDuration),
}

impl Predicate {
    pub fn active_within_days(days: u32) -> Self {
        Self::ActiveWithin(SignedDuration::from_hours(i64::from(days) * 24))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::SubscriberRange { .. } => "subscriber range",
            Self::MinVideoCount(_) => "video count",
            Self::ActiveWithin(_) => "recent activity",
        }
    }

    /// Evaluates predicates that only need the record; `None` for [`Self::ActiveWithin`].
    fn check_record(&self, record: &Record) -> Option<bool> {
        match *self {
            Self::SubscriberRange { min, max, hidden } => {
                let subscribers = record.get_u64("subscribers").unwrap_or(0);
                let in_range = (min..max).contains(&subscribers);
                if !record.get_bool("hidden_subscriber_count") {
                    return Some(in_range);
                }
                Some(match hidden {
                    HiddenSubscribers::Include => true,
                    HiddenSubscribers::Exclude => false,
                    HiddenSubscribers::AsZero => (min..max).contains(&0),
                })
            }
            Self::MinVideoCount(n) => Some(record.get_u64("total_videos").unwrap_or(0) >= n),
            Self::ActiveWithin(_) => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberRange { min, max, hidden } => {
                write!(f, "{min} <= subscribers < {max} (hidden: {hidden:?})")
            }
            Self::MinVideoCount(n) => write!(f, "at least {n} videos"),
            Self::ActiveWithin(window) => write!(f, "uploaded within {window:#}"),
        }
    }
}

/// Looks up when the entity behind a record last published something.
pub trait LatestActivity {
    /// `Ok(None)` if the entity has never uploaded.
    fn latest_activity(
        &self,
        record: &Record,
    ) -> impl Future<Output = eyre::Result<Option<Timestamp>>>;
}

/// An ordered conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
    now: Option<Timestamp>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Fixes the reference time for [`Predicate::ActiveWithin`]; defaults to the current time.
    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns the records for which every predicate holds, in their input order.
    ///
    /// Record-only predicates run first. Activity lookups happen one record at a time, and
    /// any lookup error aborts the whole filter.
    pub async fn apply(
        &self,
        records: Vec<Record>,
        activity: &impl LatestActivity,
    ) -> eyre::Result<Vec<Record>> {
        if self.predicates.is_empty() {
            return Ok(records);
        }

        let now = self.now.unwrap_or_else(Timestamp::now);
        let total = records.len();
        let mut dropped = vec![0usize; self.predicates.len()];
        let mut kept = Vec::with_capacity(records.len());

        'records: for record in records {
            for (i, predicate) in self.predicates.iter().enumerate() {
                if predicate.check_record(&record) == Some(false) {
                    dropped[i] += 1;
                    continue 'records;
                }
            }

            for (i, predicate) in self.predicates.iter().enumerate() {
                let Predicate::ActiveWithin(window) = *predicate else {
                    continue;
                };
                let latest = activity.latest_activity(&record).await.with_context(|| {
                    format!(
                        "look up latest upload of {}",
                        record.get("channel_id").unwrap_or("<unknown channel>")
                    )
                })?;
                if !is_recent(latest, now, window) {
                    dropped[i] += 1;
                    continue 'records;
                }
            }

            kept.push(record);
        }

        for (predicate, dropped) in self.predicates.iter().zip(dropped) {
            if dropped > 0 {
                tracing::info!(filter = predicate.name(), dropped, "records filtered out");
            }
        }
        tracing::info!(total, kept = kept.len(), "applied filters");

        Ok(kept)
    }
}

/// Whether `latest` falls within `window` of `now`. The boundary counts as recent.
fn is_recent(latest: Option<Timestamp>, now: Timestamp, window: SignedDuration) -> bool {
    let cutoff = now.checked_sub(window).unwrap_or(Timestamp::MIN);
    latest.is_some_and(|latest| latest >= cutoff)
}
