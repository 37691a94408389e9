//! Flattening raw API items into [`Record`]s.
//!
//! Each resource declares a [`Schema`]: an ordered list of [`Field`]s saying which column to
//! produce, where in the nested item to find its value, and what to put there when the value
//! is missing. Normalization never fails; absent fields get their declared default.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// How a looked-up value becomes a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The value as text.
    Text,
    /// The `YYYY-MM-DD` prefix of an RFC 3339 timestamp.
    Date,
    /// An ISO 8601 duration such as `PT1H2M3S`, as whole seconds.
    Duration,
    /// The value substituted for `{}` in a URL template.
    Url(&'static str),
    /// Always this value; the item is not consulted.
    Constant(&'static str),
}

/// One column of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub column: &'static str,
    /// Dotted paths into the item, tried in order.
    pub paths: &'static [&'static str],
    pub kind: FieldKind,
    /// Used when none of the paths resolve.
    pub default: &'static str,
}

impl Field {
    pub const fn new(column: &'static str, kind: FieldKind, paths: &'static [&'static str]) -> Self {
        Self {
            column,
            paths,
            kind,
            default: "",
        }
    }

    pub const fn text(column: &'static str, path: &'static [&'static str]) -> Self {
        Self::new(column, FieldKind::Text, path)
    }

    pub const fn or(mut self, default: &'static str) -> Self {
        self.default = default;
        self
    }

    /// Looks up the raw value for this field, ignoring explicit `null`s.
    pub fn lookup<'v>(&self, item: &'v Value) -> Option<&'v Value> {
        self.paths
            .iter()
            .find_map(|path| lookup(item, path).filter(|v| !v.is_null()))
    }

    pub fn extract(&self, item: &Value) -> String {
        if let FieldKind::Constant(value) = self.kind {
            return value.to_string();
        }

        let Some(value) = self.lookup(item) else {
            return self.default.to_string();
        };
        let text = render(value);
        match self.kind {
            FieldKind::Text | FieldKind::Constant(_) => text,
            FieldKind::Date => text.get(..10).unwrap_or(&text).to_string(),
            FieldKind::Duration => parse_duration_seconds(&text).to_string(),
            FieldKind::Url(template) => template.replace("{}", &text),
        }
    }
}

/// The declared shape of one resource's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    /// The column holding the resource's unique id, used for deduplication.
    pub id_column: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn normalize(&self, item: &Value) -> Record {
        let mut record = Record::with_capacity(self.fields.len());
        for field in self.fields {
            record.insert(field.column, field.extract(item));
        }
        record
    }

    /// The item's id as this schema sees it, if it has one.
    pub fn id_of(&self, item: &Value) -> Option<String> {
        self.field(self.id_column)
            .and_then(|f| f.lookup(item))
            .map(render)
    }
}

/// One flattened item: column name to value, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: IndexMap<String, String>,
}

impl Record {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Parses a count column. Sentinels like `NaN` or an empty string read as `None`.
    pub fn get_u64(&self, column: &str) -> Option<u64> {
        self.get(column)?.trim().parse().ok()
    }

    pub fn get_bool(&self, column: &str) -> bool {
        self.get(column) == Some("true")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Follows a dotted path such as `statistics.viewCount` into a JSON tree.
pub fn lookup<'v>(item: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(item, |node, key| node.get(key))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

static DURATION_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([DHMS])").expect("duration pattern is valid"));

/// Converts a compact ISO 8601 duration (`PT1H2M3S`, `PT45S`, `P1DT2H`, `PT`) to seconds.
///
/// Each component is read on its own and missing ones count as zero, so malformed input
/// degrades to whatever components could be found rather than an error.
pub fn parse_duration_seconds(duration: &str) -> u64 {
    // `M` is months before the `T` and minutes after it; we only honor days on the date side
    let (date, time) = duration.split_once('T').unwrap_or((duration, ""));

    let components = |part: &str, units: &'static [(&'static str, u64)]| -> u64 {
        DURATION_COMPONENT
            .captures_iter(part)
            .filter_map(|c| {
                let (_, scale) = units.iter().find(|(unit, _)| *unit == &c[2])?;
                let amount: u64 = c[1].parse().ok()?;
                Some(amount.saturating_mul(*scale))
            })
            .fold(0u64, u64::saturating_add)
    };

    components(date, &[("D", 86_400)])
        .saturating_add(components(time, &[("H", 3_600), ("M", 60), ("S", 1)]))
}
