use clap::{Args, Parser, Subcommand};
use eyre::Context;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use yt_harvest::config::Config;
use yt_harvest::youtube_api::playlist_items::extract_playlist_id;
use yt_harvest::youtube_api::{ResourceKind, SearchType};
use yt_harvest::{FilterSet, Harvester, HiddenSubscribers, Predicate, Record, YouTubeClient, export};

/// Pull YouTube data into CSV files.
///
/// Credentials come from YOUTUBE_API_KEY, or with --oauth from YOUTUBE_OAUTH_CLIENT_ID and
/// YOUTUBE_OAUTH_CLIENT_SECRET. A .env file in the working directory is read too.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Authenticate through the browser instead of with an API key
    #[arg(long, global = true)]
    oauth: bool,

    /// Stop paging once at least this many items have been fetched
    #[arg(long, global = true, value_name = "N", value_parser = parse_max_items)]
    max_items: Option<usize>,

    /// CSV file to write [default: <command>.csv]
    #[arg(long, short, global = true, value_name = "FILE")]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Details of channels, given as ids or channel links
    Channels {
        #[arg(required = true)]
        channels: Vec<String>,
        #[command(flatten)]
        filters: ChannelFilters,
    },
    /// Details of specific videos, or of every upload of a channel
    Videos {
        #[arg(long, conflicts_with = "ids", required_unless_present = "ids")]
        channel: Option<String>,
        ids: Vec<String>,
    },
    /// Details of every video in a playlist, given as an id or a playlist link
    Playlist {
        playlist: String,
        /// Write the playlist items themselves, without looking up each video
        #[arg(long)]
        items_only: bool,
    },
    /// Search results for a query
    Search {
        query: String,
        /// Comma-separated kinds of results: video, channel, playlist
        #[arg(long = "type", default_value = "video,channel,playlist")]
        search_type: SearchType,
        /// Look up full channel or video details for the results (needs a single --type)
        #[arg(long)]
        details: bool,
        #[command(flatten)]
        filters: ChannelFilters,
    },
    /// Top-level comments on a video
    Comments { video_id: String },
    /// Find the channel ids behind channel links
    Resolve {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Channels { .. } => "channels",
            Command::Videos { .. } => "videos",
            Command::Playlist { .. } => "playlist",
            Command::Search { .. } => "search",
            Command::Comments { .. } => "comments",
            Command::Resolve { .. } => "resolve",
        }
    }

    /// Catches option combinations that could never produce rows, before any quota is spent.
    fn check(&self) -> eyre::Result<()> {
        match self {
            Command::Channels { filters, .. } => {
                filters.filter_set()?;
            }
            Command::Search {
                search_type,
                details,
                filters,
                ..
            } => {
                if *details {
                    details_kind(search_type)?;
                }
                filters.filter_set()?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_max_items(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// The one kind `--details` looks up full records for.
fn details_kind(search_type: &SearchType) -> eyre::Result<ResourceKind> {
    match search_type.kinds() {
        [kind @ (ResourceKind::Channel | ResourceKind::Video)] => Ok(*kind),
        _ => eyre::bail!("--details needs --type channel or --type video, not {search_type}"),
    }
}

#[derive(Debug, Args)]
struct ChannelFilters {
    /// Keep channels with at least this many subscribers
    #[arg(long)]
    min_subs: Option<u64>,
    /// Keep channels with fewer than this many subscribers
    #[arg(long)]
    max_subs: Option<u64>,
    /// Keep channels with at least this many public videos
    #[arg(long)]
    min_videos: Option<u64>,
    /// Keep channels that uploaded within this many days (one extra request per channel)
    #[arg(long, value_name = "DAYS")]
    active_days: Option<u32>,
    /// How to treat channels that hide their subscriber count: include, exclude, zero
    #[arg(long, default_value = "include")]
    hidden_subs: HiddenSubscribers,
}

impl ChannelFilters {
    fn filter_set(&self) -> eyre::Result<FilterSet> {
        if let (Some(min), Some(max)) = (self.min_subs, self.max_subs)
            && min >= max
        {
            eyre::bail!("--min-subs ({min}) must be less than --max-subs ({max})");
        }

        let mut filters = FilterSet::new();
        if self.min_subs.is_some() || self.max_subs.is_some() {
            filters = filters.with(Predicate::SubscriberRange {
                min: self.min_subs.unwrap_or(0),
                max: self.max_subs.unwrap_or(u64::MAX),
                hidden: self.hidden_subs,
            });
        }
        if let Some(n) = self.min_videos {
            filters = filters.with(Predicate::MinVideoCount(n));
        }
        if let Some(days) = self.active_days {
            filters = filters.with(Predicate::active_within_days(days));
        }
        Ok(filters)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let cli = Cli::parse();
    cli.command.check()?;
    let config = Config::from_env().context("load configuration")?;
    let client = yt_harvest::connect(&config, cli.oauth).await?;
    let harvester = Harvester::new(client);
    let cap = cli.max_items;

    let records = match &cli.command {
        Command::Channels { channels, filters } => {
            let ids = channel_ids(harvester.source(), channels).await?;
            let records = harvester.channel_records(&ids).await?;
            harvester
                .filter_channels(records, &filters.filter_set()?)
                .await?
        }
        Command::Videos { channel: Some(channel), .. } => {
            let id = channel_ids(harvester.source(), std::slice::from_ref(channel)).await?;
            harvester.channel_videos(&id[0], cap).await?
        }
        Command::Videos { ids, .. } => harvester.video_records(ids).await?,
        Command::Playlist {
            playlist,
            items_only,
        } => {
            let Some(playlist_id) = extract_playlist_id(playlist) else {
                eyre::bail!("no playlist id in {playlist:?}");
            };
            if *items_only {
                harvester.playlist_item_records(&playlist_id, cap).await?
            } else {
                harvester.playlist_videos(&playlist_id, cap).await?
            }
        }
        Command::Search {
            query,
            search_type,
            details: false,
            ..
        } => harvester.search_records(query, search_type, cap).await?,
        Command::Search {
            query,
            search_type,
            details: true,
            filters,
        } => {
            let kind = details_kind(search_type)?;
            let ids = harvester.search_ids(query, search_type, cap).await?;
            match kind {
                ResourceKind::Channel => {
                    let records = harvester.channel_records(&ids).await?;
                    harvester
                        .filter_channels(records, &filters.filter_set()?)
                        .await?
                }
                _ => harvester.video_records(&ids).await?,
            }
        }
        Command::Comments { video_id } => harvester.comment_records(video_id, cap).await?,
        Command::Resolve { urls } => {
            let mut records = Vec::with_capacity(urls.len());
            for url in urls {
                let id = harvester.source().resolve_channel_id(url).await?;
                println!("{id}\t{url}");
                records.push(Record::from_iter([
                    ("channel_url", url.as_str()),
                    ("channel_id", id.as_str()),
                ]));
            }
            records
        }
    };

    let out = cli
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.csv", cli.command.name())));
    export::write_csv(&out, &records)?;
    eprintln!("wrote {} rows to {}", records.len(), out.display());

    Ok(())
}

/// Channel links are resolved to ids by scraping the channel page; anything else is taken
/// to already be a channel id.
async fn channel_ids(client: &YouTubeClient, channels: &[String]) -> eyre::Result<Vec<String>> {
    let mut ids = Vec::with_capacity(channels.len());
    for channel in channels {
        if channel.starts_with("http://") || channel.starts_with("https://") {
            ids.push(client.resolve_channel_id(channel).await?);
        } else {
            ids.push(channel.clone());
        }
    }
    Ok(ids)
}
