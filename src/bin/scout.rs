#![forbid(unsafe_code)]

//! `scout`: command-line front end for the niche analysis pipeline.
//!
//! `analyze` scores seed videos, `search` scores the results of a keyword
//! search, `related` lists a video's neighbours and `cache` inspects or
//! prunes the on-disk response cache. Reports are written as JSON and
//! summarized on stdout.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tubescout_tools::{
    CacheStore, DataApiClient, DataProvider, DurationBucket, JsonFileCache, Namespace, OfflineApi,
    Pipeline, RunReport, RunRequest, SearchFilter, YouTubeApi,
    config::{Settings, SettingsOverrides, read_seeds_file, resolve_settings},
    pipeline::extract_video_id,
};

const SUMMARY_TITLE_CHARS: usize = 48;
const SUMMARY_NICHES: usize = 5;
const DEFAULT_RELATED_MAX: usize = 10;
const DEFAULT_RELATED_PER_VIDEO: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "scout", version)]
#[command(about = "Find under-served YouTube niches from seed videos or keyword searches")]
struct Cli {
    /// Path to the .env file with API key and paths
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Override the response cache location
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Answer from the cache only; never call the API
    #[arg(long, global = true)]
    offline: bool,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score seed videos given as URLs/ids or read from the seeds file
    Analyze {
        urls: Vec<String>,

        /// Seeds file to read when no URLs are given
        #[arg(long)]
        seeds: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Score the results of a keyword search
    Search {
        keyword: String,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// List videos related to one video
    Related {
        video: String,

        #[arg(long, default_value_t = DEFAULT_RELATED_MAX)]
        max: usize,
    },
    /// Inspect or prune the response cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Entry counts per namespace
    Stats,
    /// Drop cached entries
    Clear {
        /// Only clear this namespace
        #[arg(long, value_enum)]
        namespace: Option<CliNamespace>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliNamespace {
    Videos,
    Channels,
    Related,
    Search,
}

impl From<CliNamespace> for Namespace {
    fn from(cli: CliNamespace) -> Self {
        match cli {
            CliNamespace::Videos => Namespace::Videos,
            CliNamespace::Channels => Namespace::Channels,
            CliNamespace::Related => Namespace::Related,
            CliNamespace::Search => Namespace::Search,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliDuration {
    Short,
    Medium,
    Long,
    Any,
}

impl From<CliDuration> for DurationBucket {
    fn from(cli: CliDuration) -> Self {
        match cli {
            CliDuration::Short => DurationBucket::Short,
            CliDuration::Medium => DurationBucket::Medium,
            CliDuration::Long => DurationBucket::Long,
            CliDuration::Any => DurationBucket::Any,
        }
    }
}

/// Filter flags. A `--preset` file is loaded first; every flag given on the
/// command line replaces the preset's value.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// TOML file with filter defaults
    #[arg(long)]
    preset: Option<PathBuf>,

    #[arg(long, value_enum)]
    duration: Option<CliDuration>,

    /// Minimum length in minutes
    #[arg(long)]
    min_duration: Option<f64>,

    /// Maximum length in minutes
    #[arg(long)]
    max_duration: Option<f64>,

    #[arg(long)]
    min_subs: Option<u64>,

    /// Exclusive upper bound on channel subscribers
    #[arg(long)]
    max_subs: Option<u64>,

    #[arg(long)]
    min_views: Option<u64>,

    /// Exclusive upper bound on views
    #[arg(long)]
    max_views: Option<u64>,

    /// Only channels created at most this many days ago
    #[arg(long)]
    max_channel_age: Option<i64>,

    #[arg(long)]
    max_results: Option<usize>,
}

impl FilterArgs {
    fn resolve(&self, keyword: Option<String>) -> Result<SearchFilter> {
        let mut filter = match &self.preset {
            Some(path) => SearchFilter::from_toml_file(path)?,
            None => SearchFilter::default(),
        };
        if keyword.is_some() {
            filter.keyword = keyword;
        }
        if let Some(duration) = self.duration {
            filter.duration = duration.into();
        }
        filter.min_duration_minutes = self.min_duration.or(filter.min_duration_minutes);
        filter.max_duration_minutes = self.max_duration.or(filter.max_duration_minutes);
        filter.min_subs = self.min_subs.or(filter.min_subs);
        filter.max_subs = self.max_subs.or(filter.max_subs);
        filter.min_views = self.min_views.or(filter.min_views);
        filter.max_views = self.max_views.or(filter.max_views);
        filter.max_channel_age_days = self.max_channel_age.or(filter.max_channel_age_days);
        filter.max_results = self.max_results.or(filter.max_results);
        Ok(filter)
    }
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Related videos to fetch for each ranked video (0 to skip)
    #[arg(long, default_value_t = DEFAULT_RELATED_PER_VIDEO)]
    related: usize,

    /// Where to write the JSON report (defaults to TUBESCOUT_RESULTS_FILE)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let settings = resolve_settings(SettingsOverrides {
        cache_file: cli.cache_file.clone(),
        env_path: cli.env_file.clone(),
        ..SettingsOverrides::default()
    })?;

    match cli.command {
        Command::Analyze {
            urls,
            seeds,
            filter,
            output,
        } => {
            let seeds_file = seeds.as_deref().unwrap_or(settings.seeds_file.as_path());
            let seeds = collect_seeds(urls, seeds_file)?;
            let request =
                RunRequest::seeds(seeds, filter.resolve(None)?).with_related(output.related);
            run_analysis(&settings, cli.offline, request, output.output)
        }
        Command::Search {
            keyword,
            filter,
            output,
        } => {
            let request =
                RunRequest::search(filter.resolve(Some(keyword))?).with_related(output.related);
            run_analysis(&settings, cli.offline, request, output.output)
        }
        Command::Related { video, max } => show_related(&settings, cli.offline, &video, max),
        Command::Cache { action } => manage_cache(&settings, action),
    }
}

/// Seeds given on the command line win; otherwise they come from
/// `seeds_file`, which must list at least one.
fn collect_seeds(urls: Vec<String>, seeds_file: &Path) -> Result<Vec<String>> {
    if !urls.is_empty() {
        return Ok(urls);
    }
    let seeds = read_seeds_file(seeds_file)?;
    if seeds.is_empty() {
        bail!("No seeds given; pass URLs or fill {}", seeds_file.display());
    }
    Ok(seeds)
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn open_api(settings: &Settings, offline: bool) -> Result<Box<dyn YouTubeApi>> {
    if offline {
        info!("offline mode: answering from cache only");
        return Ok(Box::new(OfflineApi));
    }
    let api_key = settings.require_api_key()?;
    Ok(Box::new(DataApiClient::new(
        api_key,
        settings.api_base.clone(),
        settings.timeout,
    )))
}

fn open_cache(settings: &Settings) -> Result<JsonFileCache> {
    JsonFileCache::open(&settings.cache_file)
        .with_context(|| format!("Opening cache {}", settings.cache_file.display()))
}

fn run_analysis(
    settings: &Settings,
    offline: bool,
    request: RunRequest,
    output: Option<PathBuf>,
) -> Result<()> {
    let provider = DataProvider::new(open_api(settings, offline)?, open_cache(settings)?);
    let mut pipeline = Pipeline::new(provider);
    let report = pipeline.run(&request);

    let path = output.unwrap_or_else(|| settings.results_file.clone());
    write_report(&path, &report)?;
    print_summary(&report);
    println!("Report written to {}", path.display());
    Ok(())
}

fn show_related(settings: &Settings, offline: bool, video: &str, max: usize) -> Result<()> {
    let video_id =
        extract_video_id(video).ok_or_else(|| anyhow!("No video id found in {video:?}"))?;
    let mut provider = DataProvider::new(open_api(settings, offline)?, open_cache(settings)?);
    let related = provider
        .fetch_related(&video_id, max)
        .with_context(|| format!("Fetching videos related to {video_id}"))?;
    if let Err(err) = provider.flush() {
        warn!("cache not persisted: {err}");
    }

    if related.is_empty() {
        println!("No related videos for {video_id}");
    }
    for (index, item) in related.iter().enumerate() {
        println!(
            "{:>2}. {}  {}  ({})",
            index + 1,
            item.video_id,
            item.title,
            item.channel_title
        );
    }
    Ok(())
}

fn manage_cache(settings: &Settings, action: CacheCommand) -> Result<()> {
    let mut cache = open_cache(settings)?;
    match action {
        CacheCommand::Stats => {
            println!("Cache {}", cache.path().display());
            for namespace in Namespace::ALL {
                println!("  {:<9} {:>6}", namespace.as_str(), cache.len(namespace));
            }
        }
        CacheCommand::Clear { namespace } => {
            let namespace = namespace.map(Namespace::from);
            let removed = cache.clear(namespace);
            cache
                .flush()
                .with_context(|| format!("Writing {}", settings.cache_file.display()))?;
            match namespace {
                Some(namespace) => println!("Removed {removed} {namespace} entries"),
                None => println!("Removed {removed} entries"),
            }
        }
    }
    Ok(())
}

/// Writes the report next to its final location first and renames it into
/// place.
fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Serializing report")?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, json + "\n")
        .with_context(|| format!("Writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("Renaming onto {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Ranked {} of {} candidate video(s); {} item(s) skipped",
        report.ranked.len(),
        report.candidates,
        report.skipped.len()
    );
    for (index, video) in report.ranked.iter().enumerate() {
        println!(
            "{:>3}. {:<width$}  potential {:>10.1}  subs {:>9}  views {:>10}  [{}]",
            index + 1,
            shorten(&video.video.title, SUMMARY_TITLE_CHARS),
            video.metrics.potential_score,
            video.channel_subscribers,
            video.video.views,
            video.niche,
            width = SUMMARY_TITLE_CHARS,
        );
    }
    if !report.niches.is_empty() {
        println!("Top niches:");
        for group in report.niches.iter().take(SUMMARY_NICHES) {
            println!(
                "  {:<30} {:>3} video(s)  engagement {:>5.2}%  competition {:>5.1}",
                group.label,
                group.member_count,
                group.avg_engagement_pct,
                group.avg_competition_score
            );
        }
    }
}

fn shorten(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut short: String = title.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn parses_analyze_with_filters() {
        let cli = Cli::try_parse_from([
            "scout",
            "--offline",
            "analyze",
            "https://youtu.be/dQw4w9WgXcQ",
            "9bZkp7q19f0",
            "--max-subs",
            "50000",
            "--duration",
            "medium",
            "--related",
            "3",
        ])
        .unwrap();
        assert!(cli.offline);
        let Command::Analyze {
            urls,
            filter,
            output,
            ..
        } = cli.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(urls.len(), 2);
        assert_eq!(output.related, 3);
        let filter = filter.resolve(None).unwrap();
        assert_eq!(filter.max_subs, Some(50_000));
        assert_eq!(filter.duration, DurationBucket::Medium);
        assert_eq!(filter.keyword, None);
    }

    #[test]
    fn parses_search_keyword_and_output() {
        let cli =
            Cli::try_parse_from(["scout", "search", "home espresso", "-o", "out.json", "-v"])
                .unwrap();
        assert!(cli.verbose);
        let Command::Search {
            keyword, output, ..
        } = cli.command
        else {
            panic!("expected search");
        };
        assert_eq!(keyword, "home espresso");
        assert_eq!(output.output, Some(PathBuf::from("out.json")));
        assert_eq!(output.related, DEFAULT_RELATED_PER_VIDEO);
    }

    #[test]
    fn related_defaults_to_ten() {
        let cli = Cli::try_parse_from(["scout", "related", "dQw4w9WgXcQ"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Related { max: DEFAULT_RELATED_MAX, .. }
        ));
    }

    #[test]
    fn cache_clear_accepts_namespace() {
        let cli =
            Cli::try_parse_from(["scout", "cache", "clear", "--namespace", "channels"]).unwrap();
        let Command::Cache {
            action: CacheCommand::Clear { namespace },
        } = cli.command
        else {
            panic!("expected cache clear");
        };
        assert_eq!(namespace.map(Namespace::from), Some(Namespace::Channels));
        assert!(Cli::try_parse_from(["scout", "cache", "clear", "--namespace", "nope"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["scout", "-v", "-q", "cache", "stats"]).is_err());
    }

    #[test]
    fn cli_flags_override_preset() -> Result<()> {
        let mut preset = NamedTempFile::new()?;
        writeln!(
            preset,
            "keyword = \"sourdough\"\nmax_subs = 10000\nmin_views = 500\nduration = \"long\""
        )?;
        let args = FilterArgs {
            preset: Some(preset.path().to_path_buf()),
            max_subs: Some(20_000),
            duration: Some(CliDuration::Short),
            ..FilterArgs::default()
        };

        let filter = args.resolve(None)?;
        assert_eq!(filter.keyword.as_deref(), Some("sourdough"));
        assert_eq!(filter.max_subs, Some(20_000));
        assert_eq!(filter.min_views, Some(500));
        assert_eq!(filter.duration, DurationBucket::Short);

        let searched = args.resolve(Some("rye".into()))?;
        assert_eq!(searched.keyword.as_deref(), Some("rye"));
        Ok(())
    }

    #[test]
    fn report_is_written_as_json() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("results.json");
        let report = RunReport {
            generated_at: Utc::now(),
            filter: SearchFilter::with_keyword("rust"),
            candidates: 0,
            ranked: Vec::new(),
            niches: Vec::new(),
            channels: Vec::new(),
            related: Default::default(),
            skipped: Vec::new(),
        };
        write_report(&path, &report)?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["filter"]["keyword"], "rust");
        assert!(value["ranked"].as_array().is_some_and(|ranked| ranked.is_empty()));
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn seeds_come_from_urls_before_file() -> Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("missing.txt");
        let seeds = collect_seeds(vec!["dQw4w9WgXcQ".into()], &missing)?;
        assert_eq!(seeds, vec!["dQw4w9WgXcQ"]);
        Ok(())
    }

    #[test]
    fn empty_seeds_file_is_named_in_error() -> Result<()> {
        let dir = tempdir()?;
        let custom = dir.path().join("weekly-seeds.txt");
        fs::write(&custom, "# nothing yet\n\n")?;
        let err = collect_seeds(Vec::new(), &custom).unwrap_err();
        assert!(err.to_string().contains("weekly-seeds.txt"), "{err}");

        fs::write(&custom, "https://youtu.be/dQw4w9WgXcQ\n")?;
        assert_eq!(collect_seeds(Vec::new(), &custom)?.len(), 1);
        Ok(())
    }

    #[test]
    fn shorten_respects_char_boundaries() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("crème brûlée recipe", 6), "crème…");
    }
}
