use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use lochist::{
    Config, HistoryError,
    history::{LocationHistory, Source, timestamp::normalize_str},
    index::{Grouping, PeriodKey, TimeFilter},
    pipeline::{CancelToken, Pipeline, RunSummary},
    report::Report,
};

#[derive(Parser)]
#[command(name = "lochist")]
#[command(about = "LOCHIST - Location history heatmap indexer")]
struct Args {
    /// Export files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<Utf8PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = "lochist.yaml")]
    config: Utf8PathBuf,

    /// Period granularity (monthly or yearly)
    #[arg(short, long)]
    grouping: Option<Grouping>,

    /// Show a single period ("MM/YYYY", "YYYY-MM" or "YYYY")
    #[arg(short, long, conflicts_with_all = ["from", "since"])]
    period: Option<PeriodKey>,

    /// First period of a range
    #[arg(long, requires = "to")]
    from: Option<PeriodKey>,

    /// Last period of a range (inclusive)
    #[arg(long, requires = "from")]
    to: Option<PeriodKey>,

    /// Start of a date range (inclusive)
    #[arg(long, requires = "until", conflicts_with = "from")]
    since: Option<String>,

    /// End of a date range (exclusive)
    #[arg(long, requires = "since")]
    until: Option<String>,

    /// Maximum number of markers
    #[arg(long)]
    max_markers: Option<usize>,

    /// Let raw path points contribute to markers
    #[arg(long)]
    include_path: bool,

    /// Drop path points without their own timestamp instead of interpolating
    #[arg(long)]
    no_interpolate: bool,

    /// Report output file
    #[arg(short, long, default_value = "heatmap.json")]
    output: Utf8PathBuf,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,

    /// Process directories recursively
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    println!("🗺️  LOCHIST - Location History Indexer");

    let config = load_config(&args)?;
    let time_filter = time_filter(&args)?;
    let pipeline = Pipeline::new(config).with_context(|| "Invalid configuration")?;

    let paths = if args.paths.is_empty() {
        vec![Utf8PathBuf::from(".")]
    } else {
        args.paths.clone()
    };

    let mut all_files = Vec::new();
    for path in &paths {
        if !path.exists() {
            eprintln!("⚠️  Path does not exist: {path}");
            continue;
        }
        all_files.extend(collect_files(path, args.recursive)?);
    }

    if all_files.is_empty() {
        println!("⚠️  No JSON files found");
        return Ok(());
    }

    println!("📁 Found {} file(s) to process", all_files.len());

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let mut histories = Vec::new();
    let mut summaries = Vec::new();
    let mut errors = 0;

    for file_path in all_files {
        match pipeline.process_file_async(&file_path, &cancel).await {
            Ok(run) => {
                print_summary(&run.summary, args.verbose);
                histories.push(run.history);
                summaries.push(run.summary);
            }
            Err(HistoryError::Cancelled) => {
                eprintln!("🛑 Cancelled while processing {file_path}");
                anyhow::bail!("processing was cancelled");
            }
            Err(e) => {
                errors += 1;
                eprintln!("❌ Error processing {file_path}: {e}");
            }
        }
    }

    if histories.is_empty() {
        anyhow::bail!("no location points extracted from any file");
    }

    let history = LocationHistory::merge(histories);
    let report = Report::build(summaries, &history, pipeline.config(), time_filter)
        .with_context(|| "Failed to build report")?;
    report
        .write_json(&args.output, args.pretty)
        .with_context(|| format!("Failed to write report: {}", args.output))?;

    println!("\n🎉 Summary:");
    println!("   Points: {}", history.len());
    println!("   Visits: {}", history.count_by_source(Source::Visit));
    println!("   Activities: {}", history.count_by_source(Source::Activity));
    println!("   Path: {}", history.count_by_source(Source::Path));
    if let (Some(first), Some(last)) = (&report.first_period, &report.last_period) {
        println!("   Periods: {first} - {last} ({})", report.grouping);
    }
    println!("   View: {} ({} points)", report.view, report.point_count);
    println!(
        "   Markers: {} of {} cells",
        report.marker_counts.shown, report.marker_counts.cells
    );
    println!("   Errors: {errors}");
    println!("📝 Report written to {}", args.output);

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        Config::from_yaml_file(&args.config)
            .with_context(|| format!("Failed to load config file: {}", args.config))?
    } else {
        debug!(path = %args.config, "no config file, using defaults");
        Config::default()
    };

    if let Some(grouping) = args.grouping {
        config.time_grouping = grouping;
    }
    if let Some(max_markers) = args.max_markers {
        config.max_markers = max_markers;
    }
    if args.include_path {
        config.include_path_in_markers = true;
    }
    if args.no_interpolate {
        config.interpolate_missing_timestamps = false;
    }
    Ok(config)
}

fn time_filter(args: &Args) -> Result<TimeFilter> {
    if let Some(period) = args.period {
        return Ok(TimeFilter::Period(period));
    }
    if let (Some(from), Some(to)) = (args.from, args.to) {
        return Ok(TimeFilter::Periods { from, to });
    }
    if let (Some(since), Some(until)) = (&args.since, &args.until) {
        let start_ms = normalize_str(since).with_context(|| format!("Invalid --since: {since}"))?;
        let end_ms = normalize_str(until).with_context(|| format!("Invalid --until: {until}"))?;
        return Ok(TimeFilter::Between { start_ms, end_ms });
    }
    Ok(TimeFilter::All)
}

fn collect_files(path: &Utf8Path, recursive: bool) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        let walker = if recursive {
            WalkDir::new(path).sort_by_file_name().into_iter()
        } else {
            WalkDir::new(path).max_depth(1).sort_by_file_name().into_iter()
        };

        for entry in walker {
            let entry = entry.with_context(|| "Failed to read directory entry")?;

            if entry.file_type().is_file() {
                let file_path = Utf8PathBuf::from_path_buf(entry.path().to_path_buf())
                    .map_err(|_| anyhow::anyhow!("Non-UTF8 path: {:?}", entry.path()))?;

                if is_json_file(&file_path) {
                    files.push(file_path);
                }
            }
        }
    }

    Ok(files)
}

fn is_json_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn print_summary(summary: &RunSummary, verbose: bool) {
    println!(
        "✅ {} ({}): {} points",
        summary.source, summary.format, summary.points
    );
    if verbose {
        for (source, count) in &summary.by_source {
            println!("   {source}: {count}");
        }
    }
    if summary.total_skipped() > 0 {
        println!("   Skipped: {}", summary.total_skipped());
        for (reason, count) in &summary.skipped {
            println!("   - {reason}: {count}");
        }
        if verbose {
            for sample in &summary.samples {
                println!("     entry {}: {}", sample.entry, sample.detail);
            }
        }
    }
}
