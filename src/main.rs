use bulk_audio_dl::{
    BatchRunner, Error, Event, ExecutionMode, ItemId, Result, RunConfig, RunRequest,
};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Exit code for fatal configuration or precondition errors
const EXIT_FATAL: u8 = 2;

/// Download audio from video references, playlists or a CSV manifest
#[derive(Parser, Debug)]
#[command(name = "bulk-audio-dl", about, disable_version_flag = true)]
struct Args {
    /// Output directory (default: config file value, else the current directory)
    #[arg(short, long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    /// Single video URL or id (repeatable)
    #[arg(short = 's', long = "single", value_name = "REF")]
    singles: Vec<String>,

    /// Playlist URL or id
    #[arg(short, long, value_name = "REF")]
    playlist: Option<String>,

    /// Metadata manifest, or the only source when no --single/--playlist is given
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Process items concurrently
    #[arg(short, long)]
    concurrent: bool,

    /// Worker count for concurrent mode (implies --concurrent; default: one per item)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", env = "BULK_AUDIO_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the yt-dlp binary
    #[arg(long = "yt-dlp", value_name = "PATH")]
    yt_dlp: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Print version
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    let json = args.json;

    let config = build_config(&args);
    let verbose = args.verbose || config.as_ref().is_ok_and(|c| c.verbose);
    init_logging(verbose);

    match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "run aborted");
            if json {
                let error_json = serde_json::json!({
                    "success": false,
                    "error_code": e.error_code(),
                    "error": e.to_string(),
                });
                println!("{}", error_json);
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(args: Args, config: Result<RunConfig>) -> Result<ExitCode> {
    let config = config?;
    debug!(?config, "effective configuration");

    let runner = BatchRunner::from_config(config)?;
    let progress = tokio::spawn(print_progress(runner.subscribe()));

    let request = RunRequest {
        singles: args.singles,
        playlist: args.playlist,
        manifest: args.manifest,
    };

    let report = match runner.run(&request).await {
        Ok(report) => report,
        Err(e) => {
            progress.abort();
            return Err(e);
        }
    };
    progress.await.ok();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        println!("{}", report.summary());
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}

/// Load the optional config file, then apply command-line overrides
fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(dir) = &args.outdir {
        config.output_dir = Some(dir.clone());
    }
    if config.output_dir.is_none() {
        let cwd = std::env::current_dir().map_err(|e| {
            Error::config_key(format!("cannot determine current directory: {}", e), "output_dir")
        })?;
        config.output_dir = Some(cwd);
    }
    if args.concurrent || args.jobs.is_some() {
        config.execution.mode = ExecutionMode::Concurrent;
    }
    if let Some(jobs) = args.jobs {
        config.execution.workers = Some(jobs);
    }
    if let Some(path) = &args.yt_dlp {
        config.tools.yt_dlp_path = Some(path.clone());
    }
    if let Some(path) = &args.ffmpeg {
        config.tools.ffmpeg_path = Some(path.clone());
    }
    config.verbose |= args.verbose;

    Ok(config)
}

/// Turn pipeline events into progress lines on stderr until the run completes
async fn print_progress(mut events: broadcast::Receiver<Event>) {
    let mut titles: HashMap<ItemId, String> = HashMap::new();

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "progress output fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            Event::Queued { id, title } => {
                titles.insert(id, title);
            }
            Event::Fetching { id } => {
                let title = titles.get(&id).map(String::as_str).unwrap_or("");
                eprintln!("{} fetching {}", id, title);
            }
            Event::Converting { id } => eprintln!("{} converting", id),
            Event::Tagging { id } => eprintln!("{} tagging", id),
            Event::Cleaning { .. } => {}
            Event::Completed { id, path } => eprintln!("{} done -> {}", id, path.display()),
            Event::Failed { id, stage, error } => {
                eprintln!("{} failed at {}: {}", id, stage, error)
            }
            Event::RunComplete { .. } => break,
        }
    }
}

fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(log_filter(verbose, rust_log.as_deref()))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// `--verbose` wins; otherwise `RUST_LOG` if it parses, else `info`
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "bulk-audio-dl",
            "-o",
            "/music",
            "-s",
            "abc",
            "-s",
            "def",
            "-j",
            "3",
            "--ffmpeg",
            "/opt/ffmpeg",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(args.singles, vec!["abc", "def"]);
        assert_eq!(config.output_dir, Some(PathBuf::from("/music")));
        assert_eq!(config.execution.mode, ExecutionMode::Concurrent);
        assert_eq!(config.execution.workers, Some(3));
        assert_eq!(config.tools.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
    }

    #[test]
    fn test_outdir_defaults_to_current_directory() {
        let args = Args::parse_from(["bulk-audio-dl", "-m", "rows.csv"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.output_dir, Some(std::env::current_dir().unwrap()));
        assert_eq!(config.execution.mode, ExecutionMode::Sequential);
    }

    #[test]
    fn test_log_filter_levels() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::INFO));
        // RUST_LOG can lower the default as well as raise it
        assert_eq!(
            log_filter(false, Some("warn")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            log_filter(false, Some("trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            log_filter(true, Some("warn")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_short_verbose_flag() {
        let args = Args::parse_from(["bulk-audio-dl", "-V", "-c", "-p", "PL1"]);
        assert!(args.verbose);
        assert!(args.concurrent);
        assert_eq!(args.playlist.as_deref(), Some("PL1"));
    }
}
