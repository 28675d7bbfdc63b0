use clap::{Parser, ValueEnum};
use humansize::{DECIMAL, format_size};
use nrk_downloader::{
    CancellationToken, DEFAULT_METADATA_ROOT, DEFAULT_SITE_HOST, DownloadOptions, Downloader,
    OutputExtension, PageRendering, ProgressEvent, QualityOrdering, RunSummary, SiteConfig,
    SubtitleMode,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Exit status of a run stopped with Ctrl-C
const EXIT_CANCELLED: i32 = 130;

/// Container format of the downloaded files
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Extension {
    Mkv,
    Avi,
}

impl From<Extension> for OutputExtension {
    fn from(extension: Extension) -> Self {
        match extension {
            Extension::Mkv => OutputExtension::Mkv,
            Extension::Avi => OutputExtension::Avi,
        }
    }
}

/// Download shows, seasons and episodes from NRK TV
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Show, season or episode URLs, comma separated
    #[arg(short, long, value_delimiter = ',', num_args = 1.., required = true)]
    urls: Vec<String>,

    /// File extension for downloaded files
    #[arg(short, long, value_enum, default_value_t = Extension::Mkv)]
    extension: Extension,

    /// Directory to save downloaded files in (default: current directory)
    #[arg(short, long, value_name = "DIR", alias = "save_dir")]
    save_dir: Option<PathBuf>,

    /// Also download subtitles
    #[arg(long, conflicts_with = "subtitles_only")]
    subtitles: bool,

    /// Download only subtitles
    #[arg(long, alias = "subtitles_only")]
    subtitles_only: bool,

    /// Show debug output, including ffmpeg's
    #[arg(long)]
    debug: bool,

    /// Hide the browser's output
    #[arg(long)]
    silent: bool,

    /// Render old-site pages with this Chromium compatible browser
    #[arg(long, value_name = "PATH")]
    browser: Option<PathBuf>,

    /// Read URLs with the old positional layout first
    #[arg(long)]
    legacy_first: bool,

    /// Rank stream variants by bandwidth, then resolution
    #[arg(long)]
    strict_quality: bool,

    /// Replace existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Do not cache metadata responses
    #[arg(long)]
    no_cache: bool,

    /// Site host accepted in URLs
    #[arg(long, env = "NRK_SITE_HOST", default_value = DEFAULT_SITE_HOST)]
    host: String,

    /// Root of the program metadata API
    #[arg(long, env = "NRK_METADATA_ROOT", default_value = DEFAULT_METADATA_ROOT)]
    metadata_root: String,
}

impl Cli {
    fn site(&self) -> SiteConfig {
        SiteConfig {
            host: self.host.clone(),
            metadata_root: self.metadata_root.clone(),
            legacy_first: self.legacy_first,
            ..SiteConfig::default()
        }
    }

    fn options(&self) -> DownloadOptions {
        let subtitles = if self.subtitles_only {
            SubtitleMode::Only
        } else if self.subtitles {
            SubtitleMode::Include
        } else {
            SubtitleMode::Skip
        };

        DownloadOptions {
            output_dir: self.save_dir.clone().unwrap_or_default(),
            extension: self.extension.into(),
            subtitles,
            overwrite: self.overwrite,
            quality_ordering: if self.strict_quality {
                QualityOrdering::Strict
            } else {
                QualityOrdering::AnyDimension
            },
            verbose: self.debug,
        }
    }

    fn rendering(&self) -> PageRendering {
        match &self.browser {
            Some(binary) => PageRendering::HeadlessBrowser {
                binary: binary.clone(),
                silent: self.silent,
            },
            None => PageRendering::Plain,
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Installs the Ctrl-C handler; a second Ctrl-C exits immediately
fn install_interrupt_handler(cancel: CancellationToken) {
    let result = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            eprintln!("\nInterrupted again, exiting.");
            process::exit(EXIT_CANCELLED);
        }
        eprintln!("\nStopping after the current episode... press Ctrl-C again to exit now.");
        cancel.cancel();
    });

    if let Err(e) = result {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { url_count } => {
            println!("Downloading from {} URL(s)...", url_count);
        }
        ProgressEvent::ResolvingUrl { url } => {
            println!("\n=== {} ===", url);
        }
        ProgressEvent::EpisodesResolved { count, .. } => {
            println!("Found {} episode(s)\n", count);
        }
        ProgressEvent::UrlFailed { reason, .. } => {
            println!("Skipping URL: {}", reason);
        }
        ProgressEvent::ProcessingEpisode {
            index,
            total,
            episode,
        } => {
            println!("[{}/{}] {}", index + 1, total, episode);
        }
        ProgressEvent::Downloading { destination, .. } => {
            println!("  Downloading to {}...", destination.display());
        }
        ProgressEvent::DownloadingSubtitles { destination } => {
            println!("  Downloading subtitles to {}...", destination.display());
        }
        ProgressEvent::EpisodeDownloaded { bytes, .. } => match bytes {
            Some(bytes) => println!("  Done ({})", format_size(bytes, DECIMAL)),
            None => println!("  Done"),
        },
        ProgressEvent::EpisodeSkipped { reason } => {
            println!("  Skipped: {}", reason);
        }
        ProgressEvent::EpisodeFailed { reason } => {
            println!("  Failed: {}", reason);
        }
        ProgressEvent::Cancelled => {
            println!("\nCancelled.");
        }
        ProgressEvent::Complete {
            downloaded,
            skipped,
            failed,
        } => {
            println!(
                "\nComplete! Downloaded {}, skipped {}, failed {}.",
                downloaded, skipped, failed
            );
        }
    }
}

fn exit_code(summary: &RunSummary) -> i32 {
    if summary.cancelled {
        EXIT_CANCELLED
    } else if summary.is_success() {
        0
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    let downloader = match Downloader::new(
        cli.site(),
        cli.options(),
        cli.rendering(),
        !cli.no_cache,
        cancel,
    ) {
        Ok(downloader) => downloader,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let summary = downloader.run(&cli.urls, handle_progress_event);

    process::exit(exit_code(&summary));
}
