//! nrk_downloader - Download shows, seasons and episodes from NRK TV
//!
//! This library resolves show, season and episode URLs into their episodes,
//! picks the best stream of each and remuxes it into a local file with ffmpeg.
//!
//! URLs of the current site are resolved through the program metadata API;
//! URLs of the old site are resolved by scraping its pages.

mod browser;
mod cache;
mod config;
mod file_operations;
mod http;
mod metadata_retrieval;
mod orchestrator;
mod quality;
mod remux;
mod temp;
mod url_classifier;

#[cfg(test)]
mod test_support;

use browser::{RenderSession, RendererFactory, RendererKind};
use cache::CacheStorage;
use http::{HttpClient, ReqwestHttpClient};
use metadata_retrieval::{CachedHttpClient, LegacyResolver, MetadataResolver, PsapiResolver};
use quality::QualitySelector;
use remux::FfmpegRemuxer;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

// Re-export error types
pub use browser::RenderError;
pub use cache::CacheError;
pub use file_operations::FileOperationError;
pub use http::FetchError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use remux::RemuxError;
pub use url_classifier::UrlClassifierError;

// Re-export configuration and result types
pub use config::{
    DEFAULT_CACHE_TTL, DEFAULT_METADATA_ROOT, DEFAULT_SITE_HOST, DEFAULT_SUBTITLE_ROOT,
    DownloadOptions, OutputExtension, PageRendering, QualityOrdering, SiteConfig, SubtitleMode,
};
pub use file_operations::{episode_path, sanitize_filename};
pub use metadata_retrieval::{Episode, Ordinal};
pub use orchestrator::{BatchResult, CancellationToken, EpisodeReport, Outcome};
pub use quality::Quality;
pub use url_classifier::{UrlClassifier, UrlInfo, UrlScheme};

/// Progress event emitted during a run
///
/// These events allow library users to track progress and provide feedback
/// while URLs are resolved and episodes downloaded.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { url_count: usize },

    /// Resolving a URL into episodes
    ResolvingUrl { url: String },

    /// Episodes found for a URL
    EpisodesResolved { url: String, count: usize },

    /// A URL could not be resolved; the run continues with the next one
    UrlFailed { url: String, reason: String },

    /// Processing a specific episode
    ProcessingEpisode {
        index: usize,
        total: usize,
        episode: String,
    },

    /// Remuxing the selected stream
    Downloading {
        stream_url: String,
        destination: PathBuf,
    },

    /// Remuxing the subtitle playlist
    DownloadingSubtitles { destination: PathBuf },

    /// Episode written
    EpisodeDownloaded { path: PathBuf, bytes: Option<u64> },

    /// Episode left alone
    EpisodeSkipped { reason: String },

    /// Episode could not be downloaded
    EpisodeFailed { reason: String },

    /// Run stopped by the user
    Cancelled,

    /// Run complete
    Complete {
        downloaded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlClassifierError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Page rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Remux(#[from] RemuxError),

    /// The URL was valid but addressed no downloadable episode
    #[error("No episodes found at {0}")]
    NothingFound(String),
}

/// Result for one input URL
#[derive(Debug)]
pub struct UrlReport {
    pub url: String,
    pub result: Result<BatchResult, DownloaderError>,
}

/// Results of a run, one report per processed URL
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<UrlReport>,
    pub cancelled: bool,
}

impl RunSummary {
    fn batches(&self) -> impl Iterator<Item = &BatchResult> {
        self.reports.iter().filter_map(|r| r.result.as_ref().ok())
    }

    pub fn downloaded(&self) -> usize {
        self.batches().map(BatchResult::downloaded).sum()
    }

    pub fn skipped(&self) -> usize {
        self.batches().map(BatchResult::skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches().map(BatchResult::failed).sum()
    }

    /// Every URL resolved and none of its episodes failed
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self
                .reports
                .iter()
                .all(|r| r.result.as_ref().is_ok_and(BatchResult::is_complete_success))
    }
}

/// Resolves and downloads URLs
pub struct Downloader {
    site: SiteConfig,
    classifier: UrlClassifier,
    metadata_http: Arc<dyn HttpClient>,
    renderer: Box<dyn RendererFactory>,
    orchestrator: orchestrator::DownloadOrchestrator,
    cancel: CancellationToken,
}

impl Downloader {
    /// Creates a downloader talking to the real site
    ///
    /// Old-site pages are fetched as `rendering` says. Metadata responses are
    /// cached on disk when `use_cache` is set.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created or ffmpeg is not available.
    pub fn new(
        site: SiteConfig,
        options: DownloadOptions,
        rendering: PageRendering,
        use_cache: bool,
        cancel: CancellationToken,
    ) -> Result<Self, DownloaderError> {
        let client = ReqwestHttpClient::new()?;
        let http: Arc<dyn HttpClient> = Arc::new(client.clone());

        let metadata_http: Arc<dyn HttpClient> = if use_cache {
            match CacheStorage::open("metadata", Some(DEFAULT_CACHE_TTL)) {
                Ok(cache) => Arc::new(CachedHttpClient::new(client, cache)),
                Err(e) => {
                    tracing::warn!(error = %e, "metadata cache unavailable, continuing without");
                    Arc::clone(&http)
                }
            }
        } else {
            Arc::clone(&http)
        };

        let renderer = match rendering {
            PageRendering::HeadlessBrowser { binary, silent } => {
                RendererKind::Browser { binary, silent }
            }
            PageRendering::Plain => RendererKind::Http(Arc::clone(&http)),
        };

        let remuxer = FfmpegRemuxer::new(options.verbose, options.overwrite);
        remuxer.ensure_available()?;

        let orchestrator = orchestrator::DownloadOrchestrator::new(
            QualitySelector::new(http, options.quality_ordering),
            Arc::new(remuxer),
            options,
            site.subtitle_root.clone(),
            cancel.clone(),
        );

        Ok(Self::from_parts(
            site,
            metadata_http,
            Box::new(renderer),
            orchestrator,
            cancel,
        ))
    }

    fn from_parts(
        site: SiteConfig,
        metadata_http: Arc<dyn HttpClient>,
        renderer: Box<dyn RendererFactory>,
        orchestrator: orchestrator::DownloadOrchestrator,
        cancel: CancellationToken,
    ) -> Self {
        let classifier = if site.legacy_first {
            UrlClassifier::legacy_first(&site.host)
        } else {
            UrlClassifier::new(&site.host)
        };

        Self {
            site,
            classifier,
            metadata_http,
            renderer,
            orchestrator,
            cancel,
        }
    }

    /// Classifies `url` and expands it into its episodes
    ///
    /// An empty list means the URL was understood but nothing could be
    /// resolved; the reasons are logged.
    pub fn resolve(&self, url: &str) -> Result<Vec<Episode>, DownloaderError> {
        let info = self.classifier.classify(url)?;

        let episodes = match info.scheme {
            UrlScheme::Named => {
                PsapiResolver::new(Arc::clone(&self.metadata_http), &self.site.metadata_root)
                    .with_cancellation(self.cancel.clone())
                    .resolve(&info)
            }
            UrlScheme::Positional => {
                let session = RenderSession::open(self.renderer.as_ref())?;
                LegacyResolver::new(&*session, &self.site)
                    .with_cancellation(self.cancel.clone())
                    .resolve(&info)
            }
        };

        Ok(episodes)
    }

    /// Downloads every episode behind `urls`, in order
    ///
    /// A URL that cannot be classified or resolved is reported and skipped.
    /// Cancellation stops the run between two episodes, or between two
    /// lookups while a URL is being resolved.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use nrk_downloader::{CancellationToken, Downloader, ProgressEvent};
    ///
    /// let downloader = Downloader::new(site, options, PageRendering::Plain, true, CancellationToken::new())?;
    /// let summary = downloader.run(&urls, |event| {
    ///     if let ProgressEvent::ProcessingEpisode { index, total, episode } = event {
    ///         println!("[{}/{}] {}", index + 1, total, episode);
    ///     }
    /// });
    /// ```
    pub fn run<F>(&self, urls: &[String], mut progress_callback: F) -> RunSummary
    where
        F: FnMut(ProgressEvent),
    {
        progress_callback(ProgressEvent::Started {
            url_count: urls.len(),
        });

        let mut summary = RunSummary::default();

        for url in urls {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            progress_callback(ProgressEvent::ResolvingUrl { url: url.clone() });

            let result = match self.resolve(url) {
                Ok(_) if self.cancel.is_cancelled() => {
                    summary.cancelled = true;
                    Ok(BatchResult {
                        cancelled: true,
                        ..BatchResult::default()
                    })
                }
                Ok(episodes) if episodes.is_empty() => {
                    Err(DownloaderError::NothingFound(url.clone()))
                }
                Ok(episodes) => {
                    progress_callback(ProgressEvent::EpisodesResolved {
                        url: url.clone(),
                        count: episodes.len(),
                    });

                    let batch = self.orchestrator.run(episodes, &mut progress_callback);
                    summary.cancelled |= batch.cancelled;
                    Ok(batch)
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                tracing::warn!(url, "{e}");
                progress_callback(ProgressEvent::UrlFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                });
            }

            summary.reports.push(UrlReport {
                url: url.clone(),
                result,
            });

            if summary.cancelled {
                break;
            }
        }

        if summary.cancelled {
            progress_callback(ProgressEvent::Cancelled);
        }

        progress_callback(ProgressEvent::Complete {
            downloaded: summary.downloaded(),
            skipped: summary.skipped(),
            failed: summary.failed(),
        });

        summary
    }
}
