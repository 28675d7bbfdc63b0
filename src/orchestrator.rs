//! Batch downloading
//!
//! Runs the episodes of a batch one after another: pick the best stream,
//! place the output file, remux. Every episode ends with an [`Outcome`]; a
//! failing episode never stops the batch, a cancellation stops it between
//! two episodes.

use crate::ProgressEvent;
use crate::config::{DownloadOptions, SubtitleMode};
use crate::file_operations::{PlannedDownload, output_path, plan_downloads};
use crate::metadata_retrieval::Episode;
use crate::quality::QualitySelector;
use crate::remux::Remuxer;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const SUBTITLE_EXTENSION: &str = "vtt";

/// Shared flag asking a running batch to stop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded {
        path: PathBuf,
        /// Size of the written file, if it could be read
        bytes: Option<u64>,
        subtitles: Option<PathBuf>,
    },
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct EpisodeReport {
    pub episode: Episode,
    pub outcome: Outcome,
}

/// Outcomes of a batch in episode order
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub entries: Vec<EpisodeReport>,
    /// The batch was stopped before its last episode
    pub cancelled: bool,
}

impl BatchResult {
    fn count(&self, matches: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| matches(&e.outcome)).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// No episode failed and the batch ran to its end
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failed() == 0
    }
}

/// Downloads batches of resolved episodes
pub struct DownloadOrchestrator {
    quality: QualitySelector,
    remuxer: Arc<dyn Remuxer>,
    options: DownloadOptions,
    subtitle_root: String,
    cancel: CancellationToken,
}

impl DownloadOrchestrator {
    pub fn new(
        quality: QualitySelector,
        remuxer: Arc<dyn Remuxer>,
        options: DownloadOptions,
        subtitle_root: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            quality,
            remuxer,
            options,
            subtitle_root: subtitle_root.into(),
            cancel,
        }
    }

    /// Downloads `episodes` in order
    ///
    /// Returns early with `cancelled` set once the token is cancelled; the
    /// episode running at that moment is finished first.
    pub fn run<F>(&self, episodes: Vec<Episode>, progress_callback: &mut F) -> BatchResult
    where
        F: FnMut(ProgressEvent),
    {
        let planned = plan_downloads(episodes);
        let total = planned.len();
        let mut result = BatchResult::default();

        for (index, download) in planned.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(done = index, total, "batch cancelled");
                result.cancelled = true;
                break;
            }

            if let Some(suffix) = download.duplicate_suffix {
                tracing::debug!(file_name = %download.file_name, suffix, "file name already used in this batch");
            }

            progress_callback(ProgressEvent::ProcessingEpisode {
                index,
                total,
                episode: download.episode.to_string(),
            });

            let outcome = self.process(&download, progress_callback);

            match &outcome {
                Outcome::Downloaded { path, bytes, .. } => {
                    progress_callback(ProgressEvent::EpisodeDownloaded {
                        path: path.clone(),
                        bytes: *bytes,
                    });
                }
                Outcome::Skipped(reason) => {
                    tracing::info!(episode = %download.episode, reason, "skipped");
                    progress_callback(ProgressEvent::EpisodeSkipped {
                        reason: reason.clone(),
                    });
                }
                Outcome::Failed(reason) => {
                    tracing::error!(episode = %download.episode, reason, "download failed");
                    progress_callback(ProgressEvent::EpisodeFailed {
                        reason: reason.clone(),
                    });
                }
            }

            result.entries.push(EpisodeReport {
                episode: download.episode,
                outcome,
            });
        }

        result
    }

    fn process<F>(&self, download: &PlannedDownload, progress_callback: &mut F) -> Outcome
    where
        F: FnMut(ProgressEvent),
    {
        let output_dir = self.options.output_dir.as_path();

        if self.options.subtitles == SubtitleMode::Only {
            let destination = match output_path(output_dir, &download.file_name, SUBTITLE_EXTENSION)
            {
                Ok(path) => path,
                Err(e) => return Outcome::Failed(e.to_string()),
            };

            if let Some(reason) = self.existing(&destination) {
                return Outcome::Skipped(reason);
            }

            return match self.download_subtitles(&download.episode, &destination, progress_callback)
            {
                Ok(()) => Outcome::Downloaded {
                    bytes: file_size(&destination),
                    path: destination.clone(),
                    subtitles: Some(destination),
                },
                Err(reason) => Outcome::Failed(reason),
            };
        }

        let destination = match output_path(
            output_dir,
            &download.file_name,
            self.options.extension.as_str(),
        ) {
            Ok(path) => path,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        if let Some(reason) = self.existing(&destination) {
            return Outcome::Skipped(reason);
        }

        let episode = &download.episode;
        let qualities = if episode.qualities.is_empty() {
            self.quality.fetch_qualities(&episode.playlist_url)
        } else {
            episode.qualities.clone()
        };
        let stream_url = self.quality.best_stream_url(&episode.playlist_url, &qualities);

        progress_callback(ProgressEvent::Downloading {
            stream_url: stream_url.clone(),
            destination: destination.clone(),
        });

        if let Err(reason) = self.remux_into(&stream_url, &destination) {
            return Outcome::Failed(reason);
        }

        let subtitles = if self.options.subtitles == SubtitleMode::Include {
            self.include_subtitles(download, progress_callback)
        } else {
            None
        };

        Outcome::Downloaded {
            bytes: file_size(&destination),
            path: destination,
            subtitles,
        }
    }

    /// Subtitles next to the video; failures only cost the subtitles
    fn include_subtitles<F>(
        &self,
        download: &PlannedDownload,
        progress_callback: &mut F,
    ) -> Option<PathBuf>
    where
        F: FnMut(ProgressEvent),
    {
        let destination = output_path(
            &self.options.output_dir,
            &download.file_name,
            SUBTITLE_EXTENSION,
        )
        .ok()?;

        if self.existing(&destination).is_some() {
            return Some(destination);
        }

        match self.download_subtitles(&download.episode, &destination, progress_callback) {
            Ok(()) => Some(destination),
            Err(reason) => {
                tracing::warn!(episode = %download.episode, reason, "subtitles unavailable");
                None
            }
        }
    }

    fn download_subtitles<F>(
        &self,
        episode: &Episode,
        destination: &Path,
        progress_callback: &mut F,
    ) -> Result<(), String>
    where
        F: FnMut(ProgressEvent),
    {
        let url = episode
            .subtitle_url(&self.subtitle_root)
            .ok_or_else(|| format!("no subtitles known for {episode} without a program id"))?;

        progress_callback(ProgressEvent::DownloadingSubtitles {
            destination: destination.to_path_buf(),
        });

        self.remux_into(&url, destination)
    }

    /// Remuxes into a partial file next to `destination`, moved into place
    /// only once the remux succeeded
    fn remux_into(&self, source: &str, destination: &Path) -> Result<(), String> {
        let partial = partial_path(destination);
        remove_if_present(&partial)
            .map_err(|e| format!("Failed to remove stale {}: {e}", partial.display()))?;

        if let Err(e) = self.remuxer.remux(source, &partial) {
            if let Err(cleanup) = remove_if_present(&partial) {
                tracing::warn!(path = %partial.display(), "could not remove partial file: {cleanup}");
            }
            return Err(e.to_string());
        }

        fs::rename(&partial, destination).map_err(|e| {
            format!(
                "Failed to move {} to {}: {e}",
                partial.display(),
                destination.display()
            )
        })
    }

    /// Reason to skip `destination`, if it exists and may not be replaced
    fn existing(&self, destination: &Path) -> Option<String> {
        (!self.options.overwrite && destination.exists())
            .then(|| format!("{} already exists", destination.display()))
    }
}

/// `Show.S01E01.mkv` → `Show.S01E01.part.mkv`
fn partial_path(destination: &Path) -> PathBuf {
    let stem = destination.file_stem().unwrap_or_default().to_string_lossy();
    let name = match destination.extension() {
        Some(extension) => format!("{stem}.part.{}", extension.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    destination.with_file_name(name)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}
