//! Runtime configuration
//!
//! Site endpoints and per-run download options. The CLI builds these from its
//! arguments; library users can start from the defaults.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Host serving the show, season and episode pages
pub const DEFAULT_SITE_HOST: &str = "tv.nrk.no";

/// Root of the program metadata API
pub const DEFAULT_METADATA_ROOT: &str = "http://psapi-granitt-prod-ne.cloudapp.net";

/// Root under which subtitle playlists are published
pub const DEFAULT_SUBTITLE_ROOT: &str = "https://undertekst.nrk.no/prod";

/// File name of the HLS master playlist inside a playlist URL
pub const MASTER_MANIFEST: &str = "master.m3u8";

/// How long cached metadata responses stay valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Container format of the downloaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputExtension {
    #[default]
    Mkv,
    Avi,
}

impl OutputExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputExtension::Mkv => "mkv",
            OutputExtension::Avi => "avi",
        }
    }
}

impl fmt::Display for OutputExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How stream variants of a manifest are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityOrdering {
    /// A variant wins if any of bandwidth, width or height is larger.
    /// Not transitive; the input order decides between mutually better variants.
    #[default]
    AnyDimension,
    /// Bandwidth first, then pixel count. A total order.
    Strict,
}

/// Whether subtitles are fetched alongside the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleMode {
    #[default]
    Skip,
    Include,
    Only,
}

/// How pages of the old site are fetched
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageRendering {
    /// Fetch the page source as served
    #[default]
    Plain,
    /// Render with a Chromium compatible browser in headless mode
    HeadlessBrowser {
        binary: PathBuf,
        /// Hide the browser's own output
        silent: bool,
    },
}

/// Endpoints of the site being downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Host name accepted in input URLs
    pub host: String,
    /// Root of the metadata API
    pub metadata_root: String,
    /// Root of the subtitle playlists
    pub subtitle_root: String,
    /// Try the positional (old site) grammar before the named one
    pub legacy_first: bool,
}

impl SiteConfig {
    /// Scheme and host, without trailing slash
    pub fn site_prefix(&self) -> String {
        format!("https://{}", self.host)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SITE_HOST.to_string(),
            metadata_root: DEFAULT_METADATA_ROOT.to_string(),
            subtitle_root: DEFAULT_SUBTITLE_ROOT.to_string(),
            legacy_first: false,
        }
    }
}

/// Options applied to every episode of a run
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Output directory; empty means the working directory
    pub output_dir: PathBuf,
    pub extension: OutputExtension,
    pub subtitles: SubtitleMode,
    /// Replace existing files instead of skipping the episode
    pub overwrite: bool,
    pub quality_ordering: QualityOrdering,
    /// Pass the remux tool's output through to the terminal
    pub verbose: bool,
}
