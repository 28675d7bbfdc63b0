//! Episode metadata retrieval
//!
//! This module provides the [`Episode`] model and the resolvers expanding a
//! classified URL into the episodes it addresses: [`PsapiResolver`] asks the
//! metadata API, [`LegacyResolver`] scrapes pages of the old site.
mod cached;
mod legacy;
mod psapi;
mod psapi_types;

pub(crate) use cached::CachedHttpClient;
pub use legacy::LegacyResolver;
pub use psapi::PsapiResolver;

use crate::config::QualityOrdering;
use crate::file_operations::episode_file_name;
use crate::http::FetchError;
use crate::quality::{Quality, best_stream_url};
use crate::url_classifier::UrlInfo;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static ORDINAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:sesong|season|episode)-)?(\d+)(?:$|-)").expect("valid ordinal pattern")
});

/// Errors that can occur during metadata retrieval operations.
///
/// None of these abort a run: the affected show, season or episode is
/// reported and skipped.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    Request(#[from] FetchError),

    /// The requested series was not found
    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    /// The series has no season of that name
    #[error("Could not find season '{season}' of {show}")]
    SeasonNotFound { show: String, season: String },

    /// The season has no episode with that number
    #[error("Could not find episode number '{number}' in season '{season}' of {show}")]
    EpisodeNumberNotFound {
        show: String,
        season: String,
        number: String,
    },

    /// The episode has no playable stream
    #[error("No playable stream for episode {0}")]
    NoPlayableStream(String),

    /// The page did not contain the expected elements
    #[error("Unexpected page layout at {url}: {reason}")]
    PageLayout { url: String, reason: String },

    /// The URL addresses nothing that can be resolved
    #[error("Nothing to download at {0}")]
    Unresolvable(String),
}

/// A season or episode position, numeric when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ordinal {
    Number(u32),
    /// Free text such as a season title
    Label(String),
}

impl Ordinal {
    /// Reads `"3"`, `"sesong-3"`, `"season-3"` and `"episode-3"` as numbers,
    /// anything else as a label.
    pub fn parse(raw: &str) -> Self {
        ORDINAL_PATTERN
            .captures(raw)
            .and_then(|caps| caps[1].parse().ok())
            .map_or_else(|| Ordinal::Label(raw.to_string()), Ordinal::Number)
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            Ordinal::Number(n) => Some(*n),
            Ordinal::Label(_) => None,
        }
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordinal::Number(n) => write!(f, "{n}"),
            Ordinal::Label(label) => f.write_str(label),
        }
    }
}

/// A resolved, downloadable episode
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub show_name: String,
    pub season: Option<Ordinal>,
    pub episode: Option<Ordinal>,
    /// Program id on the platform, when known
    pub episode_id: Option<String>,
    /// Master playlist URL
    pub playlist_url: String,
    /// Variants of the master playlist; empty until fetched
    pub qualities: Vec<Quality>,
}

impl Episode {
    /// Output file name without extension
    pub fn file_name(&self) -> String {
        episode_file_name(self)
    }

    /// Playlist URL of the best known variant
    pub fn best_playlist_url(&self) -> String {
        self.best_playlist_url_with(QualityOrdering::default())
    }

    pub fn best_playlist_url_with(&self, ordering: QualityOrdering) -> String {
        best_stream_url(&self.playlist_url, &self.qualities, ordering)
    }

    /// Subtitle playlist of the episode below `subtitle_root`
    ///
    /// Needs a program id of at least eight characters.
    pub fn subtitle_url(&self, subtitle_root: &str) -> Option<String> {
        let id = self.episode_id.as_deref()?;
        let (prefix, rest) = (id.get(..6)?, id.get(6..8)?);
        Some(format!(
            "{}/{prefix}/{rest}/{id}AA/TMP/master.m3u8",
            subtitle_root.trim_end_matches('/')
        ))
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers = (
            self.season.as_ref().and_then(Ordinal::number),
            self.episode.as_ref().and_then(Ordinal::number),
        );

        match numbers {
            (Some(season), Some(episode)) => {
                write!(f, "{} S{season:02}E{episode:02}", self.show_name)
            }
            _ => {
                write!(f, "{}", self.show_name)?;
                for part in [&self.season, &self.episode].into_iter().flatten() {
                    write!(f, " {part}")?;
                }
                Ok(())
            }
        }
    }
}

/// Expands a classified URL into episodes
pub trait MetadataResolver {
    /// Resolves `info` into its episodes in upstream order
    ///
    /// Failures are logged and leave the affected part out; an empty list
    /// means nothing could be resolved.
    fn resolve(&self, info: &UrlInfo) -> Vec<Episode>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(season: Option<Ordinal>, episode: Option<Ordinal>, id: Option<&str>) -> Episode {
        Episode {
            show_name: "Skam".to_string(),
            season,
            episode,
            episode_id: id.map(str::to_string),
            playlist_url: "https://cdn/x/master.m3u8".to_string(),
            qualities: Vec::new(),
        }
    }

    #[test]
    fn test_ordinal_parse() {
        assert_eq!(Ordinal::parse("3"), Ordinal::Number(3));
        assert_eq!(Ordinal::parse("sesong-4"), Ordinal::Number(4));
        assert_eq!(Ordinal::parse("season-12"), Ordinal::Number(12));
        assert_eq!(Ordinal::parse("episode-7"), Ordinal::Number(7));
        assert_eq!(Ordinal::parse("sesong-1-del-2"), Ordinal::Number(1));
        assert_eq!(
            Ordinal::parse("jul-i-skomakergata"),
            Ordinal::Label("jul-i-skomakergata".to_string())
        );
        assert_eq!(Ordinal::parse("2019"), Ordinal::Number(2019));
        assert_eq!(Ordinal::parse("12a"), Ordinal::Label("12a".to_string()));
    }

    #[test]
    fn test_display() {
        let numbered = episode(Some(Ordinal::Number(1)), Some(Ordinal::Number(2)), None);
        assert_eq!(numbered.to_string(), "Skam S01E02");

        let labelled = episode(
            Some(Ordinal::Label("jul".to_string())),
            Some(Ordinal::Number(2)),
            None,
        );
        assert_eq!(labelled.to_string(), "Skam jul 2");
    }

    #[test]
    fn test_subtitle_url() {
        let with_id = episode(None, None, Some("MSUB19120216"));
        assert_eq!(
            with_id.subtitle_url("https://undertekst.nrk.no/prod/").as_deref(),
            Some("https://undertekst.nrk.no/prod/MSUB19/12/MSUB19120216AA/TMP/master.m3u8")
        );

        assert_eq!(episode(None, None, None).subtitle_url("https://x"), None);
        assert_eq!(episode(None, None, Some("KOID")).subtitle_url("https://x"), None);
    }

    #[test]
    fn test_best_playlist_url() {
        let mut ep = episode(None, None, None);
        assert_eq!(ep.best_playlist_url(), "https://cdn/x/master.m3u8");

        ep.qualities = vec![
            Quality {
                bandwidth: 500,
                width: 640,
                height: 360,
                stream_url: "index_1_av.m3u8".to_string(),
            },
            Quality {
                bandwidth: 2000,
                width: 1280,
                height: 720,
                stream_url: "index_3_av.m3u8".to_string(),
            },
        ];
        assert_eq!(ep.best_playlist_url(), "https://cdn/x/index_3_av.m3u8");
    }
}
