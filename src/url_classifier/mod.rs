//! URL classification
//!
//! Turns a user supplied URL into a [`UrlInfo`] describing which show, season
//! or episode it addresses. The site changed its URL layout several times, so
//! classification runs an ordered list of [`UrlGrammar`]s and keeps the first
//! one that recognizes the path.

mod named;
mod positional;

pub use named::NamedGrammar;
pub use positional::PositionalGrammar;

use regex::Regex;
use thiserror::Error;

/// Errors that can occur while classifying a URL
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlClassifierError {
    /// The URL is not a site URL or no grammar recognizes its path
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// The URL layout a [`UrlInfo`] was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlScheme {
    /// `/serie/{show}/sesong/{season}/episode/{n}` style, backed by the metadata API
    Named,
    /// `/{category}/{show}/{id}/{season}/{episode}` style, only reachable by scraping
    Positional,
}

/// Classification result for a single URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    pub scheme: UrlScheme,
    /// Normalized URL the info was read from
    pub source_url: String,
    pub category: Option<String>,
    pub show_name: Option<String>,
    pub season_name: Option<String>,
    pub episode_number: Option<String>,
    pub episode_id: Option<String>,
}

/// How a [`UrlInfo`] is expanded into episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode<'a> {
    Episode { id: &'a str },
    EpisodeNumber { show: &'a str, season: &'a str, number: &'a str },
    Season { show: &'a str, season: &'a str },
    Show { show: &'a str },
    Unresolvable,
}

impl UrlInfo {
    /// Creates an empty info for the given scheme and URL
    pub fn new(scheme: UrlScheme, source_url: impl Into<String>) -> Self {
        Self {
            scheme,
            source_url: source_url.into(),
            category: None,
            show_name: None,
            season_name: None,
            episode_number: None,
            episode_id: None,
        }
    }

    /// Picks the resolution mode, checking the episode id first, then the
    /// episode number, the season and finally the show.
    pub fn mode(&self) -> ResolutionMode<'_> {
        if let Some(id) = self.episode_id.as_deref() {
            return ResolutionMode::Episode { id };
        }

        let Some(show) = self.show_name.as_deref() else {
            return ResolutionMode::Unresolvable;
        };

        match (self.season_name.as_deref(), self.episode_number.as_deref()) {
            (Some(season), Some(number)) => ResolutionMode::EpisodeNumber {
                show,
                season,
                number,
            },
            (Some(season), None) => ResolutionMode::Season { show, season },
            _ => ResolutionMode::Show { show },
        }
    }
}

/// One historical URL layout
pub trait UrlGrammar: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Reads the URL path (always starting and ending with `/`).
    ///
    /// Returns `None` if the path does not follow this grammar.
    fn parse(&self, source_url: &str, path: &str) -> Option<UrlInfo>;
}

/// Classifies URLs of one site against an ordered list of grammars
pub struct UrlClassifier {
    prefix: Regex,
    grammars: Vec<Box<dyn UrlGrammar>>,
}

impl UrlClassifier {
    /// Classifier for `host` trying the named grammar, then the positional one
    pub fn new(host: &str) -> Self {
        Self::with_grammars(
            host,
            vec![Box::new(NamedGrammar), Box::new(PositionalGrammar)],
        )
    }

    /// Classifier for `host` trying the positional grammar first
    pub fn legacy_first(host: &str) -> Self {
        Self::with_grammars(
            host,
            vec![Box::new(PositionalGrammar), Box::new(NamedGrammar)],
        )
    }

    /// Classifier with an explicit grammar order
    pub fn with_grammars(host: &str, grammars: Vec<Box<dyn UrlGrammar>>) -> Self {
        let pattern = format!(r"^https?://{}/", regex::escape(host));
        Self {
            prefix: Regex::new(&pattern).expect("escaped host is a valid pattern"),
            grammars,
        }
    }

    /// Classifies a URL
    ///
    /// # Errors
    ///
    /// Returns [`UrlClassifierError::InvalidUrl`] if the URL does not belong to
    /// the site or none of the grammars recognizes its path.
    pub fn classify(&self, url: &str) -> Result<UrlInfo, UrlClassifierError> {
        let normalized = normalize_url(url);

        if !self.prefix.is_match(&normalized) {
            return Err(UrlClassifierError::InvalidUrl {
                url: url.to_string(),
                reason: "not a URL of the supported site".to_string(),
            });
        }

        let parsed = url::Url::parse(&normalized).map_err(|e| UrlClassifierError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let path = parsed.path();

        for grammar in &self.grammars {
            if let Some(info) = grammar.parse(&normalized, path) {
                tracing::debug!(url = %normalized, grammar = grammar.name(), "classified URL");
                return Ok(info);
            }
        }

        Err(UrlClassifierError::InvalidUrl {
            url: url.to_string(),
            reason: "no known show, season or episode layout".to_string(),
        })
    }
}

/// Trims whitespace and makes sure the URL ends with `/`
///
/// Applying it twice gives the same result as applying it once.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
