//! Named URL layout of the current site
//!
//! `/serie/{show}` followed by either `/sesong/{season}/episode/{number}` or the
//! older `/{season}/{episode id}`. The English spellings `series`/`season` are
//! accepted as well.

use super::{UrlGrammar, UrlInfo, UrlScheme};
use regex::Regex;
use std::sync::LazyLock;

static SHOW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:serie|series)/(?P<show_name>[^/]+)(?P<rest>/.*)?$")
        .expect("valid show pattern")
});

static EPISODE_PATTERN_NEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/(?:sesong|season)/(?P<season_name>[^/]+)(?:/episode/(?P<episode_number>[^/]+))?",
    )
    .expect("valid episode pattern")
});

static EPISODE_PATTERN_OLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?P<season_name>[^/]+)(?:/(?P<episode_id>[^/]+))?")
        .expect("valid episode pattern")
});

/// Grammar for `/serie/...` URLs
pub struct NamedGrammar;

impl UrlGrammar for NamedGrammar {
    fn name(&self) -> &'static str {
        "named"
    }

    fn parse(&self, source_url: &str, path: &str) -> Option<UrlInfo> {
        let show_match = SHOW_PATTERN.captures(path)?;

        let mut info = UrlInfo::new(UrlScheme::Named, source_url);
        info.show_name = Some(show_match["show_name"].to_string());

        let rest = show_match.name("rest").map_or("", |m| m.as_str());

        // Nothing after the show name: the whole show
        if rest.trim_matches('/').is_empty() {
            return Some(info);
        }

        let capture = |caps: &regex::Captures<'_>, name: &str| {
            caps.name(name).map(|m| m.as_str().to_string())
        };

        if let Some(caps) = EPISODE_PATTERN_NEW.captures(rest) {
            info.season_name = capture(&caps, "season_name");
            info.episode_number = capture(&caps, "episode_number");
        } else if let Some(caps) = EPISODE_PATTERN_OLD.captures(rest) {
            info.season_name = capture(&caps, "season_name");
            info.episode_id = capture(&caps, "episode_id");
        } else {
            return None;
        }

        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Option<UrlInfo> {
        NamedGrammar.parse("https://tv.nrk.no/", path)
    }

    #[test]
    fn test_show_only() {
        let info = parse("/serie/skam/").unwrap();
        assert_eq!(info.show_name.as_deref(), Some("skam"));
        assert_eq!(info.season_name, None);
        assert_eq!(info.episode_number, None);
        assert_eq!(info.episode_id, None);
    }

    #[test]
    fn test_new_season_form() {
        let info = parse("/serie/skam/sesong/2/").unwrap();
        assert_eq!(info.season_name.as_deref(), Some("2"));
        assert_eq!(info.episode_number, None);

        let info = parse("/serie/skam/sesong/2/episode/10/").unwrap();
        assert_eq!(info.season_name.as_deref(), Some("2"));
        assert_eq!(info.episode_number.as_deref(), Some("10"));
    }

    #[test]
    fn test_english_spelling() {
        let info = parse("/series/ramme-show/season/1/episode/3/").unwrap();
        assert_eq!(info.show_name.as_deref(), Some("ramme-show"));
        assert_eq!(info.season_name.as_deref(), Some("1"));
        assert_eq!(info.episode_number.as_deref(), Some("3"));
    }

    #[test]
    fn test_old_form_with_episode_id() {
        let info = parse("/serie/skam/sesong-4/MYNT15400117/").unwrap();
        assert_eq!(info.season_name.as_deref(), Some("sesong-4"));
        assert_eq!(info.episode_id.as_deref(), Some("MYNT15400117"));
        assert_eq!(info.episode_number, None);
    }

    #[test]
    fn test_new_form_wins_over_old_form() {
        // "sesong" would also be read as a season name by the old form
        let info = parse("/serie/skam/sesong/3/").unwrap();
        assert_eq!(info.season_name.as_deref(), Some("3"));
        assert_eq!(info.episode_id, None);
    }

    #[test]
    fn test_other_paths_are_ignored() {
        assert!(parse("/program/KOID20001516/").is_none());
        assert!(parse("/serie/").is_none());
        assert!(parse("/").is_none());
    }
}
