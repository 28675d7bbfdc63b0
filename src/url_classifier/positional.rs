//! Positional URL layout of the old site
//!
//! Path segments are read in order as category, show, episode id, season and
//! episode. A URL with an episode id but only four segments carries the
//! episode, not the season, in its last segment.

use super::{UrlGrammar, UrlInfo, UrlScheme};

/// Grammar for `/{category}/{show}/{episode id}/{season}/{episode}` URLs
pub struct PositionalGrammar;

impl UrlGrammar for PositionalGrammar {
    fn name(&self) -> &'static str {
        "positional"
    }

    fn parse(&self, source_url: &str, path: &str) -> Option<UrlInfo> {
        let mut info = UrlInfo::new(UrlScheme::Positional, source_url);

        let mut season = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let slot = if info.category.is_none() {
                &mut info.category
            } else if info.show_name.is_none() {
                &mut info.show_name
            } else if info.episode_id.is_none() {
                &mut info.episode_id
            } else if season.is_none() {
                &mut season
            } else if info.episode_number.is_none() {
                &mut info.episode_number
            } else {
                break;
            };
            *slot = Some(segment.to_string());
        }

        if info.episode_number.is_none() && info.episode_id.is_some() {
            info.episode_number = season.take();
        }
        info.season_name = season;

        // A category alone addresses nothing downloadable
        info.show_name.as_ref()?;

        Some(info)
    }
}
