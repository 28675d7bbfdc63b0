//! Scraping resolver for the old site
//!
//! Positional-layout URLs have no metadata API behind them. Their episodes
//! are found by reading the season links of the show page, the episode lists
//! behind them and finally the player on each episode page.

use super::{Episode, MetadataResolver, MetadataRetrievalError, Ordinal};
use crate::browser::PageRenderer;
use crate::config::{MASTER_MANIFEST, SiteConfig};
use crate::orchestrator::CancellationToken;
use crate::url_classifier::{
    PositionalGrammar, ResolutionMode, UrlClassifier, UrlInfo, normalize_url,
};
use scraper::{Html, Selector};

/// Filled in by the player script some time after the wrapper appears
const PLAY_LINK: &str = "#nrk-player-wrapper .play-icon-action[href]";
const SEASON_LINK: &str = "a.season-link[data-identifier]";
const EPISODE_LINK: &str = "ul.episode-list li.episode-item a.clearfix";

/// Resolver scraping pages through an open renderer
pub struct LegacyResolver<'a> {
    renderer: &'a dyn PageRenderer,
    classifier: UrlClassifier,
    site_prefix: String,
    cancel: CancellationToken,
}

impl<'a> LegacyResolver<'a> {
    pub fn new(renderer: &'a dyn PageRenderer, site: &SiteConfig) -> Self {
        Self {
            renderer,
            classifier: UrlClassifier::with_grammars(&site.host, vec![Box::new(PositionalGrammar)]),
            site_prefix: site.site_prefix(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops scraping a show once `cancel` is cancelled, keeping the
    /// episodes scraped so far
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Makes a site-relative link absolute
    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{href}", self.site_prefix)
        } else {
            format!("{}/{href}", self.site_prefix)
        }
    }

    /// Episode list URLs, one per season link on the show page
    pub fn season_listing_urls(&self, info: &UrlInfo) -> Result<Vec<String>, MetadataRetrievalError> {
        let show = info.show_name.as_deref().unwrap_or_default();
        let html = self.renderer.render(&info.source_url, None).map_err(|e| {
            MetadataRetrievalError::PageLayout {
                url: info.source_url.clone(),
                reason: e.to_string(),
            }
        })?;

        let document = Html::parse_document(&html);
        let mut urls = Vec::new();

        for link in document.select(&selector(SEASON_LINK)) {
            let identifier = link.value().attr("data-identifier").unwrap_or_default();
            match identifier.trim().parse::<u64>() {
                Ok(season_id) => urls.push(format!(
                    "{}/program/Episodes/{show}/{season_id}",
                    self.site_prefix
                )),
                Err(_) => tracing::warn!(
                    url = %info.source_url,
                    identifier,
                    "season link without numeric identifier"
                ),
            }
        }

        Ok(urls)
    }

    /// Classified episode links of one episode list page
    pub fn listed_episodes(&self, listing_url: &str) -> Result<Vec<UrlInfo>, MetadataRetrievalError> {
        let html = self.renderer.render(listing_url, None).map_err(|e| {
            MetadataRetrievalError::PageLayout {
                url: listing_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let document = Html::parse_document(&html);
        let mut infos = Vec::new();

        for link in document.select(&selector(EPISODE_LINK)) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };

            let url = normalize_url(&self.absolute(href));
            match self.classifier.classify(&url) {
                Ok(info) => infos.push(info),
                Err(e) => tracing::warn!(listing_url, "skipping episode link: {e}"),
            }
        }

        Ok(infos)
    }

    /// Reads the playlist URL from the player of an episode page
    pub fn scrape_episode(&self, info: &UrlInfo) -> Result<Episode, MetadataRetrievalError> {
        let url = &info.source_url;
        let html = self.renderer.render(url, Some(PLAY_LINK)).map_err(|e| {
            MetadataRetrievalError::PageLayout {
                url: url.clone(),
                reason: e.to_string(),
            }
        })?;

        let document = Html::parse_document(&html);
        let href = document
            .select(&selector(PLAY_LINK))
            .find_map(|button| button.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .ok_or_else(|| MetadataRetrievalError::NoPlayableStream(url.clone()))?;

        Ok(Episode {
            show_name: info.show_name.clone().unwrap_or_default(),
            season: info.season_name.as_deref().map(Ordinal::parse),
            episode: info.episode_number.as_deref().map(Ordinal::parse),
            episode_id: info.episode_id.clone(),
            playlist_url: hls_playlist_url(&self.absolute(href.trim())),
            qualities: Vec::new(),
        })
    }

    /// Every episode reachable from the show page, in page order
    pub fn resolve_show(&self, info: &UrlInfo) -> Result<Vec<Episode>, MetadataRetrievalError> {
        let mut episodes = Vec::new();

        for listing_url in self.season_listing_urls(info)? {
            if self.cancel.is_cancelled() {
                break;
            }

            let listed = match self.listed_episodes(&listing_url) {
                Ok(listed) => listed,
                Err(e) => {
                    tracing::warn!(listing_url, "skipping season: {e}");
                    continue;
                }
            };

            for episode_info in listed {
                if self.cancel.is_cancelled() {
                    tracing::info!(url = %info.source_url, scraped = episodes.len(), "scraping cancelled");
                    return Ok(episodes);
                }

                match self.scrape_episode(&episode_info) {
                    Ok(episode) => episodes.push(episode),
                    Err(e) => tracing::warn!(url = %episode_info.source_url, "skipping episode: {e}"),
                }
            }
        }

        Ok(episodes)
    }
}

impl MetadataResolver for LegacyResolver<'_> {
    fn resolve(&self, info: &UrlInfo) -> Vec<Episode> {
        let result = match info.mode() {
            ResolutionMode::Episode { .. } => self.scrape_episode(info).map(|e| vec![e]),
            ResolutionMode::Unresolvable => Err(MetadataRetrievalError::Unresolvable(
                info.source_url.clone(),
            )),
            _ => self.resolve_show(info),
        };

        match result {
            Ok(episodes) => {
                tracing::info!(url = %info.source_url, count = episodes.len(), "scraped episodes");
                episodes
            }
            Err(e) => {
                tracing::warn!(url = %info.source_url, "{e}");
                Vec::new()
            }
        }
    }
}

/// Turns the player's HDS manifest link into the HLS master playlist
fn hls_playlist_url(player_href: &str) -> String {
    player_href
        .replace("/z/", "/i/")
        .replace("manifest.f4m", MASTER_MANIFEST)
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid constant selector")
}
