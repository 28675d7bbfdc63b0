//! Metadata API resolver
//!
//! Expands named-layout URLs by walking the series → season → program
//! documents of the metadata API. Each lookup that comes back empty only
//! removes its own branch from the result.

use super::psapi_types::{PsapiEpisodeSummary, PsapiProgram, PsapiSeries};
use super::{Episode, MetadataResolver, MetadataRetrievalError, Ordinal};
use crate::http::{FetchError, HttpClient, get_json};
use crate::orchestrator::CancellationToken;
use crate::url_classifier::{ResolutionMode, UrlInfo};
use std::sync::Arc;

/// Resolver backed by the program metadata API
pub struct PsapiResolver {
    client: Arc<dyn HttpClient>,
    root: String,
    cancel: CancellationToken,
}

impl PsapiResolver {
    /// Creates a resolver for the API under `root`
    pub fn new(client: Arc<dyn HttpClient>, root: impl Into<String>) -> Self {
        Self {
            client,
            root: root.into().trim_end_matches('/').to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops season and show expansion once `cancel` is cancelled, keeping
    /// the episodes resolved so far
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn series_url(&self, show: &str) -> String {
        format!("{}/series/{show}", self.root)
    }

    fn season_url(&self, show: &str, season_id: &str) -> String {
        format!("{}/series/{show}/seasons/{season_id}/Episodes", self.root)
    }

    fn program_url(&self, id: &str) -> String {
        format!("{}/programs/{id}", self.root)
    }

    fn fetch_series(&self, show: &str) -> Result<PsapiSeries, MetadataRetrievalError> {
        get_json(self.client.as_ref(), &self.series_url(show)).map_err(|e| match e {
            FetchError::NotFound(_) => MetadataRetrievalError::SeriesNotFound(show.to_string()),
            other => other.into(),
        })
    }

    fn fetch_season(
        &self,
        show: &str,
        season_id: &str,
    ) -> Result<Vec<PsapiEpisodeSummary>, MetadataRetrievalError> {
        Ok(get_json(self.client.as_ref(), &self.season_url(show, season_id))?)
    }

    /// Looks up the id of the season called `season` (exact match)
    fn season_id_for_name(&self, show: &str, season: &str) -> Result<String, MetadataRetrievalError> {
        self.fetch_series(show)?
            .seasons
            .into_iter()
            .find(|s| s.name.as_deref() == Some(season))
            .map(|s| s.id)
            .ok_or_else(|| MetadataRetrievalError::SeasonNotFound {
                show: show.to_string(),
                season: season.to_string(),
            })
    }

    /// Resolves a single program
    ///
    /// `show_hint` names the episode when the program document has no series
    /// title.
    pub fn resolve_episode_id(
        &self,
        id: &str,
        show_hint: Option<&str>,
    ) -> Result<Episode, MetadataRetrievalError> {
        let program: PsapiProgram = get_json(self.client.as_ref(), &self.program_url(id))?;

        let playlist_url = program
            .media_assets_on_demand
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|asset| asset.hls_url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MetadataRetrievalError::NoPlayableStream(id.to_string()))?;

        let show_name = program
            .series_title
            .or_else(|| show_hint.map(str::to_string))
            .unwrap_or_else(|| id.to_string());

        Ok(Episode {
            show_name,
            season: program.season_number.map(Ordinal::Number),
            episode: program.episode_number.map(Ordinal::Number),
            episode_id: Some(id.to_string()),
            playlist_url,
            qualities: Vec::new(),
        })
    }

    /// Resolves episode `number` of the season called `season`
    pub fn resolve_episode_number(
        &self,
        show: &str,
        season: &str,
        number: &str,
    ) -> Result<Episode, MetadataRetrievalError> {
        let not_found = || MetadataRetrievalError::EpisodeNumberNotFound {
            show: show.to_string(),
            season: season.to_string(),
            number: number.to_string(),
        };

        let wanted: u32 = number.trim().parse().map_err(|_| not_found())?;
        let season_id = self.season_id_for_name(show, season)?;

        let mut found = None;
        for summary in self.fetch_season(show, &season_id)? {
            if summary.episode_number == Some(wanted) {
                found = Some(summary);
                break;
            }
        }

        let summary = found.ok_or_else(not_found)?;
        self.resolve_episode_id(&summary.id, Some(show))
    }

    /// Resolves every playable episode of a season, in listing order
    pub fn resolve_season_id(
        &self,
        show: &str,
        season_id: &str,
    ) -> Result<Vec<Episode>, MetadataRetrievalError> {
        let summaries = self.fetch_season(show, season_id)?;
        let mut episodes = Vec::new();

        for summary in &summaries {
            if self.cancel.is_cancelled() {
                tracing::info!(show, season_id, resolved = episodes.len(), "resolution cancelled");
                break;
            }

            match self.resolve_episode_id(&summary.id, Some(show)) {
                Ok(episode) => episodes.push(episode),
                Err(e) => {
                    tracing::warn!(show, season_id, episode_id = %summary.id, "skipping episode: {e}")
                }
            }
        }

        Ok(episodes)
    }

    pub fn resolve_season_name(
        &self,
        show: &str,
        season: &str,
    ) -> Result<Vec<Episode>, MetadataRetrievalError> {
        let season_id = self.season_id_for_name(show, season)?;
        self.resolve_season_id(show, &season_id)
    }

    /// Resolves all seasons of a show, concatenated in season order
    pub fn resolve_show(&self, show: &str) -> Result<Vec<Episode>, MetadataRetrievalError> {
        let series = self.fetch_series(show)?;
        let mut episodes = Vec::new();

        for season in &series.seasons {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.resolve_season_id(show, &season.id) {
                Ok(found) => episodes.extend(found),
                Err(e) => tracing::warn!(show, season_id = %season.id, "skipping season: {e}"),
            }
        }

        Ok(episodes)
    }

    fn try_resolve(&self, info: &UrlInfo) -> Result<Vec<Episode>, MetadataRetrievalError> {
        match info.mode() {
            ResolutionMode::Episode { id } => {
                Ok(vec![self.resolve_episode_id(id, info.show_name.as_deref())?])
            }
            ResolutionMode::EpisodeNumber {
                show,
                season,
                number,
            } => Ok(vec![self.resolve_episode_number(show, season, number)?]),
            ResolutionMode::Season { show, season } => self.resolve_season_name(show, season),
            ResolutionMode::Show { show } => self.resolve_show(show),
            ResolutionMode::Unresolvable => Err(MetadataRetrievalError::Unresolvable(
                info.source_url.clone(),
            )),
        }
    }
}

impl MetadataResolver for PsapiResolver {
    fn resolve(&self, info: &UrlInfo) -> Vec<Episode> {
        match self.try_resolve(info) {
            Ok(episodes) => {
                tracing::info!(url = %info.source_url, count = episodes.len(), "resolved episodes");
                episodes
            }
            Err(e) => {
                tracing::warn!(url = %info.source_url, "{e}");
                Vec::new()
            }
        }
    }
}
