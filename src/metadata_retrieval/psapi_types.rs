/// Metadata API response types for deserialization.
///
/// These structures mirror the JSON documents of the program metadata API.
/// Identifiers and numbers show up both as JSON strings and as JSON numbers.
use serde::{Deserialize, Deserializer};

/// Response of `GET /series/{show}`
#[derive(Debug, Deserialize)]
pub(super) struct PsapiSeries {
    #[serde(default)]
    pub seasons: Vec<PsapiSeason>,
}

/// One season in a series response
#[derive(Debug, Deserialize)]
pub(super) struct PsapiSeason {
    /// Opaque season id used in the season episode list URL
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Season name as used in site URLs
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub name: Option<String>,
}

/// One entry of `GET /series/{show}/seasons/{season}/Episodes`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PsapiEpisodeSummary {
    /// Program id
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_number")]
    pub episode_number: Option<u32>,
}

/// Response of `GET /programs/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PsapiProgram {
    #[serde(default, deserialize_with = "optional_number")]
    pub episode_number: Option<u32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub series_title: Option<String>,
    /// Present on programs that can be streamed on demand
    #[serde(default)]
    pub media_assets_on_demand: Option<Vec<PsapiMediaAsset>>,
}

/// An on-demand media asset of a program
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PsapiMediaAsset {
    #[serde(default)]
    pub hls_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(StringOrNumber::deserialize(deserializer)?.into_string())
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

/// Any JSON value in a numeric field
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Integer(u64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl LenientNumber {
    fn into_u32(self) -> Option<u32> {
        match self {
            LenientNumber::Integer(n) => u32::try_from(n).ok(),
            LenientNumber::Float(f) if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => {
                Some(f as u32)
            }
            LenientNumber::Text(text) => text.trim().parse().ok(),
            LenientNumber::Float(_) | LenientNumber::Other(_) => None,
        }
    }
}

/// Numbers that are missing, null, negative, fractional or not numeric read
/// as `None`
fn optional_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<LenientNumber>::deserialize(deserializer)?.and_then(LenientNumber::into_u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_with_mixed_ids() {
        let series: PsapiSeries = serde_json::from_str(
            r#"{"title": "Skam", "seasons": [{"id": 94151, "name": "1"}, {"id": "94152", "name": "2"}]}"#,
        )
        .unwrap();

        assert_eq!(series.seasons.len(), 2);
        assert_eq!(series.seasons[0].id, "94151");
        assert_eq!(series.seasons[1].id, "94152");
        assert_eq!(series.seasons[1].name.as_deref(), Some("2"));
    }

    #[test]
    fn test_episode_summary() {
        let episodes: Vec<PsapiEpisodeSummary> = serde_json::from_str(
            r#"[{"id": "MYNT15000116", "episodeNumber": 1}, {"id": "MYNT15000216", "episodeNumber": "2"}, {"id": "MYNT15009916"}]"#,
        )
        .unwrap();

        assert_eq!(episodes[0].episode_number, Some(1));
        assert_eq!(episodes[1].episode_number, Some(2));
        assert_eq!(episodes[2].episode_number, None);
    }

    #[test]
    fn test_program() {
        let program: PsapiProgram = serde_json::from_str(
            r#"{
                "episodeNumber": 3,
                "seasonNumber": 1,
                "seriesTitle": "Skam",
                "mediaAssetsOnDemand": [{"hlsUrl": "https://cdn/x/master.m3u8", "duration": "PT21M"}]
            }"#,
        )
        .unwrap();

        assert_eq!(program.episode_number, Some(3));
        assert_eq!(program.season_number, Some(1));
        assert_eq!(program.series_title.as_deref(), Some("Skam"));
        let assets = program.media_assets_on_demand.unwrap();
        assert_eq!(assets[0].hls_url.as_deref(), Some("https://cdn/x/master.m3u8"));
    }

    #[test]
    fn test_odd_numbers_only_lose_their_field() {
        let program: PsapiProgram = serde_json::from_str(
            r#"{
                "episodeNumber": 3.0,
                "seasonNumber": -1,
                "seriesTitle": "Skam",
                "mediaAssetsOnDemand": [{"hlsUrl": "https://cdn/x/master.m3u8"}]
            }"#,
        )
        .unwrap();

        assert_eq!(program.episode_number, Some(3));
        assert_eq!(program.season_number, None);
        assert!(program.media_assets_on_demand.is_some());

        let episodes: Vec<PsapiEpisodeSummary> = serde_json::from_str(
            r#"[{"id": "A", "episodeNumber": 2.5}, {"id": "B", "episodeNumber": {"n": 1}}, {"id": "C", "episodeNumber": 4294967296}]"#,
        )
        .unwrap();
        assert!(episodes.iter().all(|e| e.episode_number.is_none()));
    }

    #[test]
    fn test_program_without_assets() {
        let program: PsapiProgram =
            serde_json::from_str(r#"{"seriesTitle": "Skam", "episodeNumber": null, "mediaAssetsOnDemand": null}"#)
                .unwrap();

        assert_eq!(program.episode_number, None);
        assert!(program.media_assets_on_demand.is_none());
    }
}
