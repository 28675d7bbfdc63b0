//! Stream quality selection
//!
//! Reads the variants of an HLS master playlist and picks the best one.

use crate::config::{MASTER_MANIFEST, QualityOrdering};
use crate::http::HttpClient;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, LazyLock};

static BANDWIDTH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[:,])BANDWIDTH=(\d+)").expect("valid bandwidth pattern"));

static RESOLUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RESOLUTION=(\d+)x(\d+)").expect("valid resolution pattern"));

/// One stream variant of a master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quality {
    /// Bits per second
    pub bandwidth: u64,
    pub width: u32,
    pub height: u32,
    /// Variant playlist, usually relative to the master playlist
    pub stream_url: String,
}

impl Quality {
    /// True if any of bandwidth, width or height is larger than `other`'s
    ///
    /// Two variants can each be better than the other.
    pub fn is_better_than(&self, other: &Quality) -> bool {
        self.bandwidth > other.bandwidth || self.width > other.width || self.height > other.height
    }

    fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BANDWIDTH={},RESOLUTION={}x{},URL={}",
            self.bandwidth, self.width, self.height, self.stream_url
        )
    }
}

/// Parses the variants of a master playlist
///
/// The first and last line of the body are playlist markers and never read as
/// variants. An attribute line carrying both `BANDWIDTH=` and `RESOLUTION=` is
/// paired with the URL line right after it; every other line is skipped.
pub fn parse_manifest(body: &str) -> Vec<Quality> {
    let lines: Vec<&str> = body.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    if lines.len() < 3 {
        return Vec::new();
    }
    let lines = &lines[1..lines.len() - 1];

    let mut qualities = Vec::new();
    let mut index = 0;

    while index + 1 < lines.len() {
        let stream_url = lines[index + 1].trim();
        let is_url_line = !stream_url.is_empty() && !stream_url.starts_with('#');

        match parse_attributes(lines[index]) {
            Some((bandwidth, width, height)) if is_url_line => {
                qualities.push(Quality {
                    bandwidth,
                    width,
                    height,
                    stream_url: stream_url.to_string(),
                });
                index += 2;
            }
            _ => index += 1,
        }
    }

    qualities
}

fn parse_attributes(line: &str) -> Option<(u64, u32, u32)> {
    let bandwidth = BANDWIDTH_PATTERN.captures(line)?[1].parse().ok()?;
    let resolution = RESOLUTION_PATTERN.captures(line)?;
    let width = resolution[1].parse().ok()?;
    let height = resolution[2].parse().ok()?;
    Some((bandwidth, width, height))
}

/// Orders variants best first
///
/// With [`QualityOrdering::AnyDimension`] the sort is a stable insertion sort:
/// a variant moves ahead of an earlier one only if it is better than it, so
/// between two mutually better variants the later one ends up first.
pub fn rank_qualities(qualities: &[Quality], ordering: QualityOrdering) -> Vec<Quality> {
    match ordering {
        QualityOrdering::AnyDimension => {
            let mut ranked: Vec<Quality> = Vec::with_capacity(qualities.len());
            for quality in qualities {
                let position = ranked
                    .iter()
                    .rposition(|placed| !quality.is_better_than(placed))
                    .map_or(0, |p| p + 1);
                ranked.insert(position, quality.clone());
            }
            ranked
        }
        QualityOrdering::Strict => {
            let mut ranked = qualities.to_vec();
            ranked.sort_by(|a, b| strict_cmp(b, a));
            ranked
        }
    }
}

fn strict_cmp(a: &Quality, b: &Quality) -> Ordering {
    a.bandwidth
        .cmp(&b.bandwidth)
        .then_with(|| a.pixels().cmp(&b.pixels()))
}

/// Replaces the manifest file name of `manifest_url` with `stream_url`
///
/// Absolute stream URLs are returned as they are. A query string on the
/// manifest URL is kept.
pub fn replace_manifest_file_name(manifest_url: &str, stream_url: &str) -> String {
    if stream_url.starts_with("http://") || stream_url.starts_with("https://") {
        return stream_url.to_string();
    }

    if let Some(position) = manifest_url.rfind(MASTER_MANIFEST) {
        let mut url = manifest_url.to_string();
        url.replace_range(position..position + MASTER_MANIFEST.len(), stream_url);
        return url;
    }

    let (path, query) = match manifest_url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (manifest_url, None),
    };

    let base = match path.rfind('/') {
        Some(slash) => &path[..=slash],
        None => "",
    };

    match query {
        Some(query) if !stream_url.contains('?') => format!("{base}{stream_url}?{query}"),
        _ => format!("{base}{stream_url}"),
    }
}

/// Playlist URL of the best variant, or the manifest URL if there are none
pub fn best_stream_url(
    manifest_url: &str,
    qualities: &[Quality],
    ordering: QualityOrdering,
) -> String {
    match rank_qualities(qualities, ordering).first() {
        Some(best) => replace_manifest_file_name(manifest_url, &best.stream_url),
        None => manifest_url.to_string(),
    }
}

/// Fetches master playlists and selects variants from them
pub struct QualitySelector {
    http: Arc<dyn HttpClient>,
    ordering: QualityOrdering,
}

impl QualitySelector {
    pub fn new(http: Arc<dyn HttpClient>, ordering: QualityOrdering) -> Self {
        Self { http, ordering }
    }

    /// Fetches and parses a master playlist
    ///
    /// Failures are logged and give an empty list, so the manifest URL itself
    /// ends up being downloaded.
    pub fn fetch_qualities(&self, manifest_url: &str) -> Vec<Quality> {
        match self.http.get_text(manifest_url) {
            Ok(body) => {
                let qualities = parse_manifest(&body);
                if qualities.is_empty() {
                    tracing::warn!(url = manifest_url, "manifest lists no stream variants");
                }
                qualities
            }
            Err(e) => {
                tracing::warn!(url = manifest_url, error = %e, "manifest unavailable");
                Vec::new()
            }
        }
    }

    /// Playlist URL of the best variant in `qualities`
    pub fn best_stream_url(&self, manifest_url: &str, qualities: &[Quality]) -> String {
        best_stream_url(manifest_url, qualities, self.ordering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeHttp;

    const MANIFEST: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=500000,RESOLUTION=640x360,CODECS=\"avc1.77.30, mp4a.40.2\"\n\
        index_1_av.m3u8\n\
        #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=2000000,RESOLUTION=1920x1080,CODECS=\"avc1.77.30, mp4a.40.2\"\n\
        index_4_av.m3u8\n\
        #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=64000,CODECS=\"mp4a.40.2\"\n\
        index_1_a.m3u8\n";

    fn quality(bandwidth: u64, width: u32, height: u32, url: &str) -> Quality {
        Quality {
            bandwidth,
            width,
            height,
            stream_url: url.to_string(),
        }
    }

    #[test]
    fn test_parse_manifest() {
        let qualities = parse_manifest(MANIFEST);

        assert_eq!(
            qualities,
            vec![
                quality(500000, 640, 360, "index_1_av.m3u8"),
                quality(2000000, 1920, 1080, "index_4_av.m3u8"),
            ]
        );
    }

    #[test]
    fn test_parse_manifest_skips_unpaired_lines() {
        let body = "#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-STREAM-INF:BANDWIDTH=900,RESOLUTION=320x180\n\
            low.m3u8\n\
            #EXT-X-ENDLIST";

        assert_eq!(parse_manifest(body), vec![quality(900, 320, 180, "low.m3u8")]);
    }

    #[test]
    fn test_average_bandwidth_is_not_bandwidth() {
        let body = "#EXTM3U\n\
            #EXT-X-STREAM-INF:AVERAGE-BANDWIDTH=100,RESOLUTION=320x180\n\
            low.m3u8\n";

        assert!(parse_manifest(body).is_empty());
    }

    #[test]
    fn test_parse_manifest_without_variants() {
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("#EXTM3U\n#EXT-X-ENDLIST\n").is_empty());
    }

    #[test]
    fn test_clearly_better_variant_ranks_first() {
        let low = quality(500, 640, 360, "low.m3u8");
        let high = quality(2000, 1920, 1080, "high.m3u8");

        for input in [vec![low.clone(), high.clone()], vec![high.clone(), low.clone()]] {
            let ranked = rank_qualities(&input, QualityOrdering::AnyDimension);
            assert_eq!(ranked[0], high);
        }
    }

    #[test]
    fn test_mutually_better_variants_depend_on_input_order() {
        let wide = quality(900, 200, 50, "wide.m3u8");
        let fast = quality(1000, 100, 100, "fast.m3u8");

        assert!(fast.is_better_than(&wide));
        assert!(wide.is_better_than(&fast));

        // The later of two mutually better variants wins
        let ranked = rank_qualities(&[fast.clone(), wide.clone()], QualityOrdering::AnyDimension);
        assert_eq!(ranked[0], wide);

        let ranked = rank_qualities(&[wide.clone(), fast.clone()], QualityOrdering::AnyDimension);
        assert_eq!(ranked[0], fast);
    }

    #[test]
    fn test_strict_ordering_is_order_independent() {
        let wide = quality(900, 200, 50, "wide.m3u8");
        let fast = quality(1000, 100, 100, "fast.m3u8");

        for input in [vec![fast.clone(), wide.clone()], vec![wide.clone(), fast.clone()]] {
            assert_eq!(rank_qualities(&input, QualityOrdering::Strict)[0], fast);
        }
    }

    #[test]
    fn test_equal_variants_keep_input_order() {
        let first = quality(1000, 640, 360, "first.m3u8");
        let second = quality(1000, 640, 360, "second.m3u8");

        let ranked = rank_qualities(&[first.clone(), second], QualityOrdering::AnyDimension);
        assert_eq!(ranked[0], first);
    }

    #[test]
    fn test_replace_manifest_file_name() {
        assert_eq!(
            replace_manifest_file_name(
                "https://nordond1a-f.akamaihd.net/i/wo/open/a1/a1b2/a1b2,.mp4.csmil/master.m3u8",
                "index_4_av.m3u8"
            ),
            "https://nordond1a-f.akamaihd.net/i/wo/open/a1/a1b2/a1b2,.mp4.csmil/index_4_av.m3u8"
        );
        assert_eq!(
            replace_manifest_file_name("https://cdn/x/playlist.m3u8?token=1", "v2.m3u8"),
            "https://cdn/x/v2.m3u8?token=1"
        );
        assert_eq!(
            replace_manifest_file_name("https://cdn/x/master.m3u8", "https://other/v.m3u8"),
            "https://other/v.m3u8"
        );
    }

    #[test]
    fn test_best_stream_url_without_qualities() {
        let url = "https://cdn/x/master.m3u8";
        assert_eq!(best_stream_url(url, &[], QualityOrdering::AnyDimension), url);
    }

    #[test]
    fn test_fetch_qualities() {
        let url = "https://cdn/x/master.m3u8";
        let http = Arc::new(FakeHttp::new().with_body(url, MANIFEST));
        let selector = QualitySelector::new(http, QualityOrdering::AnyDimension);

        let qualities = selector.fetch_qualities(url);
        assert_eq!(qualities.len(), 2);
        assert_eq!(
            selector.best_stream_url(url, &qualities),
            "https://cdn/x/index_4_av.m3u8"
        );
    }

    #[test]
    fn test_unavailable_manifest_degrades_to_manifest_url() {
        let url = "https://cdn/x/master.m3u8";
        let selector = QualitySelector::new(Arc::new(FakeHttp::new()), QualityOrdering::default());

        let qualities = selector.fetch_qualities(url);
        assert!(qualities.is_empty());
        assert_eq!(selector.best_stream_url(url, &qualities), url);
    }
}
