//! Output file naming
//!
//! Derives the file name of an episode from its show, season and episode and
//! places it in the output directory.

use crate::metadata_retrieval::{Episode, Ordinal};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during file operations
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },
}

/// A download with its final file name (without extension)
#[derive(Debug, Clone)]
pub struct PlannedDownload {
    pub episode: Episode,
    pub file_name: String,
    /// Duplicate suffix applied (if any)
    pub duplicate_suffix: Option<usize>,
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Lowercases and joins words with dots: `"Jul i Skomakergata"` → `"jul.i.skomakergata"`
pub fn dashed_to_dotted(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split(['-', ' '])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Uppercases the first character
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn ordinal_part(ordinal: &Ordinal) -> String {
    match ordinal {
        Ordinal::Number(n) => format!("{n:02}"),
        Ordinal::Label(label) => dashed_to_dotted(label),
    }
}

/// File name of an episode, without extension
///
/// `Show.S01E02` when season and episode numbers are known, otherwise the
/// dotted season and episode labels, otherwise the program id.
pub fn episode_file_name(episode: &Episode) -> String {
    let show = capitalize(&dashed_to_dotted(&episode.show_name));

    let numbers = (
        episode.season.as_ref().and_then(Ordinal::number),
        episode.episode.as_ref().and_then(Ordinal::number),
    );

    let position = match (numbers, &episode.season, &episode.episode) {
        ((Some(season), Some(number)), _, _) => Some(format!("S{season:02}E{number:02}")),
        (_, Some(season), Some(number)) => {
            Some(format!("{}.{}", ordinal_part(season), ordinal_part(number)))
        }
        (_, Some(season), None) => Some(ordinal_part(season)),
        (_, None, Some(number)) => Some(ordinal_part(number)),
        (_, None, None) => episode.episode_id.clone(),
    };

    let name = match position {
        Some(position) if show.is_empty() => position,
        Some(position) => format!("{show}.{position}"),
        None => show,
    };

    sanitize_filename(&name)
}

/// Joins `file_name.extension` onto `output_dir`, creating the directory
///
/// An empty `output_dir` gives a bare file name relative to the working
/// directory.
pub fn output_path(
    output_dir: &Path,
    file_name: &str,
    extension: &str,
) -> Result<PathBuf, FileOperationError> {
    let file = format!("{file_name}.{extension}");

    if output_dir.as_os_str().is_empty() {
        return Ok(PathBuf::from(file));
    }

    fs::create_dir_all(output_dir).map_err(|e| FileOperationError::DirectoryCreation {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    Ok(output_dir.join(file))
}

/// Output path of an episode
pub fn episode_path(
    episode: &Episode,
    output_dir: &Path,
    extension: &str,
) -> Result<PathBuf, FileOperationError> {
    output_path(output_dir, &episode.file_name(), extension)
}

/// Assigns file names to a batch, keeping them unique
///
/// For duplicate names, adds numeric suffix starting from 2:
/// - First occurrence: `name`
/// - Second occurrence: `name (2)`
/// - Third occurrence: `name (3)`
pub fn plan_downloads(episodes: Vec<Episode>) -> Vec<PlannedDownload> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    episodes
        .into_iter()
        .map(|episode| {
            let base = episode.file_name();
            let occurrence = seen.entry(base.clone()).or_insert(0);
            *occurrence += 1;

            let (file_name, duplicate_suffix) = if *occurrence == 1 {
                (base, None)
            } else {
                (format!("{base} ({occurrence})"), Some(*occurrence))
            };

            PlannedDownload {
                episode,
                file_name,
                duplicate_suffix,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn episode(show: &str, season: Option<Ordinal>, number: Option<Ordinal>) -> Episode {
        Episode {
            show_name: show.to_string(),
            season,
            episode: number,
            episode_id: None,
            playlist_url: "https://cdn/x/master.m3u8".to_string(),
            qualities: Vec::new(),
        }
    }

    fn numbered(show: &str, season: u32, number: u32) -> Episode {
        episode(
            show,
            Some(Ordinal::Number(season)),
            Some(Ordinal::Number(number)),
        )
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Normal Title"), "Normal Title");
        assert_eq!(sanitize_filename("Title: With Colon"), "Title- With Colon");
        assert_eq!(sanitize_filename("Path/With\\Slashes"), "Path-With-Slashes");
        assert_eq!(sanitize_filename("  Spaces  "), "Spaces");
        assert_eq!(sanitize_filename("...dots..."), "dots");
    }

    #[test]
    fn test_dashed_to_dotted() {
        assert_eq!(dashed_to_dotted("Jul i Skomakergata"), "jul.i.skomakergata");
        assert_eq!(dashed_to_dotted("side-om-side"), "side.om.side");
        assert_eq!(dashed_to_dotted(" a--b "), "a.b");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("ramme.show"), "Ramme.show");
        assert_eq!(capitalize("øyvind"), "Øyvind");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_numbered_file_name() {
        assert_eq!(numbered("Ramme show", 3, 7).file_name(), "Ramme.show.S03E07");
        assert_eq!(numbered("side-om-side", 12, 110).file_name(), "Side.om.side.S12E110");
    }

    #[test]
    fn test_labelled_file_names() {
        let labelled = episode(
            "skam",
            Some(Ordinal::Label("jul-special".to_string())),
            Some(Ordinal::Number(2)),
        );
        assert_eq!(labelled.file_name(), "Skam.jul.special.02");

        let episode_only = episode("skam", None, Some(Ordinal::Number(4)));
        assert_eq!(episode_only.file_name(), "Skam.04");

        let label_only = episode("skam", None, Some(Ordinal::Label("Finalen".to_string())));
        assert_eq!(label_only.file_name(), "Skam.finalen");

        let mut id_only = episode("skam", None, None);
        id_only.episode_id = Some("MSUB19120216".to_string());
        assert_eq!(id_only.file_name(), "Skam.MSUB19120216");
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(numbered("AC/DC: Live", 1, 1).file_name(), "Ac-dc-.live.S01E01");
    }

    #[test]
    fn test_path_without_output_dir() {
        let path = episode_path(&numbered("Ramme show", 3, 7), Path::new(""), "mkv").unwrap();
        assert_eq!(path, PathBuf::from("Ramme.show.S03E07.mkv"));
    }

    #[test]
    fn test_path_creates_output_dir() {
        let temp = TempDir::new().unwrap();
        let output_dir = temp.path().join("tmp").join("out");

        let path = episode_path(&numbered("Ramme show", 3, 7), &output_dir, "avi").unwrap();

        assert_eq!(path, output_dir.join("Ramme.show.S03E07.avi"));
        assert!(output_dir.is_dir());

        // Existing directories are fine
        assert!(episode_path(&numbered("Ramme show", 3, 8), &output_dir, "avi").is_ok());
    }

    #[test]
    fn test_plan_downloads_suffixes_duplicates() {
        let planned = plan_downloads(vec![
            numbered("skam", 1, 1),
            numbered("skam", 1, 2),
            numbered("skam", 1, 1),
            numbered("skam", 1, 1),
        ]);

        let names: Vec<_> = planned.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Skam.S01E01",
                "Skam.S01E02",
                "Skam.S01E01 (2)",
                "Skam.S01E01 (3)"
            ]
        );
        assert_eq!(planned[2].duplicate_suffix, Some(2));
        assert_eq!(planned[0].duplicate_suffix, None);
    }
}
