//! Keyword-based background track selection.
//!
//! Track file names double as their tags: `calm_piano-morning.mp3` carries
//! `{calm, piano, morning}`. The script's atmosphere string is split the
//! same way and the track sharing the most keywords wins.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// File extensions recognised as background tracks.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "aac", "ogg", "flac"];

/// Split text into lower-cased keywords.
///
/// Separators are whitespace, ASCII and CJK punctuation, `_` and `-`.
pub fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || is_cjk_punctuation(c))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(
        c,
        '、' | '。' | '，' | '．' | '・' | '：' | '；' | '！' | '？' | '「' | '」' | '『' | '』'
            | '（' | '）' | '【' | '】' | '〜' | '～' | '　'
    )
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pick the best match among `tracks` for `mood`.
///
/// Tracks are considered in the given order; on a tie the earlier one wins.
/// Returns `None` when no track shares a keyword with the mood.
pub fn best_match<'a>(tracks: &'a [PathBuf], mood: &BTreeSet<String>) -> Option<&'a PathBuf> {
    let mut best: Option<(&PathBuf, usize)> = None;
    for track in tracks {
        let stem = track.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let score = keywords(stem).intersection(mood).count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((track, score));
        }
    }
    best.map(|(track, _)| track)
}

/// Chooses a background track from a library directory.
#[derive(Debug, Clone)]
pub struct BgmSelector {
    library_dir: PathBuf,
    default_track: PathBuf,
}

impl BgmSelector {
    /// `default_track` is used when nothing matches. Relative paths are
    /// resolved against `library_dir`.
    pub fn new(library_dir: impl Into<PathBuf>, default_track: impl Into<PathBuf>) -> Self {
        let library_dir = library_dir.into();
        let default_track = default_track.into();
        let default_track = if default_track.is_relative() {
            library_dir.join(default_track)
        } else {
            default_track
        };
        Self {
            library_dir,
            default_track,
        }
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    pub fn default_track(&self) -> &Path {
        &self.default_track
    }

    /// Audio files in the library, sorted by file name.
    pub async fn list_tracks(&self) -> MediaResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.library_dir)
            .await
            .map_err(|e| MediaError::path_io(&self.library_dir, e))?;

        let mut tracks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::path_io(&self.library_dir, e))?
        {
            let path = entry.path();
            if path.is_file() && is_audio_file(&path) {
                tracks.push(path);
            }
        }
        tracks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(tracks)
    }

    /// Select the track for a script atmosphere.
    ///
    /// Falls back to the default track; a missing default is a
    /// configuration error.
    pub async fn select(&self, atmosphere: Option<&str>) -> MediaResult<PathBuf> {
        let mood = atmosphere.map(keywords).unwrap_or_default();

        if !mood.is_empty() {
            match self.list_tracks().await {
                Ok(tracks) => {
                    debug!(tracks = tracks.len(), mood = ?mood, "Scanning BGM library");
                    if let Some(track) = best_match(&tracks, &mood) {
                        info!(track = %track.display(), "Selected BGM by atmosphere");
                        return Ok(track.clone());
                    }
                }
                Err(e) => warn!(error = %e, "BGM library unreadable, using default track"),
            }
        }

        if !self.default_track.is_file() {
            return Err(MediaError::config(format!(
                "no BGM matched and default track {} does not exist",
                self.default_track.display()
            )));
        }

        info!(track = %self.default_track.display(), "Using default BGM");
        Ok(self.default_track.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(keywords("Calm_Piano-morning"), set(&["calm", "piano", "morning"]));
        assert_eq!(keywords("楽しい、明るい　元気！"), set(&["楽しい", "明るい", "元気"]));
        assert_eq!(keywords("  happy,  upbeat. "), set(&["happy", "upbeat"]));
        assert!(keywords("").is_empty());
    }

    #[test]
    fn test_best_match_prefers_larger_overlap() {
        let tracks = vec![
            PathBuf::from("a_calm.mp3"),
            PathBuf::from("b_calm_night.mp3"),
            PathBuf::from("c_upbeat.mp3"),
        ];
        let mood = set(&["calm", "night"]);
        assert_eq!(best_match(&tracks, &mood), Some(&tracks[1]));
        assert_eq!(best_match(&tracks, &set(&["sad"])), None);
    }

    #[test]
    fn test_best_match_tie_goes_to_first() {
        let tracks = vec![PathBuf::from("calm_a.wav"), PathBuf::from("calm_b.wav")];
        assert_eq!(best_match(&tracks, &set(&["calm"])), Some(&tracks[0]));
    }

    #[tokio::test]
    async fn test_select_from_library() {
        let dir = TempDir::new().unwrap();
        for name in ["default.mp3", "明るい_ポップ.mp3", "calm_piano.wav", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let selector = BgmSelector::new(dir.path(), "default.mp3");

        let tracks = selector.list_tracks().await.unwrap();
        assert_eq!(tracks.len(), 3);

        let chosen = selector.select(Some("楽しい、明るい")).await.unwrap();
        assert!(chosen.ends_with("明るい_ポップ.mp3"));

        let chosen = selector.select(Some("Calm")).await.unwrap();
        assert!(chosen.ends_with("calm_piano.wav"));

        let fallback = selector.select(Some("unmatched")).await.unwrap();
        assert_eq!(fallback, dir.path().join("default.mp3"));

        assert_eq!(selector.select(None).await.unwrap(), fallback);
    }

    #[tokio::test]
    async fn test_missing_default_is_config_error() {
        let dir = TempDir::new().unwrap();
        let selector = BgmSelector::new(dir.path(), "missing.mp3");
        let err = selector.select(Some("calm")).await.unwrap_err();
        assert!(err.is_config());

        let gone = BgmSelector::new(dir.path().join("nope"), "missing.mp3");
        assert!(gone.select(Some("calm")).await.unwrap_err().is_config());
    }
}
