//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use talkreel_media::{BgmSelector, BgmSource, TimelineConfig};
use talkreel_models::{CharacterTable, EncodingConfig, Orientation, UserDictionary, DEFAULT_FPS};

use crate::animation::AnimationPolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

/// Default VOICEVOX engine port.
pub const DEFAULT_VOICEVOX_PORT: u16 = 50021;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which each run creates its own working directory
    pub work_root: PathBuf,
    /// VOICEVOX engine host
    pub voicevox_host: String,
    /// VOICEVOX engine port
    pub voicevox_port: u16,
    pub orientation: Orientation,
    pub fps: u32,
    /// Silent padding before the first and after the last turn
    pub padding_ms: u32,
    /// Explicit BGM file; wins over the library
    pub bgm_file: Option<PathBuf>,
    /// BGM library searched by atmosphere
    pub bgm_dir: Option<PathBuf>,
    /// Library fallback track
    pub bgm_default: String,
    /// Character table JSON; the built-in table is used when unset
    pub characters_path: Option<PathBuf>,
    /// Words registered with the engine before the first turn
    pub user_dict_path: Option<PathBuf>,
    pub synth_retries: u32,
    pub synth_retry_delay: Duration,
    pub animation: AnimationPolicy,
    pub encoding: EncodingConfig,
    /// Per-invocation ffmpeg timeout
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("talkreel"),
            voicevox_host: "localhost".to_string(),
            voicevox_port: DEFAULT_VOICEVOX_PORT,
            orientation: Orientation::Landscape,
            fps: DEFAULT_FPS,
            padding_ms: 1000,
            bgm_file: None,
            bgm_dir: None,
            bgm_default: "default.mp3".to_string(),
            characters_path: None,
            user_dict_path: None,
            synth_retries: 3,
            synth_retry_delay: Duration::from_millis(1000),
            animation: AnimationPolicy::Random,
            encoding: EncodingConfig::default(),
            ffmpeg_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Numeric values that fail to parse fall back to their defaults;
    /// unrecognised orientation or animation names are errors.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        let orientation = match env("TALKREEL_ORIENTATION") {
            Some(value) => value
                .parse()
                .map_err(|e| PipelineError::config(format!("TALKREEL_ORIENTATION: {}", e)))?,
            None => defaults.orientation,
        };

        let animation = match env("TALKREEL_ANIMATION") {
            Some(value) => AnimationPolicy::parse(&value)?,
            None => defaults.animation,
        };

        let mut encoding = EncodingConfig::default();
        if let Some(codec) = env("TALKREEL_VIDEO_CODEC") {
            encoding.codec = codec;
        }
        if let Some(codec) = env("TALKREEL_AUDIO_CODEC") {
            encoding.audio_codec = codec;
        }
        if let Some(bitrate) = env("TALKREEL_AUDIO_BITRATE") {
            encoding = encoding.with_audio_bitrate(bitrate);
        }
        if let Some(bitrate) = env("TALKREEL_VIDEO_BITRATE") {
            encoding = encoding.with_video_bitrate(bitrate);
        }

        Ok(Self {
            work_root: env("TALKREEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_root),
            voicevox_host: env("VOICEVOX_API_HOST").unwrap_or(defaults.voicevox_host),
            voicevox_port: parsed("VOICEVOX_PORT").unwrap_or(defaults.voicevox_port),
            orientation,
            fps: parsed("TALKREEL_FPS")
                .filter(|fps| *fps > 0)
                .unwrap_or(defaults.fps),
            padding_ms: parsed("TALKREEL_PADDING_MS").unwrap_or(defaults.padding_ms),
            bgm_file: env("TALKREEL_BGM").map(PathBuf::from),
            bgm_dir: env("TALKREEL_BGM_DIR").map(PathBuf::from),
            bgm_default: env("TALKREEL_BGM_DEFAULT").unwrap_or(defaults.bgm_default),
            characters_path: env("TALKREEL_CHARACTERS").map(PathBuf::from),
            user_dict_path: env("TALKREEL_USER_DICT").map(PathBuf::from),
            synth_retries: parsed("TALKREEL_SYNTH_RETRIES").unwrap_or(defaults.synth_retries),
            synth_retry_delay: Duration::from_millis(
                parsed("TALKREEL_SYNTH_RETRY_DELAY_MS").unwrap_or(1000),
            ),
            animation,
            encoding,
            ffmpeg_timeout_secs: parsed("TALKREEL_FFMPEG_TIMEOUT_SECS"),
        })
    }

    /// Base URL of the VOICEVOX engine.
    pub fn voicevox_url(&self) -> String {
        format!("http://{}:{}", self.voicevox_host, self.voicevox_port)
    }

    pub fn timeline(&self) -> TimelineConfig {
        TimelineConfig::default()
            .with_padding_ms(self.padding_ms)
            .with_fps(self.fps)
    }

    pub fn synthesis_retry(&self) -> RetryPolicy {
        RetryPolicy::new("speech_synthesis")
            .with_max_attempts(self.synth_retries)
            .with_base_delay(self.synth_retry_delay)
    }

    /// BGM source, if any is configured.
    pub fn bgm_source(&self) -> Option<BgmSource> {
        if let Some(file) = &self.bgm_file {
            return Some(BgmSource::File(file.clone()));
        }
        self.bgm_dir
            .as_ref()
            .map(|dir| BgmSource::Library(BgmSelector::new(dir, &self.bgm_default)))
    }

    /// Load the configured character table.
    pub async fn characters(&self) -> PipelineResult<CharacterTable> {
        match &self.characters_path {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| PipelineError::path_io(path, e))?;
                Ok(CharacterTable::from_json(&json)?)
            }
            None => Ok(CharacterTable::builtin()),
        }
    }

    /// Load the configured user dictionary, if any.
    pub async fn user_dictionary(&self) -> PipelineResult<Option<UserDictionary>> {
        let Some(path) = &self.user_dict_path else {
            return Ok(None);
        };
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::path_io(path, e))?;
        Ok(Some(UserDictionary::parse(&source)?))
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.voicevox_url(), "http://localhost:50021");
        assert_eq!(config.fps, 24);
        assert_eq!(config.synth_retries, 3);
        assert!(config.bgm_source().is_none());
        assert_eq!(config.timeline().padding_ms, 1000);
    }

    #[test]
    fn test_bgm_source_precedence() {
        let config = PipelineConfig {
            bgm_file: Some("/music/theme.mp3".into()),
            bgm_dir: Some("/music".into()),
            ..Default::default()
        };
        assert!(matches!(config.bgm_source(), Some(BgmSource::File(_))));

        let config = PipelineConfig {
            bgm_dir: Some("/music".into()),
            ..Default::default()
        };
        match config.bgm_source() {
            Some(BgmSource::Library(selector)) => {
                assert_eq!(selector.default_track(), std::path::Path::new("/music/default.mp3"))
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_synthesis_retry_policy() {
        let config = PipelineConfig {
            synth_retries: 5,
            synth_retry_delay: Duration::from_millis(250),
            ..Default::default()
        };
        let policy = config.synthesis_retry();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_characters_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("characters.json");
        std::fs::write(&path, r#"[{"name": "Alice", "speaker_id": 1}]"#).unwrap();

        let config = PipelineConfig {
            characters_path: Some(path),
            ..Default::default()
        };
        let table = config.characters().await.unwrap();
        assert!(table.contains("Alice"));

        let missing = PipelineConfig {
            characters_path: Some(dir.path().join("none.json")),
            ..Default::default()
        };
        assert!(matches!(
            missing.characters().await,
            Err(PipelineError::PathIo { .. })
        ));
    }

    #[tokio::test]
    async fn test_user_dictionary_from_file() {
        assert!(PipelineConfig::default().user_dictionary().await.unwrap().is_none());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("user_dict.txt");
        std::fs::write(&path, "Rust,ラスト,1\nCargo,カーゴ,1\n").unwrap();

        let config = PipelineConfig {
            user_dict_path: Some(path),
            ..Default::default()
        };
        let dict = config.user_dictionary().await.unwrap().unwrap();
        assert_eq!(dict.len(), 2);

        std::fs::write(dir.path().join("bad.txt"), "Rust,ラスト\n").unwrap();
        let bad = PipelineConfig {
            user_dict_path: Some(dir.path().join("bad.txt")),
            ..Default::default()
        };
        assert!(bad.user_dictionary().await.unwrap_err().is_config());
    }
}
