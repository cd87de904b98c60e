//! Character and voice configuration.
//!
//! The table is built once (from JSON or [`CharacterTable::builtin`]) and
//! handed to the pipeline by value; nothing reads it from global state.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Caption colour used when a character has none configured.
pub const DEFAULT_CAPTION_COLOR: Rgb = Rgb(255, 255, 255);

/// RGB colour triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Scale every channel by `factor` (clamped to `[0, 1]`).
    pub fn scaled(&self, factor: f32) -> Rgb {
        let factor = factor.clamp(0.0, 1.0);
        let scale = |c: u8| (c as f32 * factor) as u8;
        Rgb(scale(self.0), scale(self.1), scale(self.2))
    }

    /// Colour in ffmpeg's `0xRRGGBB` notation.
    pub fn to_ffmpeg(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Voice synthesis parameters (VOICEVOX query scales).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VoiceParams {
    #[serde(default = "one")]
    pub speed_scale: f32,
    #[serde(default)]
    pub pitch_scale: f32,
    #[serde(default = "one")]
    pub intonation_scale: f32,
    #[serde(default = "one")]
    pub volume_scale: f32,
}

fn one() -> f32 {
    1.0
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speed_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            volume_scale: 1.0,
        }
    }
}

/// One speaking character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterProfile {
    /// Display name, also the speaker key used in scripts.
    pub name: String,
    /// Synthesis engine voice/style id.
    pub speaker_id: u32,
    #[serde(default)]
    pub voice: VoiceParams,
    #[serde(default = "default_color")]
    pub color: Rgb,
}

fn default_color() -> Rgb {
    DEFAULT_CAPTION_COLOR
}

impl CharacterProfile {
    pub fn new(name: impl Into<String>, speaker_id: u32) -> Self {
        Self {
            name: name.into(),
            speaker_id,
            voice: VoiceParams::default(),
            color: DEFAULT_CAPTION_COLOR,
        }
    }

    pub fn with_voice(mut self, voice: VoiceParams) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }
}

/// Immutable name-keyed table of characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterTable {
    characters: BTreeMap<String, CharacterProfile>,
}

impl CharacterTable {
    /// Build a table from profiles. Later duplicates replace earlier ones.
    pub fn new(profiles: impl IntoIterator<Item = CharacterProfile>) -> Self {
        let characters = profiles
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { characters }
    }

    /// Parse a JSON array of profiles.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let profiles: Vec<CharacterProfile> = serde_json::from_str(json)?;
        if profiles.is_empty() {
            return Err(ModelError::EmptyCharacterTable);
        }
        Ok(Self::new(profiles))
    }

    /// The VOICEVOX characters and caption colours the project ships with.
    pub fn builtin() -> Self {
        const ENTRIES: &[(&str, u32, Rgb)] = &[
            ("四国めたん", 2, Rgb(255, 0, 240)),
            ("ずんだもん", 3, Rgb(0, 255, 0)),
            ("春日部つむぎ", 8, Rgb(255, 165, 0)),
            ("波音リツ", 9, Rgb(255, 0, 0)),
            ("雨晴はう", 10, Rgb(0, 191, 255)),
            ("玄野武宏", 11, Rgb(0, 0, 255)),
            ("白上虎太郎", 12, Rgb(255, 215, 0)),
            ("青山龍星", 13, Rgb(138, 43, 226)),
            ("冥鳴ひまり", 14, Rgb(75, 0, 130)),
            ("もち子さん", 20, Rgb(255, 192, 203)),
            ("剣崎雌雄", 21, Rgb(0, 128, 0)),
        ];

        Self::new(
            ENTRIES
                .iter()
                .map(|(name, id, color)| CharacterProfile::new(*name, *id).with_color(*color)),
        )
    }

    /// Look up a character by name.
    pub fn get(&self, name: &str) -> ModelResult<&CharacterProfile> {
        self.characters
            .get(name)
            .ok_or_else(|| ModelError::UnknownCharacter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.characters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.characters.keys().map(String::as_str)
    }
}
