//! Dialogue turns and scripts.
//!
//! Script text format, one entry per line:
//!
//! ```text
//! タイトル: <title>
//! 雰囲気: <atmosphere>
//! ずんだもん: <line>
//! 四国めたん: <line>
//! ```
//!
//! `Title`/`Atmosphere` are accepted as ASCII aliases, and the full-width
//! colon works wherever the ASCII one does.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::character::CharacterTable;
use crate::error::{ModelError, ModelResult};

const TITLE_KEYS: &[&str] = &["タイトル", "title"];
const ATMOSPHERE_KEYS: &[&str] = &["雰囲気", "atmosphere"];

/// Known generator misspellings of character names and speech endings.
const SPELLING_CORRECTIONS: &[(&str, &str)] = &[
    ("メタん", "めたん"),
    ("メタン", "めたん"),
    ("ずんだモン", "ずんだもん"),
    ("なのだな？", "なのだ？"),
];

/// One line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DialogueTurn {
    pub speaker: String,
    pub text: String,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// An ordered dialogue plus its optional framing strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DialogueScript {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub atmosphere: Option<String>,
    pub turns: Vec<DialogueTurn>,
}

impl DialogueScript {
    pub fn new(turns: Vec<DialogueTurn>) -> Self {
        Self {
            turns,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_atmosphere(mut self, atmosphere: impl Into<String>) -> Self {
        self.atmosphere = Some(atmosphere.into());
        self
    }

    /// Parse script text.
    pub fn parse(text: &str) -> ModelResult<Self> {
        let mut script = DialogueScript::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim().trim_start_matches('#').trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = split_speaker(line).ok_or_else(|| ModelError::ScriptParse {
                line: index + 1,
                message: format!("expected 'Speaker: text', got '{}'", line),
            })?;

            let lower = key.to_lowercase();
            if TITLE_KEYS.contains(&lower.as_str()) {
                script.title = Some(value.to_string());
            } else if ATMOSPHERE_KEYS.contains(&lower.as_str()) {
                script.atmosphere = Some(value.to_string());
            } else if value.is_empty() {
                return Err(ModelError::ScriptParse {
                    line: index + 1,
                    message: format!("empty line of dialogue for '{}'", key),
                });
            } else {
                script.turns.push(DialogueTurn::new(key, correct_spelling(value)));
            }
        }

        if script.turns.is_empty() {
            return Err(ModelError::EmptyScript);
        }

        Ok(script)
    }

    /// Fail on the first speaker missing from `characters`.
    pub fn validate_speakers(&self, characters: &CharacterTable) -> ModelResult<()> {
        for turn in &self.turns {
            characters.get(&turn.speaker)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Split at the first ASCII or full-width colon.
fn split_speaker(line: &str) -> Option<(&str, &str)> {
    let at = line.find([':', '：'])?;
    let colon_len = line[at..].chars().next()?.len_utf8();
    let key = line[..at].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[at + colon_len..].trim()))
}

/// Apply the fixed spelling corrections to one line.
pub fn correct_spelling(text: &str) -> String {
    SPELLING_CORRECTIONS
        .iter()
        .fold(text.to_string(), |acc, (wrong, right)| acc.replace(wrong, right))
}
