//! Pronunciation overrides registered with the speech engine before a run.
//!
//! The file format is one word per line:
//!
//! ```text
//! surface,pronunciation,accent_type
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// One user dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserDictWord {
    /// Written form as it appears in scripts
    pub surface: String,
    /// Reading in katakana
    pub pronunciation: String,
    /// Position of the accent nucleus (0 = flat)
    pub accent_type: u32,
}

/// Ordered list of user dictionary entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserDictionary {
    pub words: Vec<UserDictWord>,
}

impl UserDictionary {
    pub fn parse(source: &str) -> ModelResult<Self> {
        let mut words = Vec::new();

        for (i, raw) in source.lines().enumerate() {
            let line = raw.trim().trim_start_matches('\u{feff}');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parse_error = |message: String| ModelError::UserDictParse { line: i + 1, message };

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [surface, pronunciation, accent_type] = fields.as_slice() else {
                return Err(parse_error(format!(
                    "expected surface,pronunciation,accent_type, got {} fields",
                    fields.len()
                )));
            };
            if surface.is_empty() || pronunciation.is_empty() {
                return Err(parse_error("surface and pronunciation must not be empty".to_string()));
            }
            let accent_type = accent_type
                .parse()
                .map_err(|_| parse_error(format!("invalid accent type '{}'", accent_type)))?;

            words.push(UserDictWord {
                surface: surface.to_string(),
                pronunciation: pronunciation.to_string(),
                accent_type,
            });
        }

        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
