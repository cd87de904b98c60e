//! Error types for model parsing and lookup.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("Character table is empty")]
    EmptyCharacterTable,

    #[error("Script parse error at line {line}: {message}")]
    ScriptParse { line: usize, message: String },

    #[error("User dictionary parse error at line {line}: {message}")]
    UserDictParse { line: usize, message: String },

    #[error("Script contains no dialogue turns")]
    EmptyScript,

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
