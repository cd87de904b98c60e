//! Shared data models for the talkreel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Dialogue turns and scripts
//! - The character/voice table
//! - Frame orientation and size
//! - Caption animations
//! - The speech engine's user dictionary
//! - Encoding configuration

pub mod animation;
pub mod character;
pub mod dialogue;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod user_dict;

// Re-export common types
pub use animation::Animation;
pub use character::{CharacterProfile, CharacterTable, Rgb, VoiceParams};
pub use dialogue::{DialogueScript, DialogueTurn};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use frame::{FrameSize, Orientation, DEFAULT_FPS};
pub use user_dict::{UserDictWord, UserDictionary};
