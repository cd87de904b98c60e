//! Dialogue-to-movie pipeline runner.
//!
//! This crate provides:
//! - The sequential movie pipeline over the media components
//! - Run configuration from the environment
//! - The VOICEVOX speech synthesis client
//! - Retry policy, run logging and the per-run working directory

pub mod animation;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod script;
pub mod synthesis;
pub mod workdir;

pub use animation::AnimationPolicy;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::RunLogger;
pub use pipeline::{MoviePipeline, RunSummary};
pub use retry::{retry_async, RetryOutcome, RetryPolicy};
pub use script::load_script;
pub use synthesis::{SpeechSynthesizer, VoicevoxClient};
pub use workdir::WorkDir;
