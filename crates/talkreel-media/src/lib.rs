#![deny(unreachable_patterns)]
//! Audio and video processing for dialogue movies.
//!
//! This crate provides:
//! - Voice clip cleanup (zero-phase high-pass, soft gate, edge fades, peak limit)
//! - Exact, sample-derived clip durations and caption render requests
//! - Timeline assembly with silent padding between turns
//! - Background music selection, looping and mixing
//! - Caption clip rendering and final muxing through the FFmpeg CLI

pub mod audio;
pub mod bgm;
pub mod cleaner;
pub mod command;
pub mod duration;
pub mod error;
pub mod fs_utils;
pub mod mux;
pub mod probe;
pub mod progress;
pub mod render;
pub mod timeline;

pub use audio::{AudioClip, ClipDuration};
pub use bgm::{BgmMixer, BgmSelector, BgmSource, BgmTrack, Headroom, MixConfig};
pub use cleaner::{AudioCleaner, CleanerConfig};
pub use command::{create_ffmpeg_command, FfmpegCommand, FfmpegRunner};
pub use duration::{ClipDurationResolver, RenderRequest, VideoClip};
pub use error::{MediaError, MediaResult};
pub use mux::{FfmpegMuxEncoder, MuxEncoder, Muxer};
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressReporter};
pub use render::{CaptionRenderer, DrawtextRenderer};
pub use timeline::{Timeline, TimelineAssembler, TimelineConfig, TimelineEntry};
