//! Timeline assembly.
//!
//! Turns are laid end to end between two black, silent padding entries:
//!
//! ```text
//! | pad | turn 0 | turn 1 | ... | turn N-1 | pad |
//! ```
//!
//! Each turn's audio gets a short fade-in and a longer fade-out so splices
//! do not click. Visually only the timeline boundaries change: the first
//! turn fades in from black and the last fades out to black. The audio is
//! rendered in memory; the video side is an ffmpeg `filter_complex` graph
//! consumed by the muxer.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use talkreel_models::{FrameSize, DEFAULT_FPS};

use crate::audio::{fade_in, fade_out, fit_fades, ms_to_samples, AudioClip, ClipDuration};
use crate::duration::VideoClip;
use crate::error::{MediaError, MediaResult};

/// Label of the video stream produced by [`Timeline::filter_graph`].
pub const VIDEO_OUTPUT_LABEL: &str = "outv";

/// Timeline assembly parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Length of the black, silent entry before the first and after the last turn.
    pub padding_ms: u32,
    /// Fade-in applied to every turn's audio.
    pub turn_fade_in_ms: u32,
    /// Fade-out applied to every turn's audio.
    pub turn_fade_out_ms: u32,
    /// Fade from/to black on the first/last turn.
    pub visual_fade_ms: u32,
    /// Output frame rate.
    pub fps: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            padding_ms: 1000,
            turn_fade_in_ms: 100,
            turn_fade_out_ms: 300,
            visual_fade_ms: 500,
            fps: DEFAULT_FPS,
        }
    }
}

impl TimelineConfig {
    pub fn with_padding_ms(mut self, ms: u32) -> Self {
        self.padding_ms = ms;
        self
    }

    pub fn with_turn_fades_ms(mut self, fade_in: u32, fade_out: u32) -> Self {
        self.turn_fade_in_ms = fade_in;
        self.turn_fade_out_ms = fade_out;
        self
    }

    pub fn with_visual_fade_ms(mut self, ms: u32) -> Self {
        self.visual_fade_ms = ms;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

/// One slot of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    /// Black frames and silence.
    Padding { duration: ClipDuration },
    /// A dialogue turn; `audio` already carries its splice fades.
    Turn {
        index: usize,
        video: VideoClip,
        audio: AudioClip,
    },
}

impl TimelineEntry {
    pub fn duration(&self) -> ClipDuration {
        match self {
            TimelineEntry::Padding { duration } => *duration,
            TimelineEntry::Turn { audio, .. } => audio.duration(),
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, TimelineEntry::Padding { .. })
    }
}

/// An assembled, gap-free sequence of entries.
#[derive(Debug, Clone)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    frame_size: FrameSize,
    sample_rate: u32,
    fps: u32,
    visual_fade_ms: u32,
}

impl Timeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn turn_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_padding()).count()
    }

    /// Total length: both paddings plus every turn.
    pub fn duration(&self) -> ClipDuration {
        let samples = self.entries.iter().map(|e| e.duration().samples()).sum();
        ClipDuration::new(samples, self.sample_rate)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    /// Rendered turn clips in timeline order.
    pub fn video_inputs(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Turn { video, .. } => Some(video.path.as_path()),
                TimelineEntry::Padding { .. } => None,
            })
            .collect()
    }

    /// The dialogue track: paddings as silence, turns with their fades.
    pub fn render_audio(&self) -> AudioClip {
        let mut samples = Vec::with_capacity(self.duration().samples() as usize);
        for entry in &self.entries {
            match entry {
                TimelineEntry::Padding { duration } => {
                    samples.resize(samples.len() + duration.samples() as usize, 0);
                }
                TimelineEntry::Turn { audio, .. } => samples.extend_from_slice(audio.samples()),
            }
        }
        AudioClip::new(samples, self.sample_rate)
    }

    /// Video frames per entry.
    ///
    /// Each entry ends on the frame nearest to its exact end in samples, so
    /// rounding never accumulates: the counts sum to the frame nearest to
    /// the total duration and every boundary is within half a frame of the
    /// audio.
    pub fn frame_counts(&self) -> Vec<u64> {
        let fps = self.fps as u64;
        let rate = self.sample_rate as u64;
        let to_frame = |samples: u64| (2 * samples * fps + rate) / (2 * rate);

        let mut end_samples = 0u64;
        let mut start_frame = 0u64;
        self.entries
            .iter()
            .map(|entry| {
                end_samples += entry.duration().samples();
                let end_frame = to_frame(end_samples);
                let count = end_frame - start_frame;
                start_frame = end_frame;
                count
            })
            .collect()
    }

    /// ffmpeg `filter_complex` producing `[outv]`.
    ///
    /// Turn clips are expected as inputs `first_input`, `first_input + 1`, ...
    /// in timeline order. Each one is normalised to the timeline frame rate
    /// and cut or padded to its frame count from [`Timeline::frame_counts`]
    /// before concatenation.
    pub fn filter_graph(&self, first_input: usize) -> String {
        let size = self.frame_size.to_ffmpeg();
        let fade_secs = self.visual_fade_ms as f64 / 1000.0;
        let turns = self.turn_count();
        let frame_counts = self.frame_counts();

        let mut chains = Vec::with_capacity(self.entries.len() + 1);
        let mut labels = String::new();
        let mut turn_pos = 0usize;

        for (slot, (entry, &frames)) in self.entries.iter().zip(&frame_counts).enumerate() {
            let label = format!("e{}", slot);
            let secs = frames as f64 / self.fps as f64;

            match entry {
                TimelineEntry::Padding { .. } => {
                    chains.push(format!(
                        "color=c=black:s={}:r={}:d={:.6},trim=end_frame={},setsar=1[{}]",
                        size, self.fps, secs, frames, label
                    ));
                }
                TimelineEntry::Turn { .. } => {
                    let is_first = turn_pos == 0;
                    let is_last = turn_pos + 1 == turns;
                    // A single turn takes both fades, so each gets half of it
                    let max_fade = if is_first && is_last { secs / 2.0 } else { secs };
                    let fade = fade_secs.min(max_fade);

                    let mut chain = format!(
                        "[{}:v]fps={},setsar=1,tpad=stop_mode=clone:stop_duration={:.6},trim=end_frame={},setpts=PTS-STARTPTS",
                        first_input + turn_pos,
                        self.fps,
                        secs,
                        frames
                    );
                    if is_first && fade > 0.0 {
                        chain.push_str(&format!(",fade=t=in:st=0:d={:.6}", fade));
                    }
                    if is_last && fade > 0.0 {
                        chain.push_str(&format!(",fade=t=out:st={:.6}:d={:.6}", secs - fade, fade));
                    }
                    chain.push_str(&format!("[{}]", label));
                    chains.push(chain);
                    turn_pos += 1;
                }
            }
            labels.push_str(&format!("[{}]", label));
        }

        chains.push(format!(
            "{}concat=n={}:v=1:a=0[{}]",
            labels,
            self.entries.len(),
            VIDEO_OUTPUT_LABEL
        ));
        chains.join(";")
    }
}

/// Builds timelines from per-turn (video, audio) pairs.
#[derive(Debug, Clone)]
pub struct TimelineAssembler {
    config: TimelineConfig,
    frame_size: FrameSize,
}

impl TimelineAssembler {
    pub fn new(config: TimelineConfig, frame_size: FrameSize) -> Self {
        Self { config, frame_size }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Assemble turns in the given order.
    ///
    /// Fails on an empty list, a clip whose frame size differs from the
    /// timeline's, mixed sample rates, or a video/audio duration mismatch.
    pub fn assemble(&self, turns: Vec<(VideoClip, AudioClip)>) -> MediaResult<Timeline> {
        if self.config.fps == 0 {
            return Err(MediaError::config("frame rate must be positive"));
        }
        let sample_rate = match turns.first() {
            Some((_, audio)) => audio.sample_rate(),
            None => return Err(MediaError::config("cannot assemble a timeline with no turns")),
        };
        if sample_rate == 0 {
            return Err(MediaError::config("sample rate must be positive"));
        }

        let padding = ClipDuration::from_millis(self.config.padding_ms, sample_rate);
        let mut entries = Vec::with_capacity(turns.len() + 2);
        entries.push(TimelineEntry::Padding { duration: padding });

        for (index, (video, audio)) in turns.into_iter().enumerate() {
            if video.frame_size != self.frame_size {
                return Err(MediaError::FrameSizeMismatch {
                    index,
                    expected: self.frame_size,
                    actual: video.frame_size,
                });
            }
            if audio.sample_rate() != sample_rate {
                return Err(MediaError::SampleRateMismatch {
                    expected: sample_rate,
                    actual: audio.sample_rate(),
                });
            }
            if video.duration != audio.duration() {
                return Err(MediaError::invalid_duration(format!(
                    "turn {} video is {}, audio is {}",
                    index,
                    video.duration,
                    audio.duration()
                )));
            }

            let audio = self.fade_turn(&audio);
            debug!(index = index, duration = %audio.duration(), "Placed turn");
            entries.push(TimelineEntry::Turn {
                index,
                video,
                audio,
            });
        }

        entries.push(TimelineEntry::Padding { duration: padding });

        let timeline = Timeline {
            entries,
            frame_size: self.frame_size,
            sample_rate,
            fps: self.config.fps,
            visual_fade_ms: self.config.visual_fade_ms,
        };

        info!(
            turns = timeline.turn_count(),
            duration_secs = timeline.duration_secs(),
            frame_size = %self.frame_size,
            "Assembled timeline"
        );

        Ok(timeline)
    }

    /// Splice fades for one turn, scaled down together when they do not fit.
    fn fade_turn(&self, audio: &AudioClip) -> AudioClip {
        let rate = audio.sample_rate();
        let (fade_in_len, fade_out_len) = fit_fades(
            audio.len(),
            ms_to_samples(self.config.turn_fade_in_ms, rate),
            ms_to_samples(self.config.turn_fade_out_ms, rate),
        );

        let mut samples = audio.to_f32();
        fade_in(&mut samples, fade_in_len);
        fade_out(&mut samples, fade_out_len);
        AudioClip::from_f32(&samples, rate)
    }
}
