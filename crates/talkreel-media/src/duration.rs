//! Exact clip durations for the caption renderer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use talkreel_models::{Animation, DialogueTurn, FrameSize, Rgb};

use crate::audio::{AudioClip, ClipDuration};
use crate::error::{MediaError, MediaResult};

/// A rendered caption clip for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoClip {
    pub path: PathBuf,
    pub duration: ClipDuration,
    pub frame_size: FrameSize,
}

impl VideoClip {
    pub fn new(path: impl Into<PathBuf>, duration: ClipDuration, frame_size: FrameSize) -> Self {
        Self {
            path: path.into(),
            duration,
            frame_size,
        }
    }
}

/// Everything the caption renderer needs for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Zero-based position of the turn in the dialogue.
    pub index: usize,
    pub speaker: String,
    pub text: String,
    pub color: Rgb,
    /// Required length of the rendered clip.
    pub duration: ClipDuration,
    pub frame_size: FrameSize,
    pub animation: Animation,
    pub title: Option<String>,
}

impl RenderRequest {
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Derives render durations from cleaned audio and checks what comes back.
#[derive(Debug, Clone, Copy)]
pub struct ClipDurationResolver {
    frame_size: FrameSize,
}

impl ClipDurationResolver {
    pub fn new(frame_size: FrameSize) -> Self {
        Self { frame_size }
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    /// Playback length of a cleaned clip. Empty clips are rejected.
    pub fn resolve(&self, clip: &AudioClip) -> MediaResult<ClipDuration> {
        if clip.sample_rate() == 0 {
            return Err(MediaError::invalid_duration("clip has a zero sample rate"));
        }
        let duration = clip.duration();
        if duration.is_zero() {
            return Err(MediaError::invalid_duration("clip has no samples"));
        }
        Ok(duration)
    }

    /// Build the render request for turn `index`.
    pub fn request(
        &self,
        index: usize,
        turn: &DialogueTurn,
        clip: &AudioClip,
        color: Rgb,
        animation: Animation,
        title: Option<&str>,
    ) -> MediaResult<RenderRequest> {
        let duration = self.resolve(clip)?;

        debug!(
            index = index,
            speaker = %turn.speaker,
            duration_secs = duration.as_secs_f64(),
            animation = %animation,
            "Resolved clip duration"
        );

        Ok(RenderRequest {
            index,
            speaker: turn.speaker.clone(),
            text: turn.text.clone(),
            color,
            duration,
            frame_size: self.frame_size,
            animation,
            title: title.map(str::to_string),
        })
    }

    /// Check that a rendered clip honours its request.
    pub fn verify(&self, request: &RenderRequest, clip: &VideoClip) -> MediaResult<()> {
        if clip.duration != request.duration {
            return Err(MediaError::invalid_duration(format!(
                "turn {} rendered as {}, requested {}",
                request.index, clip.duration, request.duration
            )));
        }
        if clip.frame_size != self.frame_size {
            return Err(MediaError::FrameSizeMismatch {
                index: request.index,
                expected: self.frame_size,
                actual: clip.frame_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_for(samples: usize) -> MediaResult<RenderRequest> {
        let resolver = ClipDurationResolver::new(FrameSize::LANDSCAPE);
        resolver.request(
            2,
            &DialogueTurn::new("ずんだもん", "こんにちは"),
            &AudioClip::silence(samples, 24_000),
            Rgb(0, 255, 0),
            Animation::SlideLeft,
            Some("title"),
        )
    }

    #[test]
    fn test_request_carries_exact_duration() {
        let request = request_for(36_000).unwrap();
        assert_eq!(request.duration, ClipDuration::new(36_000, 24_000));
        assert!((request.duration_secs() - 1.5).abs() < f64::EPSILON);
        assert_eq!(request.frame_size, FrameSize::LANDSCAPE);
        assert_eq!(request.title.as_deref(), Some("title"));
        assert_eq!(request.index, 2);
    }

    #[test]
    fn test_zero_duration_aborts() {
        let err = request_for(0).unwrap_err();
        assert!(matches!(err, MediaError::InvalidDuration(_)));
        assert!(err.is_config());

        let resolver = ClipDurationResolver::new(FrameSize::LANDSCAPE);
        assert!(resolver.resolve(&AudioClip::new(vec![1, 2], 0)).is_err());
    }

    #[test]
    fn test_verify() {
        let resolver = ClipDurationResolver::new(FrameSize::LANDSCAPE);
        let request = request_for(24_000).unwrap();

        let good = VideoClip::new("a.mp4", request.duration, FrameSize::LANDSCAPE);
        assert!(resolver.verify(&request, &good).is_ok());

        let short = VideoClip::new("a.mp4", ClipDuration::new(23_999, 24_000), FrameSize::LANDSCAPE);
        assert!(matches!(
            resolver.verify(&request, &short),
            Err(MediaError::InvalidDuration(_))
        ));

        let rotated = VideoClip::new("a.mp4", request.duration, FrameSize::PORTRAIT);
        assert!(matches!(
            resolver.verify(&request, &rotated),
            Err(MediaError::FrameSizeMismatch { index: 2, .. })
        ));
    }
}
