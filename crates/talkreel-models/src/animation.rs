//! Caption enter/exit animations.
//!
//! Every variant is a pure function of elapsed clip time: an offset of the
//! caption card relative to its resting position, and an opacity. Renderers
//! sample these functions (or translate them into their own expression
//! language) but never add variants of their own.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::frame::FrameSize;

/// Duration of a slide-in, in seconds.
pub const SLIDE_SECS: f64 = 0.5;

/// Duration of each half of a fade-in/fade-out, in seconds.
pub const FADE_SECS: f64 = 0.5;

/// Caption animation applied to one turn's clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    /// Fade in at the start and fade out at the end.
    #[default]
    Fade,
    /// Slide in from the left edge.
    SlideLeft,
    /// Slide in from the right edge.
    SlideRight,
    /// Slide in from the top edge.
    SlideTop,
    /// Slide in from the bottom edge.
    SlideBottom,
}

impl Animation {
    pub const ALL: &'static [Animation] = &[
        Animation::Fade,
        Animation::SlideLeft,
        Animation::SlideRight,
        Animation::SlideTop,
        Animation::SlideBottom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Animation::Fade => "fade",
            Animation::SlideLeft => "slide_left",
            Animation::SlideRight => "slide_right",
            Animation::SlideTop => "slide_top",
            Animation::SlideBottom => "slide_bottom",
        }
    }

    /// Side the caption enters from, as a unit vector. `(0, 0)` for the fade.
    pub fn direction(&self) -> (f64, f64) {
        match self {
            Animation::Fade => (0.0, 0.0),
            Animation::SlideLeft => (-1.0, 0.0),
            Animation::SlideRight => (1.0, 0.0),
            Animation::SlideTop => (0.0, -1.0),
            Animation::SlideBottom => (0.0, 1.0),
        }
    }

    /// Offset `(dx, dy)` in pixels at elapsed time `t` seconds.
    ///
    /// Slides start one full frame extent away and reach `(0, 0)` after
    /// [`SLIDE_SECS`]; the fade never moves.
    pub fn offset(&self, t: f64, frame: FrameSize) -> (f64, f64) {
        let remaining = 1.0 - slide_progress(t);
        let (ux, uy) = self.direction();
        (
            ux * frame.width as f64 * remaining,
            uy * frame.height as f64 * remaining,
        )
    }

    /// Length of each opacity ramp for a clip lasting `clip_secs`.
    ///
    /// `None` for slides and for clips too short to fade at all.
    pub fn fade_secs(&self, clip_secs: f64) -> Option<f64> {
        match self {
            // Short clips split their length between the two fades.
            Animation::Fade => Some(FADE_SECS.min(clip_secs / 2.0)).filter(|f| *f > 0.0),
            _ => None,
        }
    }

    /// Opacity in `[0, 1]` at elapsed time `t` of a clip lasting `clip_secs`.
    pub fn opacity(&self, t: f64, clip_secs: f64) -> f64 {
        match self.fade_secs(clip_secs) {
            Some(fade) => {
                let fade_in = t / fade;
                let fade_out = (clip_secs - t) / fade;
                fade_in.min(fade_out).clamp(0.0, 1.0)
            }
            None => 1.0,
        }
    }
}

fn slide_progress(t: f64) -> f64 {
    (t / SLIDE_SECS).clamp(0.0, 1.0)
}

impl fmt::Display for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Animation {
    type Err = AnimationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fade" => Ok(Animation::Fade),
            "slide_left" => Ok(Animation::SlideLeft),
            "slide_right" => Ok(Animation::SlideRight),
            "slide_top" => Ok(Animation::SlideTop),
            "slide_bottom" => Ok(Animation::SlideBottom),
            _ => Err(AnimationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown animation: {0}")]
pub struct AnimationParseError(String);
