//! Frame orientation and size definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 24;

/// Timeline-wide frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// 16:9, 1280x720
    #[default]
    Landscape,
    /// 9:16, 720x1280
    Portrait,
}

impl Orientation {
    pub const ALL: &'static [Orientation] = &[Orientation::Landscape, Orientation::Portrait];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }

    /// Frame size used for every clip of a timeline with this orientation.
    pub fn frame_size(&self) -> FrameSize {
        match self {
            Orientation::Landscape => FrameSize::LANDSCAPE,
            Orientation::Portrait => FrameSize::PORTRAIT,
        }
    }

    /// Caption wrap width in display columns (full-width glyphs count as two).
    pub fn caption_columns(&self) -> usize {
        match self {
            Orientation::Landscape => 60,
            Orientation::Portrait => 30,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = OrientationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "landscape" | "horizontal" => Ok(Orientation::Landscape),
            "portrait" | "vertical" => Ok(Orientation::Portrait),
            _ => Err(OrientationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown orientation: {0}")]
pub struct OrientationParseError(String);

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const LANDSCAPE: FrameSize = FrameSize {
        width: 1280,
        height: 720,
    };

    pub const PORTRAIT: FrameSize = FrameSize {
        width: 720,
        height: 1280,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the frame is taller than it is wide.
    pub fn is_vertical(&self) -> bool {
        self.height > self.width
    }

    /// Size in ffmpeg's `WxH` notation.
    pub fn to_ffmpeg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_parse() {
        assert_eq!("landscape".parse::<Orientation>().unwrap(), Orientation::Landscape);
        assert_eq!("PORTRAIT".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert_eq!("vertical".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert!("square".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_frame_sizes() {
        assert_eq!(Orientation::Landscape.frame_size().to_ffmpeg(), "1280x720");
        assert_eq!(Orientation::Portrait.frame_size().to_ffmpeg(), "720x1280");
        assert!(Orientation::Portrait.frame_size().is_vertical());
        assert!(!FrameSize::default().is_vertical());
    }
}
