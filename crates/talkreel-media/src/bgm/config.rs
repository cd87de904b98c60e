//! Configuration for background music mixing.

use serde::{Deserialize, Serialize};

/// What happens to mixed samples that approach full scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Headroom {
    /// Hard clip at full scale.
    Clip,
    /// Pass samples under `knee` unchanged and bend louder ones with a
    /// tanh curve that approaches full scale without exceeding it.
    SoftLimit { knee: f32 },
}

impl Default for Headroom {
    fn default() -> Self {
        Headroom::SoftLimit { knee: 0.9 }
    }
}

impl Headroom {
    /// Map one mixed sample into the representable range.
    pub fn apply(&self, sample: f32) -> f32 {
        match *self {
            Headroom::Clip => sample.clamp(-1.0, 1.0),
            Headroom::SoftLimit { knee } => {
                let knee = knee.clamp(0.0, 0.999);
                let magnitude = sample.abs();
                if magnitude <= knee {
                    return sample;
                }
                let span = 1.0 - knee;
                let bent = knee + span * ((magnitude - knee) / span).tanh();
                bent.copysign(sample)
            }
        }
    }
}

/// Parameters for [`BgmMixer`](super::BgmMixer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Static gain applied to the background track.
    ///
    /// - Default (0.1): music sits 20 dB under the dialogue
    pub bgm_volume: f32,

    /// Fade-in at the start of the adapted track (milliseconds).
    pub fade_in_ms: u32,

    /// Fade-out at the end of the adapted track (milliseconds).
    pub fade_out_ms: u32,

    /// Crossfade blended across each loop seam (milliseconds).
    ///
    /// 0 loops by plain end-to-start concatenation.
    pub loop_crossfade_ms: u32,

    /// Post-mix headroom policy.
    pub headroom: Headroom,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            bgm_volume: 0.1,
            fade_in_ms: 1000,
            fade_out_ms: 3000,
            loop_crossfade_ms: 50,
            headroom: Headroom::default(),
        }
    }
}

impl MixConfig {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.bgm_volume = volume.max(0.0);
        self
    }

    pub fn with_fades_ms(mut self, fade_in: u32, fade_out: u32) -> Self {
        self.fade_in_ms = fade_in;
        self.fade_out_ms = fade_out;
        self
    }

    pub fn with_loop_crossfade_ms(mut self, ms: u32) -> Self {
        self.loop_crossfade_ms = ms;
        self
    }

    pub fn with_headroom(mut self, headroom: Headroom) -> Self {
        self.headroom = headroom;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MixConfig::default();
        assert!((config.bgm_volume - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.fade_in_ms, 1000);
        assert_eq!(config.fade_out_ms, 3000);
        assert_eq!(config.headroom, Headroom::SoftLimit { knee: 0.9 });
    }

    #[test]
    fn test_clip_headroom() {
        assert_eq!(Headroom::Clip.apply(1.4), 1.0);
        assert_eq!(Headroom::Clip.apply(-3.0), -1.0);
        assert_eq!(Headroom::Clip.apply(0.3), 0.3);
    }

    #[test]
    fn test_soft_limit_headroom() {
        let limit = Headroom::default();
        assert_eq!(limit.apply(0.5), 0.5);
        assert_eq!(limit.apply(-0.9), -0.9);

        let mut previous = 0.9;
        for x in [0.95f32, 1.0, 1.2] {
            let y = limit.apply(x);
            assert!(y > previous && y < 1.0, "{} -> {}", x, y);
            assert_eq!(limit.apply(-x), -y);
            previous = y;
        }
        assert!(limit.apply(10.0) <= 1.0);
        assert!(limit.apply(-10.0) >= -1.0);
    }

    #[test]
    fn test_headroom_serde() {
        let json = serde_json::to_string(&Headroom::SoftLimit { knee: 0.8 }).unwrap();
        assert_eq!(json, r#"{"mode":"soft_limit","knee":0.8}"#);
        let clip: Headroom = serde_json::from_str(r#"{"mode":"clip"}"#).unwrap();
        assert_eq!(clip, Headroom::Clip);
    }
}
