//! Background music: selection, length adaptation and mixing.
//!
//! ```text
//! source ─► loop / truncate to timeline length ─► volume ─► fades ─┐
//!                                                                  ├─► sum ─► headroom
//! dialogue track ──────────────────────────────────────────────────┘
//! ```
//!
//! Ducking is static: the track is attenuated by a fixed gain rather than
//! side-chained against the dialogue.

mod config;
mod decode;
mod select;

pub use config::{Headroom, MixConfig};
pub use decode::decode_audio_file;
pub use select::{best_match, keywords, BgmSelector, AUDIO_EXTENSIONS};

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::audio::{fade_in, fade_out, fit_fades, ms_to_samples, AudioClip, ClipDuration};
use crate::error::{MediaError, MediaResult};

/// Where the background track comes from.
#[derive(Debug, Clone)]
pub enum BgmSource {
    /// A fixed file.
    File(PathBuf),
    /// Picked from a library by the script atmosphere.
    Library(BgmSelector),
}

impl BgmSource {
    pub async fn resolve(&self, atmosphere: Option<&str>) -> MediaResult<PathBuf> {
        match self {
            BgmSource::File(path) if path.is_file() => Ok(path.clone()),
            BgmSource::File(path) => Err(MediaError::config(format!(
                "BGM file {} does not exist",
                path.display()
            ))),
            BgmSource::Library(selector) => selector.select(atmosphere).await,
        }
    }
}

/// A background track adapted to a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct BgmTrack {
    samples: Vec<f32>,
    sample_rate: u32,
    volume: f32,
}

impl BgmTrack {
    /// Normalized samples with volume and fades already applied.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gain the source was scaled by.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn duration(&self) -> ClipDuration {
        ClipDuration::new(self.samples.len() as u64, self.sample_rate)
    }
}

/// Repeat or cut `source` to exactly `target_len` samples.
///
/// Sources at least as long as the target are truncated. Shorter ones are
/// looped; with `crossfade > 0` the tail of the source is blended into the
/// head of every repeat and the loop period shrinks to `len - crossfade`,
/// so each seam continues the waveform that precedes it. Sources too short
/// to hold two crossfade windows loop without blending.
pub fn loop_to_length(source: &[f32], target_len: usize, crossfade: usize) -> Vec<f32> {
    let len = source.len();
    if len == 0 {
        return vec![0.0; target_len];
    }
    if len >= target_len {
        return source[..target_len].to_vec();
    }

    let crossfade = if len > 2 * crossfade { crossfade } else { 0 };
    let period = len - crossfade;

    // One repeat: the head blended with the tail it follows
    let body: Vec<f32> = (0..period)
        .map(|i| {
            if i < crossfade {
                let t = i as f32 / crossfade as f32;
                source[i] * t + source[period + i] * (1.0 - t)
            } else {
                source[i]
            }
        })
        .collect();

    let mut out = Vec::with_capacity(target_len);
    out.extend_from_slice(&source[..period]);
    while out.len() < target_len {
        let take = (target_len - out.len()).min(period);
        out.extend_from_slice(&body[..take]);
    }
    out
}

/// Adapts background tracks and mixes them under dialogue.
#[derive(Debug, Clone, Default)]
pub struct BgmMixer {
    config: MixConfig,
}

impl BgmMixer {
    pub fn new(config: MixConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Fit a decoded source to `target` and apply volume and fades.
    pub fn prepare(&self, source: &[f32], target: ClipDuration) -> MediaResult<BgmTrack> {
        if source.is_empty() {
            return Err(MediaError::InvalidMedia("BGM source has no samples".to_string()));
        }

        let rate = target.sample_rate();
        let target_len = target.samples() as usize;
        let crossfade = ms_to_samples(self.config.loop_crossfade_ms, rate);

        let mut samples = loop_to_length(source, target_len, crossfade);
        for sample in samples.iter_mut() {
            *sample *= self.config.bgm_volume;
        }

        let (fade_in_len, fade_out_len) = fit_fades(
            samples.len(),
            ms_to_samples(self.config.fade_in_ms, rate),
            ms_to_samples(self.config.fade_out_ms, rate),
        );
        fade_in(&mut samples, fade_in_len);
        fade_out(&mut samples, fade_out_len);

        debug!(
            source_samples = source.len(),
            target_samples = target_len,
            looped = source.len() < target_len,
            "Adapted BGM length"
        );

        Ok(BgmTrack {
            samples,
            sample_rate: rate,
            volume: self.config.bgm_volume,
        })
    }

    /// Sum the dialogue and background tracks, then apply the headroom policy.
    pub fn mix(&self, dialogue: &AudioClip, bgm: &BgmTrack) -> MediaResult<AudioClip> {
        if dialogue.sample_rate() != bgm.sample_rate() {
            return Err(MediaError::SampleRateMismatch {
                expected: dialogue.sample_rate(),
                actual: bgm.sample_rate(),
            });
        }
        if dialogue.duration() != bgm.duration() {
            return Err(MediaError::invalid_duration(format!(
                "BGM is {}, dialogue is {}",
                bgm.duration(),
                dialogue.duration()
            )));
        }

        let headroom = self.config.headroom;
        let mixed: Vec<f32> = dialogue
            .to_f32()
            .into_iter()
            .zip(bgm.samples())
            .map(|(voice, music)| headroom.apply(voice + music))
            .collect();

        Ok(AudioClip::from_f32(&mixed, dialogue.sample_rate()))
    }

    /// Decode `path`, adapt it to the dialogue track and mix.
    pub async fn mix_file(&self, path: &Path, dialogue: &AudioClip) -> MediaResult<AudioClip> {
        let source = decode_audio_file(path, dialogue.sample_rate()).await?;
        let track = self.prepare(&source, dialogue.duration())?;

        info!(
            bgm = %path.display(),
            duration_secs = dialogue.duration_secs(),
            volume = track.volume(),
            "Mixing BGM under dialogue"
        );

        self.mix(dialogue, &track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn sine(freq: f32, secs: f32) -> Vec<f32> {
        let len = (secs * RATE as f32) as usize;
        (0..len)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn max_step(samples: &[f32]) -> f32 {
        samples.windows(2).fold(0.0, |m, w| m.max((w[1] - w[0]).abs()))
    }

    #[test]
    fn test_loop_extends_to_exact_length() {
        let source = sine(3.3, 4.0);
        for crossfade in [0, 50] {
            let out = loop_to_length(&source, 10_000, crossfade);
            assert_eq!(out.len(), 10_000);
        }
    }

    #[test]
    fn test_loop_seams_are_continuous() {
        // 3.3 Hz does not divide 4 s, so plain concatenation jumps at the seam
        let source = sine(3.3, 4.0);
        let source_step = max_step(&source);

        let plain = loop_to_length(&source, 10_000, 0);
        assert!(max_step(&plain) > 10.0 * source_step);
        assert!((plain[4000] - source[0]).abs() < f32::EPSILON);
        assert!((plain[8000] - source[0]).abs() < f32::EPSILON);

        let crossfade = 50;
        let blended = loop_to_length(&source, 10_000, crossfade);
        let slack = 2.0 * 0.8 / crossfade as f32;
        assert!(max_step(&blended) <= source_step + slack, "step {}", max_step(&blended));

        // Every seam continues the sample that precedes it in the source
        let period = source.len() - crossfade;
        for seam in [period, 2 * period] {
            assert_eq!(blended[seam], source[period]);
            assert!((blended[seam] - blended[seam - 1]).abs() <= source_step + slack);
        }
    }

    #[test]
    fn test_long_source_is_truncated() {
        let source = sine(2.0, 15.0);
        let out = loop_to_length(&source, 10_000, 50);
        assert_eq!(out, source[..10_000].to_vec());
    }

    #[test]
    fn test_short_source_falls_back_to_plain_loop() {
        let source = vec![0.1, 0.2, 0.3];
        let out = loop_to_length(&source, 8, 50);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1, 0.2]);
    }

    #[test]
    fn test_prepare_truncate_scenario() {
        let source = vec![0.5f32; 15 * RATE as usize];
        let mixer = BgmMixer::default();
        let track = mixer
            .prepare(&source, ClipDuration::new(10 * RATE as u64, RATE))
            .unwrap();

        assert_eq!(track.duration(), ClipDuration::new(10_000, RATE));
        assert_eq!(track.samples()[0], 0.0);
        assert_eq!(track.samples()[9_999], 0.0);
        // Between the fades the source is only attenuated
        assert!((track.samples()[5_000] - 0.05).abs() < 1e-6);
        assert!(track.samples()[500] < 0.05);
        assert!(track.samples()[8_500] < 0.05);
    }

    #[test]
    fn test_prepare_loop_scenario() {
        let source = sine(3.3, 4.0);
        let track = BgmMixer::default()
            .prepare(&source, ClipDuration::new(10_000, RATE))
            .unwrap();
        assert_eq!(track.samples().len(), 10_000);
    }

    #[test]
    fn test_prepare_rejects_empty_source() {
        assert!(BgmMixer::default()
            .prepare(&[], ClipDuration::new(100, RATE))
            .is_err());
    }

    #[test]
    fn test_mix_is_sample_wise_sum() {
        let mixer = BgmMixer::new(MixConfig::default().with_fades_ms(0, 0));
        let dialogue = AudioClip::from_f32(&[0.25, -0.25, 0.0, 0.5], RATE);
        let track = mixer.prepare(&[1.0; 4], dialogue.duration()).unwrap();

        let mixed = mixer.mix(&dialogue, &track).unwrap();
        let expected = AudioClip::from_f32(&[0.35, -0.15, 0.1, 0.6], RATE);
        for (a, b) in mixed.samples().iter().zip(expected.samples()) {
            assert!((a - b).abs() <= 1);
        }
    }

    #[test]
    fn test_mix_headroom_policies() {
        let dialogue = AudioClip::from_f32(&[0.98; 4], RATE);
        let loud = MixConfig::default().with_fades_ms(0, 0).with_volume(0.25);

        let clip = BgmMixer::new(loud.clone().with_headroom(Headroom::Clip));
        let track = clip.prepare(&[1.0; 4], dialogue.duration()).unwrap();
        assert!(clip.mix(&dialogue, &track).unwrap().samples().iter().all(|&s| s == i16::MAX));

        let soft = BgmMixer::new(loud);
        let mixed = soft.mix(&dialogue, &track).unwrap();
        assert!(mixed.samples().iter().all(|&s| s < i16::MAX && s > 29_490));
    }

    #[test]
    fn test_mix_rejects_length_mismatch() {
        let mixer = BgmMixer::default();
        let dialogue = AudioClip::silence(100, RATE);
        let track = mixer.prepare(&[0.1; 10], ClipDuration::new(99, RATE)).unwrap();
        assert!(matches!(
            mixer.mix(&dialogue, &track),
            Err(MediaError::InvalidDuration(_))
        ));
    }

    #[tokio::test]
    async fn test_bgm_source_resolution() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("theme.wav");
        std::fs::write(&file, b"x").unwrap();

        let explicit = BgmSource::File(file.clone());
        assert_eq!(explicit.resolve(Some("ignored")).await.unwrap(), file);

        let missing = BgmSource::File(dir.path().join("gone.wav"));
        assert!(missing.resolve(None).await.unwrap_err().is_config());

        let library = BgmSource::Library(BgmSelector::new(dir.path(), "theme.wav"));
        assert_eq!(library.resolve(None).await.unwrap(), file);
    }

    #[tokio::test]
    async fn test_mix_file_with_wav_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("loop.wav");
        AudioClip::from_f32(&sine(3.3, 4.0), RATE).write_wav(&path).await.unwrap();

        let dialogue = AudioClip::silence(10_000, RATE);
        let mixed = BgmMixer::default().mix_file(&path, &dialogue).await.unwrap();
        assert_eq!(mixed.duration(), dialogue.duration());
        assert!(mixed.peak() <= 0.1);
    }
}
