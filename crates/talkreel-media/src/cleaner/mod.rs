//! Speech clip cleanup.
//!
//! Runs on every synthesized turn before its duration is measured:
//!
//! ```text
//! raw clip ─► high-pass ─► soft gate ─► edge fades ─► peak limit ─► clip + quantize
//! ```
//!
//! Every stage keeps the sample count, so the cleaned clip has exactly the
//! duration of the raw one.

mod config;
mod filter;

pub use config::CleanerConfig;
pub use filter::ButterworthHighpass;

use tracing::debug;

use crate::audio::{ms_to_samples, AudioClip};
use crate::error::MediaResult;

/// Applies the cleanup chain to speech clips.
#[derive(Debug, Clone, Default)]
pub struct AudioCleaner {
    config: CleanerConfig,
}

impl AudioCleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Clean one clip. The result has the same sample count and rate.
    pub fn clean(&self, clip: &AudioClip) -> MediaResult<AudioClip> {
        let sample_rate = clip.sample_rate();
        self.config.validate(sample_rate)?;

        let filter = ButterworthHighpass::new(self.config.highpass_cutoff_hz, sample_rate)?;
        let mut samples = filter.filtfilt(&clip.to_f32());

        soft_gate(&mut samples, self.config.gate_threshold, self.config.gate_attenuation);

        let fade_len = ms_to_samples(self.config.edge_fade_ms, sample_rate);
        apply_edge_fades(&mut samples, fade_len);

        let gain = limit_peak(&mut samples, self.config.peak_limit);

        debug!(
            samples = samples.len(),
            sample_rate = sample_rate,
            limiter_gain = gain,
            "Cleaned speech clip"
        );

        Ok(AudioClip::from_f32(&samples, sample_rate))
    }
}

/// Attenuate samples whose magnitude is under `threshold`.
pub fn soft_gate(samples: &mut [f32], threshold: f32, attenuation: f32) {
    for sample in samples.iter_mut() {
        if sample.abs() < threshold {
            *sample *= attenuation;
        }
    }
}

/// Linear fade-in and fade-out of `fade_len` samples each.
///
/// The window is clamped to half the buffer so the two ramps never overlap.
pub fn apply_edge_fades(samples: &mut [f32], fade_len: usize) {
    let len = samples.len();
    let fade_len = fade_len.min(len / 2);
    if fade_len == 0 {
        return;
    }

    for i in 0..fade_len {
        let gain = i as f32 / fade_len as f32;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

/// Scale the buffer down so its peak is at most `limit`. Never scales up.
///
/// Returns the gain applied (1.0 when untouched).
pub fn limit_peak(samples: &mut [f32], limit: f32) -> f32 {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak == 0.0 || peak <= limit {
        return 1.0;
    }

    let gain = limit / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 24_000;

    fn sine(freq: f32, amplitude: f32, len: usize) -> AudioClip {
        let samples: Vec<f32> = (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect();
        AudioClip::from_f32(&samples, RATE)
    }

    /// Deterministic noise so the property checks cover odd shapes.
    fn noise(len: usize, seed: u32, amplitude: f32) -> AudioClip {
        let mut state = seed;
        let samples: Vec<f32> = (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                amplitude * ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0)
            })
            .collect();
        AudioClip::from_f32(&samples, RATE)
    }

    #[test]
    fn test_preserves_length_and_rate() {
        let cleaner = AudioCleaner::default();
        for len in [0, 1, 2, 7, 100, 239, 240, 481, 24_000] {
            let clip = noise(len, len as u32 + 1, 0.9);
            let cleaned = cleaner.clean(&clip).unwrap();
            assert_eq!(cleaned.len(), len);
            assert_eq!(cleaned.sample_rate(), RATE);
            assert_eq!(cleaned.duration(), clip.duration());
        }
    }

    #[test]
    fn test_peak_never_exceeds_limit() {
        let cleaner = AudioCleaner::default();
        let limit = cleaner.config().peak_limit;
        let tolerance = 1.0 / 32768.0;

        let inputs = [
            sine(440.0, 1.0, 24_000),
            noise(12_000, 7, 1.0),
            AudioClip::new(vec![i16::MAX; 4800], RATE),
            AudioClip::new(vec![i16::MIN, i16::MAX].repeat(1000), RATE),
        ];
        for clip in &inputs {
            let cleaned = cleaner.clean(clip).unwrap();
            assert!(cleaned.peak() <= limit + tolerance, "peak {}", cleaned.peak());
        }
    }

    #[test]
    fn test_cleaning_twice_is_nearly_idempotent() {
        let cleaner = AudioCleaner::default();
        let once = cleaner.clean(&sine(440.0, 0.5, 24_000)).unwrap();
        let twice = cleaner.clean(&once).unwrap();

        let a = once.to_f32();
        let b = twice.to_f32();
        let diff: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        let rms = (diff.iter().map(|d| d * d).sum::<f32>() / diff.len() as f32).sqrt();
        assert!(rms < 0.02, "rms difference {}", rms);

        // Away from the re-faded edges the signal is untouched
        let interior = 1200..22_800;
        let max_interior = diff[interior].iter().fold(0.0f32, |m, d| m.max(d.abs()));
        assert!(max_interior < 0.02, "interior difference {}", max_interior);
    }

    #[test]
    fn test_silent_clip_skips_limiting() {
        let cleaner = AudioCleaner::default();
        let cleaned = cleaner.clean(&AudioClip::silence(480, RATE)).unwrap();
        assert!(cleaned.samples().iter().all(|&s| s == 0));

        let mut zeros = vec![0.0f32; 16];
        assert_eq!(limit_peak(&mut zeros, 0.8), 1.0);
    }

    #[test]
    fn test_limit_only_scales_down() {
        let mut quiet = vec![0.1f32, -0.2, 0.3];
        assert_eq!(limit_peak(&mut quiet, 0.8), 1.0);
        assert_eq!(quiet, vec![0.1, -0.2, 0.3]);

        let mut loud = vec![0.5f32, -1.0, 0.25];
        let gain = limit_peak(&mut loud, 0.8);
        assert!((gain - 0.8).abs() < 1e-6);
        assert!((loud[1] + 0.8).abs() < 1e-6);
        assert!((loud[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_soft_gate() {
        let mut samples = vec![0.005f32, -0.005, 0.5, -0.02];
        soft_gate(&mut samples, 0.01, 0.1);
        assert!((samples[0] - 0.0005).abs() < 1e-7);
        assert!((samples[1] + 0.0005).abs() < 1e-7);
        assert_eq!(samples[2], 0.5);
        assert_eq!(samples[3], -0.02);
    }

    #[test]
    fn test_short_clip_fades_do_not_overlap() {
        // 5 ms of signal with a 10 ms fade window
        let len = ms_to_samples(5, RATE);
        let fade_len = ms_to_samples(10, RATE);
        assert!(len < 2 * fade_len);

        for len in [len, len + 1] {
            let mut envelope = vec![1.0f32; len];
            apply_edge_fades(&mut envelope, fade_len);

            let apex = envelope
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();
            assert!(envelope[..=apex].windows(2).all(|w| w[0] <= w[1]));
            assert!(envelope[apex..].windows(2).all(|w| w[0] >= w[1]));
            assert!(envelope.iter().all(|&g| (0.0..=1.0).contains(&g)));
            assert_eq!(envelope[0], 0.0);
            assert_eq!(envelope[len - 1], 0.0);
        }

        // The whole cleaner accepts the same clip
        let cleaned = AudioCleaner::default().clean(&sine(440.0, 0.5, len)).unwrap();
        assert_eq!(cleaned.len(), len);
    }

    #[test]
    fn test_edge_fades_tiny_buffers() {
        let mut one = vec![0.7f32];
        apply_edge_fades(&mut one, 240);
        assert_eq!(one, vec![0.7]);

        let mut empty: Vec<f32> = Vec::new();
        apply_edge_fades(&mut empty, 240);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let cleaner = AudioCleaner::new(CleanerConfig::default().with_highpass_cutoff(20_000.0));
        let err = cleaner.clean(&sine(440.0, 0.5, 100)).unwrap_err();
        assert!(err.is_config());
    }
}
