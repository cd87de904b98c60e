//! Configuration for speech clip cleanup.
//!
//! The defaults suit VOICEVOX output at 24 kHz: a faint low-frequency hum,
//! a noise floor under 1% of full scale, and occasional hot peaks.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Parameters for [`AudioCleaner`](super::AudioCleaner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// High-pass cutoff in Hz.
    ///
    /// Must be positive and below the Nyquist frequency of every clip.
    pub highpass_cutoff_hz: f32,

    /// Amplitude (fraction of full scale) below which the soft gate engages.
    pub gate_threshold: f32,

    /// Gain applied to samples under the gate threshold.
    ///
    /// - 0.0: hard gate (audible chopping on breaths)
    /// - Default (0.1): near-silence drops by 20 dB
    pub gate_attenuation: f32,

    /// Length of the linear fade at each clip edge (milliseconds).
    pub edge_fade_ms: u32,

    /// Peak ceiling (fraction of full scale). Louder clips are scaled down.
    pub peak_limit: f32,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            highpass_cutoff_hz: 100.0,
            gate_threshold: 0.01,
            gate_attenuation: 0.1,
            edge_fade_ms: 10,
            peak_limit: 0.8,
        }
    }
}

impl CleanerConfig {
    pub fn with_highpass_cutoff(mut self, hz: f32) -> Self {
        self.highpass_cutoff_hz = hz;
        self
    }

    pub fn with_gate(mut self, threshold: f32, attenuation: f32) -> Self {
        self.gate_threshold = threshold.max(0.0);
        self.gate_attenuation = attenuation.clamp(0.0, 1.0);
        self
    }

    pub fn with_edge_fade_ms(mut self, ms: u32) -> Self {
        self.edge_fade_ms = ms;
        self
    }

    pub fn with_peak_limit(mut self, limit: f32) -> Self {
        self.peak_limit = limit;
        self
    }

    /// Check the parameters against a clip's sample rate.
    pub fn validate(&self, sample_rate: u32) -> MediaResult<()> {
        if sample_rate == 0 {
            return Err(MediaError::config("sample rate must be positive"));
        }
        let nyquist = sample_rate as f32 / 2.0;
        if !(self.highpass_cutoff_hz > 0.0 && self.highpass_cutoff_hz < nyquist) {
            return Err(MediaError::config(format!(
                "high-pass cutoff {} Hz must lie in (0, {}) for {} Hz audio",
                self.highpass_cutoff_hz, nyquist, sample_rate
            )));
        }
        if !(self.peak_limit > 0.0 && self.peak_limit <= 1.0) {
            return Err(MediaError::config(format!(
                "peak limit {} must lie in (0, 1]",
                self.peak_limit
            )));
        }
        Ok(())
    }
}
