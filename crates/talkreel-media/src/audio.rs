//! Mono PCM clips, exact durations and WAV I/O.
//!
//! Samples are stored as 16-bit signed PCM. DSP stages work on normalized
//! `f32` copies (`[-1.0, 1.0)`) and hand back a new clip through
//! [`AudioClip::from_f32`], which hard clips and re-quantizes.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Full-scale magnitude of 16-bit PCM.
const I16_SCALE: f32 = 32768.0;

/// Convert one PCM sample to normalized float.
#[inline]
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Hard clip a normalized float and quantize it to PCM.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Number of whole samples in `ms` milliseconds at `sample_rate`.
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Playback length expressed as a sample count, so equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipDuration {
    samples: u64,
    sample_rate: u32,
}

impl ClipDuration {
    pub fn new(samples: u64, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn from_millis(ms: u32, sample_rate: u32) -> Self {
        Self::new(ms_to_samples(ms, sample_rate) as u64, sample_rate)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_zero(&self) -> bool {
        self.samples == 0
    }

    pub fn as_secs_f64(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples as f64 / self.sample_rate as f64
    }

    /// Sum of two durations at the same sample rate.
    pub fn checked_add(self, other: ClipDuration) -> MediaResult<ClipDuration> {
        if self.sample_rate != other.sample_rate {
            return Err(MediaError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: other.sample_rate,
            });
        }
        Ok(ClipDuration::new(self.samples + other.samples, self.sample_rate))
    }
}

impl fmt::Display for ClipDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s ({} samples @ {} Hz)", self.as_secs_f64(), self.samples, self.sample_rate)
    }
}

/// One mono 16-bit PCM buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A zero-filled clip of `len` samples.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0; len], sample_rate)
    }

    /// Quantize normalized float samples (hard clipping out-of-range values).
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.iter().map(|&s| quantize(s)).collect(), sample_rate)
    }

    /// Normalized float copy of the samples.
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| sample_to_f32(s)).collect()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> ClipDuration {
        ClipDuration::new(self.samples.len() as u64, self.sample_rate)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    /// Peak absolute amplitude, normalized.
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .map(|&s| (s as i32).unsigned_abs())
            .max()
            .map_or(0.0, |p| p as f32 / I16_SCALE)
    }

    /// Decode a WAV buffer, downmixing multichannel audio to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> MediaResult<Self> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        };

        let mono: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        debug!(
            sample_rate = spec.sample_rate,
            channels = channels,
            bits = spec.bits_per_sample,
            samples = mono.len(),
            "Decoded WAV"
        );

        Ok(Self::from_f32(&mono, spec.sample_rate))
    }

    /// Encode as a 16-bit mono WAV buffer.
    pub fn to_wav_bytes(&self) -> MediaResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Read a WAV file.
    pub async fn read_wav(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MediaError::path_io(path, e))?;
        Self::from_wav_bytes(&bytes)
    }

    /// Write the clip as a 16-bit mono WAV file.
    pub async fn write_wav(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        let path = path.as_ref();
        let bytes = self.to_wav_bytes()?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| MediaError::path_io(path, e))
    }
}

/// Linear fade-in over the first `len` samples (clamped to the buffer).
pub fn fade_in(samples: &mut [f32], len: usize) {
    let len = len.min(samples.len());
    for (i, sample) in samples.iter_mut().take(len).enumerate() {
        *sample *= i as f32 / len as f32;
    }
}

/// Linear fade-out over the last `len` samples (clamped to the buffer).
pub fn fade_out(samples: &mut [f32], len: usize) {
    let total = samples.len();
    let len = len.min(total);
    for i in 0..len {
        samples[total - 1 - i] *= i as f32 / len as f32;
    }
}

/// Fade lengths that fit inside `len` samples.
///
/// When both fades do not fit they are scaled down together, keeping their
/// ratio, so the ramps meet without overlapping.
pub fn fit_fades(len: usize, fade_in: usize, fade_out: usize) -> (usize, usize) {
    let total = fade_in + fade_out;
    if total <= len {
        return (fade_in, fade_out);
    }
    let fade_in = len * fade_in / total;
    (fade_in, len - fade_in)
}
