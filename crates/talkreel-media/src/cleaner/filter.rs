//! Zero-phase Butterworth high-pass filter.
//!
//! The 4th-order response is a cascade of two `biquad` high-pass sections
//! with the Butterworth pole Qs, run forward and backward over an
//! odd-extended copy of the signal with steady-state initial conditions.
//! The combined response has no phase shift, so speech onsets stay where
//! they were.

use std::f64::consts::PI;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::{MediaError, MediaResult};

/// Filter order of the cascade.
const ORDER: usize = 4;

/// Gain of a section at DC.
fn dc_gain(coeffs: &Coefficients<f64>) -> f64 {
    (coeffs.b0 + coeffs.b1 + coeffs.b2) / (1.0 + coeffs.a1 + coeffs.a2)
}

/// Section primed so a constant input `x0` looks like it has always been there.
fn primed_section(coeffs: Coefficients<f64>, x0: f64) -> DirectForm2Transposed<f64> {
    let y0 = dc_gain(&coeffs) * x0;
    let mut section = DirectForm2Transposed::<f64>::new(coeffs);
    section.s2 = coeffs.b2 * x0 - coeffs.a2 * y0;
    section.s1 = coeffs.b1 * x0 - coeffs.a1 * y0 + section.s2;
    section
}

/// 4th-order Butterworth high-pass, applied with zero phase.
#[derive(Debug, Clone)]
pub struct ButterworthHighpass {
    sections: [Coefficients<f64>; ORDER / 2],
}

impl ButterworthHighpass {
    /// Design the filter for `cutoff_hz` at `sample_rate`.
    pub fn new(cutoff_hz: f32, sample_rate: u32) -> MediaResult<Self> {
        let fs = sample_rate as f64;
        let fc = cutoff_hz as f64;
        if sample_rate == 0 || !(fc > 0.0 && fc < fs / 2.0) {
            return Err(MediaError::config(format!(
                "high-pass cutoff {} Hz is outside (0, {}) Hz",
                cutoff_hz,
                fs / 2.0
            )));
        }

        // Butterworth pole pairs: Q_k = 1 / (2 cos((2k + 1) pi / 2N))
        let section = |k: usize| {
            let q = 1.0 / (2.0 * ((2 * k + 1) as f64 * PI / (2 * ORDER) as f64).cos());
            Coefficients::<f64>::from_params(Type::HighPass, fs.hz(), fc.hz(), q).map_err(|e| {
                MediaError::config(format!("high-pass section design failed: {:?}", e))
            })
        };

        Ok(Self {
            sections: [section(0)?, section(1)?],
        })
    }

    /// Edge padding used by the forward-backward pass.
    fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Run the cascade once with steady-state initial conditions for `signal[0]`.
    fn run_cascade(&self, signal: &mut [f64]) {
        let Some(&first) = signal.first() else {
            return;
        };
        let mut x0 = first;
        for coeffs in &self.sections {
            let mut section = primed_section(*coeffs, x0);
            for sample in signal.iter_mut() {
                *sample = section.run(*sample);
            }
            x0 *= dc_gain(coeffs);
        }
    }

    /// Filter forward then backward. Output has the same length as the input.
    ///
    /// Buffers shorter than two samples are returned unchanged.
    pub fn filtfilt(&self, input: &[f32]) -> Vec<f32> {
        let len = input.len();
        if len < 2 {
            return input.to_vec();
        }

        let pad = self.pad_len().min(len - 1);
        let first = input[0] as f64;
        let last = input[len - 1] as f64;

        // Odd extension about both end points
        let mut extended = Vec::with_capacity(len + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i] as f64));
        extended.extend(input.iter().map(|&s| s as f64));
        extended.extend((1..=pad).map(|i| 2.0 * last - input[len - 1 - i] as f64));

        self.run_cascade(&mut extended);
        extended.reverse();
        self.run_cascade(&mut extended);
        extended.reverse();

        extended[pad..pad + len].iter().map(|&s| s as f32).collect()
    }
}
