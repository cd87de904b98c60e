//! FFmpeg progress parsing and reporting.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Progress information from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }

    /// Estimated seconds remaining.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }

        let remaining_ms = total_duration_ms - self.out_time_ms;
        if remaining_ms <= 0 {
            return Some(0.0);
        }

        Some((remaining_ms as f64 / 1000.0) / self.speed)
    }
}

/// Logs encode progress every `step` percent for one ffmpeg run.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    total_ms: i64,
    step: f64,
    next: f64,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total_secs: f64) -> Self {
        Self {
            label: label.into(),
            total_ms: (total_secs * 1000.0).round() as i64,
            step: 25.0,
            next: 25.0,
        }
    }

    /// Returns the percentage when a new step was crossed.
    pub fn observe(&mut self, progress: &FfmpegProgress) -> Option<f64> {
        let percent = if progress.is_complete {
            100.0
        } else {
            progress.percentage(self.total_ms)
        };
        if percent < self.next {
            return None;
        }

        while self.next <= percent {
            self.next += self.step;
        }

        info!(
            stage = %self.label,
            percent = percent.round(),
            frame = progress.frame,
            eta_secs = ?progress.eta_seconds(self.total_ms).map(|s| s.round()),
            "Encoding progress"
        );
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(4000) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_eta_calculation() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };

        let eta = progress.eta_seconds(10000).unwrap();
        assert!((eta - 2.5).abs() < 0.01);
        assert_eq!(FfmpegProgress::default().eta_seconds(10000), None);
    }

    #[test]
    fn test_reporter_steps() {
        let mut reporter = ProgressReporter::new("mux", 10.0);
        let at = |ms| FfmpegProgress {
            out_time_ms: ms,
            ..Default::default()
        };

        let crossed = |value: Option<f64>, expected: f64| matches!(value, Some(p) if (p - expected).abs() < 1e-9);

        assert_eq!(reporter.observe(&at(1000)), None);
        assert!(crossed(reporter.observe(&at(2600)), 26.0));
        assert_eq!(reporter.observe(&at(3000)), None);
        // Jumping past several steps reports once
        assert!(crossed(reporter.observe(&at(8000)), 80.0));
        assert_eq!(reporter.observe(&at(9000)), None);

        let done = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(reporter.observe(&done), Some(100.0));
    }
}
