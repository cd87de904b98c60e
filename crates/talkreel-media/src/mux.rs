//! Final muxing of the timeline video and the mixed audio track.
//!
//! The encoder writes into a hidden temporary sibling of the output. Only a
//! successful encode is renamed into place; on any failure the temporary is
//! deleted and whatever was at the output path stays as it was.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use talkreel_models::EncodingConfig;

use crate::audio::AudioClip;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::StagedFile;
use crate::progress::ProgressReporter;
use crate::timeline::{Timeline, VIDEO_OUTPUT_LABEL};

/// Name of the mixed audio file inside the working directory.
pub const MIXED_AUDIO_FILE: &str = "mix.wav";

/// Produces a container from a timeline and a mixed audio file.
#[async_trait]
pub trait MuxEncoder: Send + Sync {
    /// Encode into `output`, which already exists as an empty file.
    async fn encode(&self, timeline: &Timeline, audio: &Path, output: &Path) -> MediaResult<()>;
}

/// [`MuxEncoder`] backed by a single ffmpeg invocation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegMuxEncoder {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegMuxEncoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Audio is input 0; turn clips follow in timeline order.
    pub fn build_command(&self, timeline: &Timeline, audio: &Path, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(output).input(audio);
        for clip in timeline.video_inputs() {
            cmd = cmd.input(clip);
        }

        cmd = cmd
            .filter_complex(timeline.filter_graph(1))
            .map(format!("[{}]", VIDEO_OUTPUT_LABEL))
            .map("0:a")
            .output_args(self.encoding.to_ffmpeg_args())
            .frame_rate(timeline.fps())
            .duration(timeline.duration_secs());

        let is_mp4_family = output
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "mp4" | "m4v" | "mov"));
        if is_mp4_family {
            cmd = cmd.output_args(["-movflags", "+faststart"]);
        }
        cmd
    }
}

#[async_trait]
impl MuxEncoder for FfmpegMuxEncoder {
    async fn encode(&self, timeline: &Timeline, audio: &Path, output: &Path) -> MediaResult<()> {
        let cmd = self.build_command(timeline, audio, output);

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        let mut reporter = ProgressReporter::new("mux", timeline.duration_secs());
        runner
            .run_with_progress(&cmd, move |progress| {
                reporter.observe(&progress);
            })
            .await
    }
}

/// Writes the final deliverable.
#[derive(Clone)]
pub struct Muxer {
    encoder: Arc<dyn MuxEncoder>,
}

impl Muxer {
    pub fn new(encoder: Arc<dyn MuxEncoder>) -> Self {
        Self { encoder }
    }

    /// Mux `timeline` with `audio` into `output`.
    ///
    /// The mixed track is staged as a WAV in `work_dir`.
    pub async fn mux(
        &self,
        timeline: &Timeline,
        audio: &AudioClip,
        work_dir: &Path,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        if audio.duration() != timeline.duration() {
            return Err(MediaError::invalid_duration(format!(
                "mixed audio is {}, timeline is {}",
                audio.duration(),
                timeline.duration()
            )));
        }

        let audio_path = work_dir.join(MIXED_AUDIO_FILE);
        audio.write_wav(&audio_path).await?;

        let staged = StagedFile::create(output).await?;
        let started = Instant::now();

        info!(
            output = %output.display(),
            turns = timeline.turn_count(),
            duration_secs = timeline.duration_secs(),
            "Muxing final output"
        );

        let written = match self.encode_staged(timeline, &audio_path, &staged, output).await {
            Ok(written) => written,
            Err(e) => {
                error!(output = %output.display(), error = %e, "Mux failed, discarding partial output");
                staged.discard().await;
                return Err(e);
            }
        };

        staged.persist(output).await?;

        metrics::histogram!("talkreel_mux_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            output = %output.display(),
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Final output written"
        );

        Ok(output.to_path_buf())
    }

    /// Run the encoder into `staged` and return the number of bytes written.
    async fn encode_staged(
        &self,
        timeline: &Timeline,
        audio_path: &Path,
        staged: &StagedFile,
        output: &Path,
    ) -> MediaResult<u64> {
        self.encoder.encode(timeline, audio_path, staged.path()).await?;

        let written = tokio::fs::metadata(staged.path())
            .await
            .map_err(|e| MediaError::path_io(staged.path(), e))?
            .len();
        if written == 0 {
            return Err(MediaError::InvalidMedia(format!(
                "encoder produced an empty file for {}",
                output.display()
            )));
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::VideoClip;
    use crate::timeline::{TimelineAssembler, TimelineConfig};
    use talkreel_models::FrameSize;
    use tempfile::TempDir;

    const RATE: u32 = 24_000;

    fn timeline() -> Timeline {
        let turns = ["a.mp4", "b.mp4"]
            .iter()
            .map(|name| {
                let audio = AudioClip::silence(RATE as usize, RATE);
                (VideoClip::new(*name, audio.duration(), FrameSize::LANDSCAPE), audio)
            })
            .collect();
        TimelineAssembler::new(TimelineConfig::default(), FrameSize::LANDSCAPE)
            .assemble(turns)
            .unwrap()
    }

    /// Writes some bytes, then optionally fails mid-encode.
    struct FakeEncoder {
        fail: bool,
    }

    #[async_trait]
    impl MuxEncoder for FakeEncoder {
        async fn encode(&self, _timeline: &Timeline, audio: &Path, output: &Path) -> MediaResult<()> {
            assert!(audio.exists());
            tokio::fs::write(output, b"partial movie data").await?;
            if self.fail {
                return Err(MediaError::ffmpeg_failed("simulated crash", None, Some(1)));
            }
            Ok(())
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_successful_mux_moves_into_place() {
        let work = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("movie.mp4");
        let timeline = timeline();

        let muxer = Muxer::new(Arc::new(FakeEncoder { fail: false }));
        let written = muxer
            .mux(&timeline, &timeline.render_audio(), work.path(), &output)
            .await
            .unwrap();

        assert_eq!(written, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"partial movie data");
        assert_eq!(dir_entries(out_dir.path()), vec!["movie.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_mux_leaves_nothing_behind() {
        let work = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("movie.mp4");
        let timeline = timeline();

        let muxer = Muxer::new(Arc::new(FakeEncoder { fail: true }));
        let result = muxer
            .mux(&timeline, &timeline.render_audio(), work.path(), &output)
            .await;

        assert!(matches!(result, Err(MediaError::FfmpegFailed { .. })));
        assert!(!output.exists());
        assert!(dir_entries(out_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_mux_keeps_existing_output() {
        let work = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("movie.mp4");
        std::fs::write(&output, b"previous render").unwrap();
        let timeline = timeline();

        let muxer = Muxer::new(Arc::new(FakeEncoder { fail: true }));
        assert!(muxer
            .mux(&timeline, &timeline.render_audio(), work.path(), &output)
            .await
            .is_err());

        assert_eq!(std::fs::read(&output).unwrap(), b"previous render");
        assert_eq!(dir_entries(out_dir.path()), vec!["movie.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_mux_removes_created_output_dir() {
        let work = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("renders").join("movie.mp4");
        let timeline = timeline();

        let muxer = Muxer::new(Arc::new(FakeEncoder { fail: true }));
        assert!(muxer
            .mux(&timeline, &timeline.render_audio(), work.path(), &output)
            .await
            .is_err());

        assert!(!out_dir.path().join("renders").exists());
        assert!(dir_entries(out_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_audio_length_must_match_timeline() {
        let work = TempDir::new().unwrap();
        let output = work.path().join("movie.mp4");
        let muxer = Muxer::new(Arc::new(FakeEncoder { fail: false }));

        let err = muxer
            .mux(&timeline(), &AudioClip::silence(10, RATE), work.path(), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidDuration(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_ffmpeg_command() {
        let timeline = timeline();
        let encoder = FfmpegMuxEncoder::new(EncodingConfig::default());
        let args = encoder
            .build_command(&timeline, Path::new("mix.wav"), Path::new("out.mp4"))
            .build_args();

        let inputs: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-i")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(inputs, ["mix.wav", "a.mp4", "b.mp4"]);

        let graph = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(graph.contains("[1:v]fps=24") && graph.contains("[2:v]fps=24"));
        assert!(args.contains(&"[outv]".to_string()));
        assert!(args.contains(&"0:a".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"4.000000".to_string()));

        let mkv = encoder
            .build_command(&timeline, Path::new("mix.wav"), Path::new("out.mkv"))
            .build_args();
        assert!(!mkv.contains(&"+faststart".to_string()));
    }
}
