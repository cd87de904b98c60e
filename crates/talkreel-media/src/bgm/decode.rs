//! Background track decoding.

use std::path::Path;

use tracing::debug;

use crate::audio::AudioClip;
use crate::command::create_ffmpeg_command;
use crate::error::{MediaError, MediaResult};

/// Decode any audio file to mono normalized samples at `sample_rate`.
///
/// WAV files already at the target rate are read directly; everything else
/// is resampled and downmixed by ffmpeg into raw `f32le`.
pub async fn decode_audio_file(path: &Path, sample_rate: u32) -> MediaResult<Vec<f32>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    if is_wav {
        match AudioClip::read_wav(path).await {
            Ok(clip) if clip.sample_rate() == sample_rate => {
                debug!(path = %path.display(), samples = clip.len(), "Read BGM with hound");
                return Ok(clip.to_f32());
            }
            Ok(clip) => debug!(
                path = %path.display(),
                source_rate = clip.sample_rate(),
                target_rate = sample_rate,
                "BGM needs resampling"
            ),
            Err(e) => debug!(path = %path.display(), error = %e, "hound could not read BGM"),
        }
    }

    decode_with_ffmpeg(path, sample_rate).await
}

async fn decode_with_ffmpeg(path: &Path, sample_rate: u32) -> MediaResult<Vec<f32>> {
    crate::command::check_ffmpeg()?;

    let raw = tempfile::Builder::new()
        .prefix("bgm-")
        .suffix(".f32")
        .tempfile()?;

    let output = create_ffmpeg_command()
        .arg("-i")
        .arg(path)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(sample_rate.to_string())
        .args(["-f", "f32le", "-y"])
        .arg(raw.path())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            format!("could not decode {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    let bytes = tokio::fs::read(raw.path())
        .await
        .map_err(|e| MediaError::path_io(raw.path(), e))?;

    if bytes.is_empty() {
        return Err(MediaError::InvalidMedia(format!(
            "{} decoded to no audio",
            path.display()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    debug!(path = %path.display(), samples = samples.len(), "Decoded BGM with ffmpeg");
    Ok(samples)
}
