//! Caption clip rendering.
//!
//! [`DrawtextRenderer`] draws one turn as a black frame with a speech bubble
//! in the speaker's colour, the wrapped line inside it and the speaker name
//! above it. The enter animation is expressed as ffmpeg expressions so the
//! whole clip comes out of a single ffmpeg run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use talkreel_models::{Animation, FrameSize, Orientation, Rgb, DEFAULT_FPS};
use talkreel_models::animation::SLIDE_SECS;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::duration::{RenderRequest, VideoClip};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_media, MediaInfo};

/// CJK-capable fonts, in order of preference.
pub const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
];

const FONT_SIZE: u32 = 36;
const NAME_FONT_SIZE: u32 = FONT_SIZE + 5;
const LINE_SPACING: u32 = 8;
const MARGIN_VERTICAL: u32 = 20;
const MARGIN_HORIZONTAL: u32 = 40;
const NAME_GAP: u32 = 20;
const SHADOW_OFFSET: u32 = 15;
const NAME_BORDER: u32 = 6;

/// Renders the caption clip for one turn.
#[async_trait]
pub trait CaptionRenderer: Send + Sync {
    /// Render `request` into `output`. The returned clip must carry the
    /// requested duration.
    async fn render(&self, request: &RenderRequest, output: &Path) -> MediaResult<VideoClip>;
}

/// First existing font among `candidates`.
pub fn find_font<P: AsRef<Path>>(candidates: &[P]) -> MediaResult<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            MediaError::config("no CJK font found; install Noto Sans CJK or set a font path")
        })
}

/// Whether `c` occupies two columns in a monospaced CJK layout.
pub fn is_fullwidth(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x20000..=0x3FFFD
    )
}

fn char_width(c: char) -> usize {
    if is_fullwidth(c) {
        2
    } else {
        1
    }
}

/// Display width in columns.
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Greedy wrap at `width` display columns. Full-width characters count double.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_width = 0;

    for c in text.chars() {
        let w = char_width(c);
        if line_width + w > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
            line_width = 0;
        }
        line.push(c);
        line_width += w;
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Escape a value for use inside an ffmpeg filter option.
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | ';' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Horizontal and vertical offset expressions for a slide-in, in pixels.
///
/// [`Animation::offset`] written in ffmpeg's expression language, built from
/// the same direction and slide time.
pub fn offset_exprs(animation: Animation, frame: FrameSize) -> (String, String) {
    let remaining = format!("(1-min(t/{}\\,1))", SLIDE_SECS);
    let (ux, uy) = animation.direction();
    let axis = |unit: f64, extent: u32| {
        if unit == 0.0 {
            "0".to_string()
        } else {
            format!("{}*{}", unit * extent as f64, remaining)
        }
    };
    (axis(ux, frame.width), axis(uy, frame.height))
}

/// Bubble geometry for a wrapped caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    bubble_x: u32,
    bubble_y: u32,
    bubble_w: u32,
    bubble_h: u32,
    name_y: i64,
}

fn layout(lines: &[String], frame: FrameSize) -> Layout {
    let columns = lines.iter().map(|l| display_width(l)).max().unwrap_or(0) as u32;
    let text_w = columns * FONT_SIZE / 2;
    let text_h = lines.len() as u32 * (FONT_SIZE + LINE_SPACING);

    let bubble_w = (text_w + 2 * MARGIN_HORIZONTAL).min(frame.width);
    let bubble_h = (text_h + 3 * MARGIN_VERTICAL).min(frame.height);
    let bubble_x = (frame.width - bubble_w) / 2;
    let bubble_y = (frame.height - bubble_h) / 2;
    let name_y = bubble_y as i64 - (NAME_FONT_SIZE + MARGIN_VERTICAL + NAME_GAP) as i64;

    Layout {
        bubble_x,
        bubble_y,
        bubble_w,
        bubble_h,
        name_y,
    }
}

/// Caption renderer built on ffmpeg's `drawbox` and `drawtext` filters.
#[derive(Debug, Clone)]
pub struct DrawtextRenderer {
    font_path: PathBuf,
    fps: u32,
    timeout_secs: Option<u64>,
}

impl DrawtextRenderer {
    pub fn new(font_path: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            font_path: font_path.into(),
            fps,
            timeout_secs: None,
        }
    }

    /// Use the first installed font from [`FONT_PATHS`].
    pub fn discover(fps: u32) -> MediaResult<Self> {
        Ok(Self::new(find_font(FONT_PATHS)?, fps))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// The `-vf` chain for one request. Text is read from the given files.
    pub fn filter_chain(
        &self,
        request: &RenderRequest,
        lines: &[String],
        caption_file: &Path,
        name_file: &Path,
        title_file: Option<&Path>,
    ) -> String {
        let frame = request.frame_size;
        let geometry = layout(lines, frame);
        let (dx, dy) = offset_exprs(request.animation, frame);
        let font = escape_filter_value(&self.font_path.to_string_lossy());
        let fill = request.color.scaled(0.8).to_ffmpeg();
        let shadow = request.color.scaled(0.4).to_ffmpeg();
        let white = Rgb(255, 255, 255).to_ffmpeg();

        let mut filters = vec![
            format!(
                "drawbox=x={}+{}:y={}+{}:w={}:h={}:color={}:t=fill",
                geometry.bubble_x + SHADOW_OFFSET,
                dx,
                geometry.bubble_y + SHADOW_OFFSET,
                dy,
                geometry.bubble_w,
                geometry.bubble_h,
                shadow
            ),
            format!(
                "drawbox=x={}+{}:y={}+{}:w={}:h={}:color={}:t=fill",
                geometry.bubble_x, dx, geometry.bubble_y, dy, geometry.bubble_w, geometry.bubble_h, fill
            ),
            format!(
                "drawtext=fontfile='{}':textfile='{}':fontsize={}:fontcolor={}:line_spacing={}:x={}+{}:y={}+{}",
                font,
                escape_filter_value(&caption_file.to_string_lossy()),
                FONT_SIZE,
                white,
                LINE_SPACING,
                geometry.bubble_x + MARGIN_HORIZONTAL,
                dx,
                geometry.bubble_y + MARGIN_VERTICAL,
                dy
            ),
            format!(
                "drawtext=fontfile='{}':textfile='{}':fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x=(w-text_w)/2+{}:y={}+{}",
                font,
                escape_filter_value(&name_file.to_string_lossy()),
                NAME_FONT_SIZE,
                white,
                NAME_BORDER,
                fill,
                dx,
                geometry.name_y,
                dy
            ),
        ];

        if let Some(title_file) = title_file {
            filters.push(format!(
                "drawtext=fontfile='{}':textfile='{}':fontsize={}:fontcolor={}:x=(w-text_w)/2:y={}",
                font,
                escape_filter_value(&title_file.to_string_lossy()),
                FONT_SIZE,
                white,
                MARGIN_VERTICAL * 2
            ));
        }

        let secs = request.duration_secs();
        if let Some(fade) = request.animation.fade_secs(secs) {
            filters.push(format!("fade=t=in:st=0:d={:.6}", fade));
            filters.push(format!("fade=t=out:st={:.6}:d={:.6}", secs - fade, fade));
        }

        filters.join(",")
    }

    /// Check what ffprobe reports for a rendered clip against the request.
    ///
    /// The container duration may differ from the request by at most one
    /// frame.
    fn rendered_clip(&self, request: &RenderRequest, output: &Path, info: &MediaInfo) -> MediaResult<VideoClip> {
        let frame_size = info.frame_size.ok_or_else(|| {
            MediaError::InvalidMedia(format!("{} has no video stream", output.display()))
        })?;

        let tolerance = 1.0 / self.fps.max(1) as f64;
        let drift = (info.duration - request.duration_secs()).abs();
        if drift > tolerance + 1e-6 {
            return Err(MediaError::invalid_duration(format!(
                "turn {} rendered {:.3}s, requested {:.3}s",
                request.index,
                info.duration,
                request.duration_secs()
            )));
        }

        Ok(VideoClip::new(output, request.duration, frame_size))
    }

    fn build_command(&self, request: &RenderRequest, chain: String, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .lavfi_input(format!(
                "color=c=black:s={}:r={}:d={:.6}",
                request.frame_size.to_ffmpeg(),
                self.fps,
                request.duration_secs()
            ))
            .video_filter(chain)
            .video_codec("libx264")
            .output_args(["-preset", "veryfast", "-pix_fmt", "yuv420p"])
            .frame_rate(self.fps)
            .no_audio()
            .duration(request.duration_secs())
    }
}

impl Default for DrawtextRenderer {
    fn default() -> Self {
        Self::new(FONT_PATHS[0], DEFAULT_FPS)
    }
}

#[async_trait]
impl CaptionRenderer for DrawtextRenderer {
    async fn render(&self, request: &RenderRequest, output: &Path) -> MediaResult<VideoClip> {
        if !self.font_path.is_file() {
            return Err(MediaError::config(format!(
                "font {} does not exist",
                self.font_path.display()
            )));
        }

        let columns = if request.frame_size.is_vertical() {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
        .caption_columns();
        let lines = wrap_text(&request.text, columns);

        // drawtext reads text from files so no caption needs filter escaping
        let caption_file = output.with_extension("caption.txt");
        let name_file = output.with_extension("name.txt");
        let title_file = request.title.as_ref().map(|_| output.with_extension("title.txt"));

        write_text(&caption_file, &lines.join("\n")).await?;
        write_text(&name_file, &request.speaker).await?;
        if let (Some(path), Some(title)) = (&title_file, &request.title) {
            write_text(path, title).await?;
        }

        let chain = self.filter_chain(request, &lines, &caption_file, &name_file, title_file.as_deref());
        let cmd = self.build_command(request, chain, output);

        debug!(
            index = request.index,
            speaker = %request.speaker,
            lines = lines.len(),
            animation = %request.animation,
            "Rendering caption clip"
        );

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner.run(&cmd).await?;

        let info = probe_media(output).await?;
        let clip = self.rendered_clip(request, output, &info)?;

        info!(
            index = request.index,
            output = %output.display(),
            duration_secs = info.duration,
            "Rendered caption clip"
        );

        Ok(clip)
    }
}

async fn write_text(path: &Path, text: &str) -> MediaResult<()> {
    tokio::fs::write(path, text)
        .await
        .map_err(|e| MediaError::path_io(path, e))
}
