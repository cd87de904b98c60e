//! talkreel binary: `talkreel <script.txt> <output.mp4>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use talkreel_media::command::check_ffmpeg;
use talkreel_media::{DrawtextRenderer, FfmpegMuxEncoder};
use talkreel_worker::{load_script, MoviePipeline, PipelineConfig, VoicevoxClient};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("talkreel=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(script_path: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    info!("Pipeline config: {:?}", config);

    check_ffmpeg()?;

    let characters = config.characters().await?;
    let script = load_script(&script_path).await?;

    let synthesizer = VoicevoxClient::new(config.voicevox_url(), Duration::from_secs(60))?;

    let mut renderer = DrawtextRenderer::discover(config.fps)?;
    let mut encoder = FfmpegMuxEncoder::new(config.encoding.clone());
    if let Some(secs) = config.ffmpeg_timeout_secs {
        renderer = renderer.with_timeout(secs);
        encoder = encoder.with_timeout(secs);
    }

    let pipeline = MoviePipeline::new(
        config,
        characters,
        Arc::new(synthesizer),
        Arc::new(renderer),
        Arc::new(encoder),
    );

    let summary = pipeline.run(&script, &output).await?;
    info!(
        run_id = %summary.run_id,
        output = %summary.output.display(),
        turns = summary.turns,
        duration_secs = summary.duration.as_secs_f64(),
        bgm = ?summary.bgm,
        "Movie written"
    );
    Ok(())
}

fn parse_args() -> anyhow::Result<(PathBuf, PathBuf)> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [script, output] => Ok((PathBuf::from(script), PathBuf::from(output))),
        _ => bail!("usage: talkreel <script.txt> <output.mp4>"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let (script, output) = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Starting talkreel");

    if let Err(e) = run(script, output).await {
        error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}
