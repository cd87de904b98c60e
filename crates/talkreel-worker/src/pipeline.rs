//! Dialogue-to-movie pipeline.
//!
//! One run is strictly sequential:
//! 0. the user dictionary, if configured, is registered with the engine
//! 1. every turn is synthesized (with retry), cleaned, sized and rendered
//! 2. the turns are assembled into a padded timeline
//! 3. background music is adapted to the timeline and mixed under it
//! 4. video and audio are muxed into the output file
//!
//! Intermediate files live in a per-run working directory that is removed
//! on every exit path. A failed run never leaves a file at the output path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use talkreel_media::{
    AudioClip, AudioCleaner, BgmMixer, BgmSource, CaptionRenderer, ClipDuration,
    ClipDurationResolver, MuxEncoder, Muxer, TimelineAssembler, VideoClip,
};
use talkreel_models::{Animation, CharacterTable, DialogueScript, FrameSize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::retry::retry_async;
use crate::synthesis::SpeechSynthesizer;
use crate::workdir::WorkDir;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub output: PathBuf,
    pub turns: usize,
    pub duration: ClipDuration,
    pub bgm: Option<PathBuf>,
}

pub struct MoviePipeline {
    config: PipelineConfig,
    characters: CharacterTable,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    renderer: Arc<dyn CaptionRenderer>,
    muxer: Muxer,
    cleaner: AudioCleaner,
    mixer: BgmMixer,
    bgm: Option<BgmSource>,
}

impl MoviePipeline {
    pub fn new(
        config: PipelineConfig,
        characters: CharacterTable,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        renderer: Arc<dyn CaptionRenderer>,
        encoder: Arc<dyn MuxEncoder>,
    ) -> Self {
        let bgm = config.bgm_source();
        Self {
            config,
            characters,
            synthesizer,
            renderer,
            muxer: Muxer::new(encoder),
            cleaner: AudioCleaner::default(),
            mixer: BgmMixer::default(),
            bgm,
        }
    }

    pub fn with_cleaner(mut self, cleaner: AudioCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_mixer(mut self, mixer: BgmMixer) -> Self {
        self.mixer = mixer;
        self
    }

    /// Override the BGM source derived from the config.
    pub fn with_bgm(mut self, bgm: Option<BgmSource>) -> Self {
        self.bgm = bgm;
        self
    }

    pub fn frame_size(&self) -> FrameSize {
        self.config.orientation.frame_size()
    }

    /// Produce `output` from `script`.
    pub async fn run(&self, script: &DialogueScript, output: &Path) -> PipelineResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let logger = RunLogger::new(&run_id, "pipeline");
        let span = logger.create_span();

        async {
            let started = Instant::now();
            logger.log_start(&format!("{} turns -> {}", script.len(), output.display()));

            let result = self.execute(&run_id, &logger, script, output).await;
            metrics::histogram!("talkreel_run_duration_seconds").record(started.elapsed().as_secs_f64());

            match &result {
                Ok(summary) => {
                    metrics::counter!("talkreel_runs_total", "status" => "success").increment(1);
                    logger.log_completion(&format!(
                        "{} in {:.1}s ({})",
                        summary.output.display(),
                        started.elapsed().as_secs_f64(),
                        summary.duration
                    ));
                }
                Err(e) => {
                    metrics::counter!("talkreel_runs_total", "status" => "failure").increment(1);
                    logger.log_error(&e.to_string());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: &Uuid,
        logger: &RunLogger,
        script: &DialogueScript,
        output: &Path,
    ) -> PipelineResult<RunSummary> {
        script.validate_speakers(&self.characters)?;

        let user_dict = self.config.user_dictionary().await?;

        let workdir = WorkDir::create(&self.config.work_root, run_id).await?;
        let animations = self.pick_animations(script.len());

        if let Some(dict) = &user_dict {
            let registered = self.synthesizer.register_user_dict(dict).await?;
            logger
                .for_stage("user_dict")
                .log_completion(&format!("{}/{} words registered", registered, dict.len()));
        }

        let turns = self
            .produce_turns(&logger.for_stage("turns"), script, &animations, &workdir)
            .await?;

        let stage = logger.for_stage("timeline");
        let started = Instant::now();
        let timeline = TimelineAssembler::new(self.config.timeline(), self.frame_size()).assemble(turns)?;
        let dialogue = timeline.render_audio();
        record_stage("timeline", started);
        stage.log_completion(&format!("{} turns, {}", timeline.turn_count(), timeline.duration()));

        let (audio, bgm) = self
            .mix_bgm(&logger.for_stage("bgm"), script, dialogue)
            .await?;

        let stage = logger.for_stage("mux");
        let started = Instant::now();
        stage.log_start(&output.display().to_string());
        let output = self.muxer.mux(&timeline, &audio, workdir.path(), output).await?;
        record_stage("mux", started);

        // The output is already in place at this point
        if let Err(e) = workdir.close().await {
            logger.log_warning(&format!("working directory cleanup failed: {}", e));
        }

        Ok(RunSummary {
            run_id: *run_id,
            output,
            turns: timeline.turn_count(),
            duration: timeline.duration(),
            bgm,
        })
    }

    fn pick_animations(&self, count: usize) -> Vec<Animation> {
        let mut rng = rand::rng();
        (0..count).map(|_| self.config.animation.pick(&mut rng)).collect()
    }

    /// Synthesize, clean, size and render every turn, in order.
    async fn produce_turns(
        &self,
        logger: &RunLogger,
        script: &DialogueScript,
        animations: &[Animation],
        workdir: &WorkDir,
    ) -> PipelineResult<Vec<(VideoClip, AudioClip)>> {
        let resolver = ClipDurationResolver::new(self.frame_size());
        let retry = self.config.synthesis_retry();
        let mut turns = Vec::with_capacity(script.len());

        for (index, (turn, animation)) in script.turns.iter().zip(animations).enumerate() {
            let started = Instant::now();
            let character = self.characters.get(&turn.speaker)?;

            let raw = retry_async(&retry, PipelineError::is_retryable, |_| {
                self.synthesizer.synthesize(&turn.text, character)
            })
            .await
            .into_result(&format!("speech synthesis for turn {}", index))?;

            let cleaned = self.cleaner.clean(&raw)?;

            let request = resolver.request(
                index,
                turn,
                &cleaned,
                character.color,
                *animation,
                script.title.as_deref(),
            )?;
            let clip = self
                .renderer
                .render(&request, &workdir.file(&format!("turn-{:03}.mp4", index)))
                .await?;
            resolver.verify(&request, &clip)?;

            record_stage("turn", started);
            metrics::counter!("talkreel_turns_processed_total").increment(1);
            logger.log_progress(&format!(
                "turn {}/{} ({}, {}, {})",
                index + 1,
                script.len(),
                turn.speaker,
                animation,
                request.duration
            ));

            turns.push((clip, cleaned));
        }

        Ok(turns)
    }

    async fn mix_bgm(
        &self,
        logger: &RunLogger,
        script: &DialogueScript,
        dialogue: AudioClip,
    ) -> PipelineResult<(AudioClip, Option<PathBuf>)> {
        let Some(source) = &self.bgm else {
            logger.log_warning("no BGM configured, dialogue only");
            return Ok((dialogue, None));
        };

        let started = Instant::now();
        let path = source.resolve(script.atmosphere.as_deref()).await?;
        let mixed = self.mixer.mix_file(&path, &dialogue).await?;
        record_stage("bgm", started);
        logger.log_completion(&path.display().to_string());

        Ok((mixed, Some(path)))
    }
}

fn record_stage(stage: &'static str, started: Instant) {
    metrics::histogram!("talkreel_stage_duration_seconds", "stage" => stage)
        .record(started.elapsed().as_secs_f64());
}
