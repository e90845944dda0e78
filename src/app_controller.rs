use anyhow::{anyhow, Result, Context};
use log::{info, warn, debug};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle, MultiProgress};
use parking_lot::Mutex;

use crate::app_config::Config;
use crate::executor::{CommandRunner, ProcessExecutor};
use crate::file_utils::{FileManager, FileType};
use crate::media_commands::MediaCommands;
use crate::pipeline::{PipelineConfig, PipelineJob, PipelineObserver, PipelineStage, StageEvent, VideoPipeline};
use crate::subtitle_processor::SubtitleCollection;
use crate::transcription::{SpeechTranscriber, TranscriptionClient};

// @module: Application controller for video subtitling

/// Main application controller: wires configuration to the pipeline
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: External process runner
    runner: Arc<dyn CommandRunner>,

    // @field: Speech recognizer
    transcriber: Arc<dyn SpeechTranscriber>,

    // @field: Draw stage spinners
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller backed by ffmpeg and the configured recognizer
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let runner = Arc::new(ProcessExecutor::new(Some(config.media.timeout())));
        let transcriber = Arc::new(TranscriptionClient::new(config.recognition.clone()));

        Ok(Self {
            config,
            runner,
            transcriber,
            show_progress: true,
        })
    }

    // @method: Create a controller with injected collaborators
    pub fn with_components(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        transcriber: Arc<dyn SpeechTranscriber>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        Ok(Self {
            config,
            runner,
            transcriber,
            show_progress: false,
        })
    }

    /// Enable or disable the stage spinners
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline on one video.
    ///
    /// Returns `Ok(None)` when the output already exists and `force_overwrite`
    /// is not set.
    pub async fn run(&self, input_file: PathBuf, output_dir: Option<PathBuf>, force_overwrite: bool) -> Result<Option<PathBuf>> {
        let start_time = Instant::now();

        let commands = MediaCommands::new(self.config.media.clone());
        match FileManager::detect_file_type(&input_file, self.runner.as_ref(), &commands).await? {
            FileType::Video => {}
            FileType::Unknown => warn!("Could not identify {:?} as a video; trying anyway", input_file),
            other => return Err(anyhow!("Expected a video file, got {:?}: {:?}", other, input_file)),
        }

        let output_dir = output_dir.or_else(|| self.config.output_dir.clone());
        if let Some(dir) = &output_dir {
            FileManager::ensure_dir(dir)?;
        }

        let job = PipelineJob::new(input_file, output_dir.as_deref());
        if job.output_path.exists() {
            if !force_overwrite {
                warn!("Skipping file, output already exists (use -f to force overwrite): {:?}", job.output_path);
                return Ok(None);
            }
            debug!("Overwriting existing output {:?}", job.output_path);
        }

        let progress = self.show_progress.then(|| Arc::new(StageProgress::new()));
        let mut pipeline = VideoPipeline::new(
            self.runner.clone(),
            self.transcriber.clone(),
            PipelineConfig::from(&self.config),
        );
        if let Some(progress) = &progress {
            pipeline = pipeline.with_observer(progress.clone());
        }

        let result = pipeline.process(&job).await;
        if let Some(progress) = &progress {
            progress.finish();
        }
        let output = result.with_context(|| format!("Failed to process {:?}", job.input_video))?;

        info!(
            "Subtitled video written to {:?} in {}",
            output,
            Self::format_duration(start_time.elapsed())
        );
        Ok(Some(output))
    }

    /// Transcribe an audio file straight to an SRT file
    pub async fn transcribe_only(&self, audio_file: PathBuf, output: Option<PathBuf>) -> Result<PathBuf> {
        let start_time = Instant::now();

        if !FileManager::file_exists(&audio_file) {
            return Err(anyhow!("Audio file does not exist: {:?}", audio_file));
        }

        let output = output.unwrap_or_else(|| audio_file.with_extension("srt"));
        let spinner = self.show_progress.then(|| stage_spinner(PipelineStage::Transcribing));

        let words = self.transcriber.transcribe(&audio_file).await;
        if let Some(spinner) = &spinner {
            spinner.finish_and_clear();
        }
        let words = words.with_context(|| format!("Failed to transcribe {:?}", audio_file))?;

        let subtitles = &self.config.subtitles;
        let collection = SubtitleCollection::from_words(
            audio_file.clone(),
            &words,
            subtitles.granularity,
            subtitles.max_phrase_chars,
        );
        collection
            .write_to_srt(&output)
            .await
            .with_context(|| format!("Failed to write subtitle file {:?}", output))?;

        info!(
            "Wrote {} cue(s) to {:?} in {}",
            collection.entries.len(),
            output,
            Self::format_duration(start_time.elapsed())
        );
        Ok(output)
    }

    /// Format a duration for log lines
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// One spinner per running stage
struct StageProgress {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<PipelineStage, ProgressBar>>,
}

impl StageProgress {
    fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Clear spinners of stages that never reported completion
    fn finish(&self) {
        for (_, bar) in self.bars.lock().drain() {
            bar.finish_and_clear();
        }
    }
}

impl PipelineObserver for StageProgress {
    fn on_event(&self, event: &StageEvent) {
        let mut bars = self.bars.lock();
        match event {
            StageEvent::Started(stage) => {
                let bar = self.multi_progress.add(stage_spinner(*stage));
                bars.insert(*stage, bar);
            }
            StageEvent::Completed { stage, elapsed } => {
                if let Some(bar) = bars.remove(stage) {
                    bar.finish_with_message(format!("{} ({})", stage, Controller::format_duration(*elapsed)));
                }
            }
            StageEvent::Failed { stage, .. } => {
                if let Some(bar) = bars.remove(stage) {
                    bar.abandon_with_message(format!("{} failed", stage));
                }
            }
        }
    }
}

fn stage_spinner(stage: PipelineStage) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.set_message(stage.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
