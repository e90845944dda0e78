/*!
 * Pipeline orchestration.
 *
 * Stage graph for one job:
 *
 * ```text
 * ExtractingAudio ──> Transcribing ──┐
 *                                     ├──> Overlaying ──> output
 * FormattingVideo ───────────────────┘
 * ```
 *
 * The two branches run concurrently inside one `try_join!`; the overlay
 * starts only after both have returned. The first fatal error drops the
 * sibling branch, which kills any ffmpeg process it still has running.
 */

use log::{debug, error, info, warn};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::app_config::{Config, MediaConfig, SubtitleConfig};
use crate::errors::PipelineError;
use crate::executor::{CommandRunner, CommandSpec};
use crate::media_commands::MediaCommands;
use crate::subtitle_processor::SubtitleCollection;
use crate::transcription::SpeechTranscriber;

use super::job::PipelineJob;

/// Named stages of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ExtractingAudio,
    FormattingVideo,
    Transcribing,
    Overlaying,
}

impl PipelineStage {
    /// All stages, in the order they are first started
    pub const ALL: [PipelineStage; 4] = [
        Self::ExtractingAudio,
        Self::FormattingVideo,
        Self::Transcribing,
        Self::Overlaying,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtractingAudio => "Extracting audio",
            Self::FormattingVideo => "Formatting video",
            Self::Transcribing => "Transcribing",
            Self::Overlaying => "Burning subtitles",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stage lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started(PipelineStage),
    Completed {
        stage: PipelineStage,
        elapsed: Duration,
    },
    Failed {
        stage: PipelineStage,
        message: String,
    },
}

impl StageEvent {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Started(stage) => *stage,
            Self::Completed { stage, .. } | Self::Failed { stage, .. } => *stage,
        }
    }
}

/// Receives stage events; called from the task running the stage
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &StageEvent);
}

/// Observer that ignores every event
#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_event(&self, _event: &StageEvent) {}
}

/// Settings for one pipeline instance
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// ffmpeg invocation parameters
    pub media: MediaConfig,

    /// Cue granularity and phrase length
    pub subtitles: SubtitleConfig,

    /// Deadline for a whole job
    pub job_timeout: Option<Duration>,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            media: config.media.clone(),
            subtitles: config.subtitles.clone(),
            job_timeout: config.job_timeout(),
        }
    }
}

/// Runs jobs through the extract / format / transcribe / overlay graph
pub struct VideoPipeline {
    runner: Arc<dyn CommandRunner>,
    transcriber: Arc<dyn SpeechTranscriber>,
    commands: MediaCommands,
    config: PipelineConfig,
    observer: Arc<dyn PipelineObserver>,
}

impl VideoPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        transcriber: Arc<dyn SpeechTranscriber>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            runner,
            transcriber,
            commands: MediaCommands::new(config.media.clone()),
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the stage observer
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a job and return the path of the subtitled video.
    ///
    /// On failure the output path is removed only if the overlay had started,
    /// so an earlier output from another run survives a failed rerun. The
    /// single job-level error is returned.
    pub async fn process(&self, job: &PipelineJob) -> Result<PathBuf, PipelineError> {
        let start_time = Instant::now();

        if !tokio::fs::try_exists(&job.input_video).await.unwrap_or(false) {
            return Err(PipelineError::MissingInput(job.input_video.clone()));
        }

        info!("Starting {}", job);

        let overlay_started = AtomicBool::new(false);
        let graph = self.run_graph(job, &overlay_started);
        let result = match self.config.job_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, graph).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout(timeout)),
            },
            None => graph.await,
        };

        match result {
            Ok(()) => {
                info!(
                    "Job {} finished in {:?}: {:?}",
                    job.short_id(),
                    start_time.elapsed(),
                    job.output_path
                );
                Ok(job.output_path.clone())
            }
            Err(e) => {
                error!("Job {} failed: {}", job.short_id(), e);
                if overlay_started.load(Ordering::SeqCst) {
                    remove_partial_output(&job.output_path).await;
                }
                Err(e)
            }
        }
    }

    async fn run_graph(&self, job: &PipelineJob, overlay_started: &AtomicBool) -> Result<(), PipelineError> {
        tokio::try_join!(self.format_branch(job), self.transcription_branch(job))?;
        overlay_started.store(true, Ordering::SeqCst);
        self.overlay(job).await
    }

    async fn format_branch(&self, job: &PipelineJob) -> Result<(), PipelineError> {
        let command = self.commands.format_video(&job.input_video, &job.formatted_video_path);
        self.run_command(PipelineStage::FormattingVideo, &command).await
    }

    async fn transcription_branch(&self, job: &PipelineJob) -> Result<(), PipelineError> {
        let command = self.commands.extract_audio(&job.input_video, &job.audio_path);
        self.run_command(PipelineStage::ExtractingAudio, &command).await?;

        self.run_stage(PipelineStage::Transcribing, self.transcribe(job)).await
    }

    async fn overlay(&self, job: &PipelineJob) -> Result<(), PipelineError> {
        let command = self.commands.burn_subtitles(
            &job.formatted_video_path,
            &job.subtitle_path,
            &job.output_path,
        );
        self.run_command(PipelineStage::Overlaying, &command).await
    }

    /// Transcribe the extracted audio and write the subtitle artifact
    async fn transcribe(&self, job: &PipelineJob) -> Result<(), PipelineError> {
        let words = self.transcriber.transcribe(&job.audio_path).await?;

        let subtitles = &self.config.subtitles;
        let collection = SubtitleCollection::from_words(
            job.audio_path.clone(),
            &words,
            subtitles.granularity,
            subtitles.max_phrase_chars,
        );
        if collection.entries.is_empty() {
            warn!("No speech recognized in {:?}; subtitle file will be empty", job.audio_path);
        }

        collection
            .write_to_srt(&job.subtitle_path)
            .await
            .map_err(|e| PipelineError::SubtitleWrite {
                path: job.subtitle_path.clone(),
                source: e,
            })?;

        debug!(
            "Wrote {} cue(s) from {} word(s) to {:?}",
            collection.entries.len(),
            words.len(),
            job.subtitle_path
        );
        Ok(())
    }

    async fn run_command(&self, stage: PipelineStage, command: &CommandSpec) -> Result<(), PipelineError> {
        self.run_stage(stage, async {
            self.runner
                .execute(command)
                .await
                .map(|_| ())
                .map_err(|source| PipelineError::Execution { stage, source })
        })
        .await
    }

    /// Wrap a stage future with started/completed/failed events
    async fn run_stage<F, T>(&self, stage: PipelineStage, future: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let start_time = Instant::now();
        info!("{}...", stage);
        self.observer.on_event(&StageEvent::Started(stage));

        match future.await {
            Ok(value) => {
                let elapsed = start_time.elapsed();
                info!("{} done in {:?}", stage, elapsed);
                self.observer.on_event(&StageEvent::Completed { stage, elapsed });
                Ok(value)
            }
            Err(e) => {
                self.observer.on_event(&StageEvent::Failed {
                    stage,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl fmt::Debug for VideoPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoPipeline")
            .field("runner", &self.runner)
            .field("transcriber", &self.transcriber)
            .field("config", &self.config)
            .finish()
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}
