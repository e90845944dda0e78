/*!
 * Scripted pipeline collaborators with controllable latency and failure.
 *
 * `ScriptedRunner` stands in for ffmpeg and `ScriptedTranscriber` for the
 * recognition service. Both write to a shared `Timeline` so tests can check
 * which stage started before which finished.
 */

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use parking_lot::Mutex;

use vidsub::errors::{ExecutionError, TranscriptionError};
use vidsub::executor::{CommandOutput, CommandRunner, CommandSpec};
use vidsub::pipeline::{PipelineObserver, PipelineStage, StageEvent};
use vidsub::transcription::{RecognitionWord, SpeechTranscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Start,
    Finish,
}

#[derive(Debug, Clone, Copy)]
pub struct TimelineEntry {
    pub stage: PipelineStage,
    pub mark: Mark,
    pub at: Duration,
}

/// Ordered record of stage starts and finishes
#[derive(Debug)]
pub struct Timeline {
    origin: Instant,
    entries: Mutex<Vec<TimelineEntry>>,
}

impl Timeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn record(&self, stage: PipelineStage, mark: Mark) {
        self.entries.lock().push(TimelineEntry {
            stage,
            mark,
            at: self.origin.elapsed(),
        });
    }

    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.entries.lock().clone()
    }

    /// Position of a mark in the recorded order
    pub fn index_of(&self, stage: PipelineStage, mark: Mark) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .position(|e| e.stage == stage && e.mark == mark)
    }

    pub fn contains(&self, stage: PipelineStage, mark: Mark) -> bool {
        self.index_of(stage, mark).is_some()
    }
}

/// Map a command to its stage by the artifact it writes
pub fn stage_of(command: &CommandSpec) -> Option<PipelineStage> {
    let output = command.output_path.as_ref()?.to_string_lossy().to_string();
    if output.ends_with(".wav") {
        Some(PipelineStage::ExtractingAudio)
    } else if output.ends_with("_formatted.mp4") {
        Some(PipelineStage::FormattingVideo)
    } else if output.ends_with("_subtitled.mp4") {
        Some(PipelineStage::Overlaying)
    } else {
        None
    }
}

/// CommandRunner that sleeps, then writes the expected artifact or fails
#[derive(Debug)]
pub struct ScriptedRunner {
    timeline: Arc<Timeline>,
    latencies: HashMap<PipelineStage, Duration>,
    failures: HashMap<PipelineStage, i32>,
    audio_bytes: usize,
    write_partial_on_failure: bool,
    executed: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new(timeline: Arc<Timeline>) -> Self {
        Self {
            timeline,
            latencies: HashMap::new(),
            failures: HashMap::new(),
            audio_bytes: 20_000,
            write_partial_on_failure: false,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, stage: PipelineStage, latency: Duration) -> Self {
        self.latencies.insert(stage, latency);
        self
    }

    /// Make the stage exit with a non-zero status
    pub fn failing(mut self, stage: PipelineStage, code: i32) -> Self {
        self.failures.insert(stage, code);
        self
    }

    /// Size of the fake audio artifact
    pub fn with_audio_bytes(mut self, audio_bytes: usize) -> Self {
        self.audio_bytes = audio_bytes;
        self
    }

    /// Leave a truncated artifact behind when failing
    pub fn writing_partial_on_failure(mut self) -> Self {
        self.write_partial_on_failure = true;
        self
    }

    pub fn executed(&self) -> Vec<CommandSpec> {
        self.executed.lock().clone()
    }

    pub fn executed_stages(&self) -> Vec<PipelineStage> {
        self.executed().iter().filter_map(stage_of).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        self.executed.lock().push(command.clone());
        let stage = stage_of(command).expect("scripted runner only knows pipeline commands");

        self.timeline.record(stage, Mark::Start);
        if let Some(latency) = self.latencies.get(&stage) {
            tokio::time::sleep(*latency).await;
        }
        self.timeline.record(stage, Mark::Finish);

        let output_path = command.output_path.as_ref().expect("pipeline commands declare an output");

        if let Some(code) = self.failures.get(&stage) {
            if self.write_partial_on_failure {
                std::fs::write(output_path, b"trunc").expect("write partial artifact");
            }
            return Err(ExecutionError::NonZeroExit {
                program: command.program.clone(),
                code: *code,
                stderr: format!("{}: scripted failure", stage),
            });
        }

        let content = match stage {
            PipelineStage::ExtractingAudio => vec![0u8; self.audio_bytes],
            _ => b"video".to_vec(),
        };
        std::fs::write(output_path, content).expect("write artifact");

        Ok(CommandOutput::default())
    }
}

/// SpeechTranscriber returning fixed words after a delay
#[derive(Debug)]
pub struct ScriptedTranscriber {
    timeline: Arc<Timeline>,
    words: Vec<RecognitionWord>,
    latency: Duration,
    fail: bool,
}

impl ScriptedTranscriber {
    pub fn new(timeline: Arc<Timeline>, words: Vec<RecognitionWord>) -> Self {
        Self {
            timeline,
            words,
            latency: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl SpeechTranscriber for ScriptedTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RecognitionWord>, TranscriptionError> {
        assert!(audio_path.exists(), "transcription must start after extraction wrote {:?}", audio_path);

        self.timeline.record(PipelineStage::Transcribing, Mark::Start);
        tokio::time::sleep(self.latency).await;
        self.timeline.record(PipelineStage::Transcribing, Mark::Finish);

        if self.fail {
            return Err(TranscriptionError::ConnectionClosed);
        }
        Ok(self.words.clone())
    }
}

/// Observer that keeps every stage event
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StageEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &StageEvent) {
        self.events.lock().push(event.clone());
    }
}
