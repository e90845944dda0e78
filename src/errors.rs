/*!
 * Error types for the vidsub application.
 *
 * This module contains custom error types for the different stages of a
 * subtitling job, using the thiserror crate for ergonomic error definitions.
 * Only `PipelineError` ever reaches the caller of a job; the stage errors are
 * wrapped into it.
 */

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Errors raised while running an external transform tool
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The process could not be started (tool missing, permission denied)
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited with a non-zero status
    #[error("`{program}` exited with status {code}: {stderr}")]
    NonZeroExit {
        /// Program that was invoked
        program: String,
        /// Exit code reported by the OS
        code: i32,
        /// Captured (filtered) stderr
        stderr: String,
    },

    /// The process was terminated without an exit code (e.g. by a signal)
    #[error("`{program}` terminated abnormally: {stderr}")]
    Terminated {
        /// Program that was invoked
        program: String,
        /// Captured (filtered) stderr
        stderr: String,
    },

    /// The process did not finish before its deadline and was killed
    #[error("`{program}` timed out after {timeout:?}")]
    Timeout {
        /// Program that was invoked
        program: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },
}

impl ExecutionError {
    /// Captured stderr, when the process got far enough to produce any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } | Self::Terminated { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Errors that abort a transcription session
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// The audio source could not be opened or read
    #[error("Failed to read audio source {path:?}: {source}")]
    AudioSource {
        /// Audio file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The connection to the recognition service could not be established
    #[error("Failed to connect to recognition service at {url}: {message}")]
    Connect {
        /// Service URL
        url: String,
        /// Error reported by the WebSocket layer
        message: String,
    },

    /// The connection attempt did not complete in time
    #[error("Connecting to recognition service at {url} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Service URL
        url: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Writing a frame to the connection failed
    #[error("Failed to send frame to recognition service: {0}")]
    Send(String),

    /// Reading a frame from the connection failed
    #[error("Failed to receive frame from recognition service: {0}")]
    Receive(String),

    /// No frame arrived before the read deadline
    #[error("Recognition service did not answer within {0:?}")]
    ReadTimeout(Duration),

    /// The service closed the connection before the end-of-stream exchange
    #[error("Recognition service closed the connection mid-stream")]
    ConnectionClosed,
}

/// A fragment that could not be turned into a recognition result.
///
/// Recoverable: the session logs it, resets its buffer and continues.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed recognition message ({reason}): {fragment}")]
pub struct MalformedMessage {
    /// What was wrong with the fragment
    pub reason: String,
    /// Leading part of the offending text, for diagnosis
    pub fragment: String,
}

impl MalformedMessage {
    const PREVIEW_CHARS: usize = 120;

    /// Build a malformed-message record, keeping only a short preview of the text
    pub fn new(reason: impl Into<String>, text: &str) -> Self {
        let fragment = if text.chars().count() > Self::PREVIEW_CHARS {
            let preview: String = text.chars().take(Self::PREVIEW_CHARS).collect();
            format!("{}...", preview)
        } else {
            text.to_string()
        };

        Self {
            reason: reason.into(),
            fragment,
        }
    }
}

/// Job-level failure: the single error a pipeline run reports
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input video does not exist
    #[error("Input video not found: {0:?}")]
    MissingInput(PathBuf),

    /// An external transform failed
    #[error("{stage} failed: {source}")]
    Execution {
        /// Stage that invoked the tool
        stage: PipelineStage,
        /// Tool failure
        #[source]
        source: ExecutionError,
    },

    /// The transcription session failed
    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    /// The subtitle artifact could not be written
    #[error("Failed to write subtitle file {path:?}: {source}")]
    SubtitleWrite {
        /// Subtitle path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The whole job exceeded its deadline
    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    /// Stage the failure belongs to, when it is tied to one
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Execution { stage, .. } => Some(*stage),
            Self::Transcription(_) | Self::SubtitleWrite { .. } => Some(PipelineStage::Transcribing),
            Self::MissingInput(_) | Self::Timeout(_) => None,
        }
    }
}
