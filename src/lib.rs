/*!
 * # vidsub - speech-recognized subtitles for portrait videos
 *
 * A Rust library that turns a video into a subtitled, vertically reframed
 * video by driving ffmpeg and a streaming speech recognizer.
 *
 * ## Features
 *
 * - Extract mono PCM audio from a video
 * - Reframe the video onto a blurred 1080x1920 canvas
 * - Transcribe audio over a chunk-paced WebSocket session
 * - Filter filler words and build word- or phrase-level SRT cues
 * - Burn the subtitles into the reframed video
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `executor`: External process execution with deadlines
 * - `media_commands`: ffmpeg invocations for each transform
 * - `transcription`: Streaming speech recognition:
 *   - `transcription::json_stream`: Incremental JSON object framing
 *   - `transcription::recognition`: Recognition results and word filtering
 *   - `transcription::client`: WebSocket client and per-call session
 * - `subtitle_processor`: Cue building and SRT handling
 * - `pipeline`: Job state and the concurrent stage graph
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod executor;
pub mod file_utils;
pub mod media_commands;
pub mod pipeline;
pub mod subtitle_processor;
pub mod transcription;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{ExecutionError, MalformedMessage, PipelineError, TranscriptionError};
pub use pipeline::{PipelineJob, PipelineStage, VideoPipeline};
pub use subtitle_processor::{CueBuilder, CueGranularity, SubtitleCollection, SubtitleEntry};
pub use transcription::{SpeechTranscriber, TranscriptionClient};
