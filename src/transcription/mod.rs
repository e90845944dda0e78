/*!
 * Speech transcription over a streaming recognition service.
 *
 * - `json_stream`: reassembles JSON objects from unframed text frames
 * - `recognition`: wire types, filler filtering and word extraction
 * - `client`: the chunk-paced WebSocket client and its per-call session
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

use crate::errors::TranscriptionError;

pub mod client;
pub mod json_stream;
pub mod recognition;

pub use client::{SessionStats, TranscriptionClient, TranscriptionSession};
pub use json_stream::{JsonStreamBuffer, ScannedItem};
pub use recognition::{FILLER_WORDS, RecognitionResult, RecognitionWord, is_filler_word};

/// Turns an audio file into an ordered sequence of recognized words
///
/// The pipeline depends on this trait rather than on the WebSocket client so
/// that other recognizers (or test doubles) can be plugged in.
#[async_trait]
pub trait SpeechTranscriber: Send + Sync + Debug {
    /// Transcribe the audio at `audio_path`
    ///
    /// # Returns
    /// * `Ok(words)` in arrival order, filler words already removed
    /// * `Err(TranscriptionError)` when the session could not complete
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RecognitionWord>, TranscriptionError>;
}
