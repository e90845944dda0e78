use log::warn;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;

use crate::errors::MalformedMessage;

// @module: Recognition result wire types and word extraction

// @const: Tokens the recognizer emits for silence, hesitation or bare articles
pub const FILLER_WORDS: [&str; 6] = ["the", "uh", "um", "a", "an", "yeah"];

static FILLER_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| FILLER_WORDS.into_iter().collect());

// @struct: One recognized word with its time span (seconds from stream start)
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionWord {
    // @field: Lower-cased word text
    pub text: String,

    // @field: Start time in seconds (>= 0)
    pub start: f64,

    // @field: End time in seconds (>= start)
    pub end: f64,

    // @field: Last surviving word of its recognition result
    pub ends_result: bool,
}

impl RecognitionWord {
    /// Create a word, rejecting empty text and invalid time spans
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Option<Self> {
        let text = text.into();
        let valid_times = start.is_finite() && end.is_finite() && start >= 0.0 && end >= start;
        if text.trim().is_empty() || !valid_times {
            return None;
        }

        Some(Self { text, start, end, ends_result: false })
    }

    /// Mark this word as closing its recognition result
    pub fn ending_result(mut self) -> Self {
        self.ends_result = true;
        self
    }

    /// Duration of the word in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One timed word as sent by the service
#[derive(Debug, Clone, Deserialize)]
pub struct TimedWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    /// Confidence, when the service reports it
    #[serde(default)]
    pub conf: Option<f64>,
}

/// One recognition-result message. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognitionResult {
    /// Timed words; absent when nothing was confidently recognized
    #[serde(default)]
    pub result: Option<Vec<TimedWord>>,

    /// Final text of the interval
    #[serde(default)]
    pub text: Option<String>,

    /// Partial hypothesis, sent while an utterance is still open
    #[serde(default)]
    pub partial: Option<String>,
}

impl RecognitionResult {
    /// Parse one complete JSON object
    pub fn parse(json: &str) -> Result<Self, MalformedMessage> {
        serde_json::from_str(json).map_err(|e| MalformedMessage::new(e.to_string(), json))
    }

    /// Words of this result that survive filler filtering, in arrival order.
    ///
    /// Words are lower-cased; filler words and words with invalid timing are
    /// dropped. The last surviving word is marked with `ends_result`.
    pub fn words(&self) -> Vec<RecognitionWord> {
        let Some(timed_words) = &self.result else {
            return Vec::new();
        };

        let mut words: Vec<RecognitionWord> = timed_words
            .iter()
            .filter_map(|timed| {
                let text = timed.word.trim().to_lowercase();
                if is_filler_word(&text) {
                    return None;
                }

                let word = RecognitionWord::new(text, timed.start, timed.end);
                if word.is_none() {
                    warn!(
                        "Dropping word {:?} with invalid timing {}..{}",
                        timed.word, timed.start, timed.end
                    );
                }
                word
            })
            .collect();

        if let Some(last) = words.pop() {
            words.push(last.ending_result());
        }
        words
    }
}

/// True for tokens in the filler stop-set (case-insensitive)
pub fn is_filler_word(word: &str) -> bool {
    FILLER_SET.contains(word.trim().to_lowercase().as_str())
}
