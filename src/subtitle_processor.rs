use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use anyhow::{Result, Context, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use log::{warn, debug};
use crate::transcription::RecognitionWord;

// @module: Subtitle cue building and SRT serialization

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2,}):(\d{2}):(\d{2}),(\d{3})").unwrap()
});

// @const: Punctuation that closes a phrase cue
const PHRASE_TERMINATORS: [char; 5] = ['.', '?', '!', ',', ';'];

// @const: Default phrase length before a cue is closed without punctuation
pub const DEFAULT_MAX_PHRASE_CHARS: usize = 150;

// @struct: Single subtitle entry (cue)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    // @field: Sequence number (1-based)
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text
    pub text: String,
}

impl SubtitleEntry {
    /// Creates a new subtitle entry without validation
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Result<Self> {
        if end_time_ms < start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} < start time {}",
                end_time_ms, start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", seq_num));
        }

        Ok(SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: trimmed_text.to_string(),
        })
    }

    /// Parse an SRT timestamp to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        // Parse HH:MM:SS,mmm format
        let parts: Vec<&str> = timestamp.split(&[':', ','][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    ///
    /// Integer arithmetic only, so the output never depends on locale.
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Format a time in seconds, rounded to the nearest millisecond
    pub fn format_seconds(seconds: f64) -> String {
        Self::format_timestamp(seconds_to_ms(seconds))
    }
}

/// Convert seconds to whole milliseconds, rounding to nearest.
/// Negative or non-finite input maps to zero.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// How recognized words are grouped into cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CueGranularity {
    /// One cue per word
    #[default]
    Word,
    /// Words grouped into phrases bounded by punctuation or length
    Phrase,
}

impl std::str::FromStr for CueGranularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "word" => Ok(Self::Word),
            "phrase" => Ok(Self::Phrase),
            _ => Err(anyhow!("Invalid cue granularity: {}", s)),
        }
    }
}

/// Turns recognized words into sequence-numbered cues.
///
/// Sequence numbers are assigned when a cue is finalized and are never
/// reused or reordered.
#[derive(Debug)]
pub struct CueBuilder {
    granularity: CueGranularity,
    max_phrase_chars: usize,
    entries: Vec<SubtitleEntry>,
    // Open phrase: text, start and end (seconds)
    phrase: String,
    phrase_start: f64,
    phrase_end: f64,
}

impl CueBuilder {
    pub fn new(granularity: CueGranularity) -> Self {
        Self::with_max_phrase_chars(granularity, DEFAULT_MAX_PHRASE_CHARS)
    }

    pub fn with_max_phrase_chars(granularity: CueGranularity, max_phrase_chars: usize) -> Self {
        Self {
            granularity,
            max_phrase_chars: max_phrase_chars.max(1),
            entries: Vec::new(),
            phrase: String::new(),
            phrase_start: 0.0,
            phrase_end: 0.0,
        }
    }

    /// Build all cues for an ordered word sequence
    pub fn build(words: &[RecognitionWord], granularity: CueGranularity, max_phrase_chars: usize) -> Vec<SubtitleEntry> {
        let mut builder = Self::with_max_phrase_chars(granularity, max_phrase_chars);
        for word in words {
            builder.push_word(word);
        }
        builder.finish()
    }

    /// Add the next word in arrival order
    pub fn push_word(&mut self, word: &RecognitionWord) {
        match self.granularity {
            CueGranularity::Word => self.push_cue(word.start, word.end, &word.text),
            CueGranularity::Phrase => self.push_phrase_word(word),
        }
    }

    /// Cues finalized so far
    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    /// Flush any open phrase and return the ordered cues
    pub fn finish(mut self) -> Vec<SubtitleEntry> {
        self.flush_phrase();
        self.entries
    }

    fn push_phrase_word(&mut self, word: &RecognitionWord) {
        if self.phrase.is_empty() {
            self.phrase_start = word.start;
        } else {
            self.phrase.push(' ');
        }
        self.phrase.push_str(word.text.trim());
        self.phrase_end = word.end;

        let ends_clause = word.text.trim_end().ends_with(PHRASE_TERMINATORS);
        if ends_clause || word.ends_result || self.phrase.chars().count() > self.max_phrase_chars {
            self.flush_phrase();
        }
    }

    fn flush_phrase(&mut self) {
        if self.phrase.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.phrase);
        self.push_cue(self.phrase_start, self.phrase_end, &text);
    }

    fn push_cue(&mut self, start: f64, end: f64, text: &str) {
        let seq_num = self.entries.len() + 1;
        let start_ms = seconds_to_ms(start);
        let end_ms = seconds_to_ms(end).max(start_ms);

        match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.to_string()) {
            Ok(entry) => self.entries.push(entry),
            Err(e) => debug!("Skipping cue: {}", e),
        }
    }
}

/// Collection of subtitle entries with metadata
#[derive(Debug)]
pub struct SubtitleCollection {
    /// Media the subtitles were produced from
    pub source_file: PathBuf,

    /// List of subtitle entries
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    /// Create a collection from recognized words
    pub fn from_words(source_file: PathBuf, words: &[RecognitionWord], granularity: CueGranularity, max_phrase_chars: usize) -> Self {
        SubtitleCollection {
            source_file,
            entries: CueBuilder::build(words, granularity, max_phrase_chars),
        }
    }

    /// Render all entries in SRT format
    pub fn to_srt_string(&self) -> String {
        let mut srt = String::new();
        for entry in &self.entries {
            srt.push_str(&entry.to_string());
        }
        srt
    }

    /// Write subtitles to an SRT file, creating the parent directory
    pub async fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_srt_string()).await
    }

    /// Parse SRT format string into subtitle entries
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleEntry>> {
        let mut entries = Vec::new();

        // State variables for parsing
        let mut current_seq_num: Option<usize> = None;
        let mut current_times: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        let mut add_current_entry = |seq_num: usize, start_ms: u64, end_ms: u64, text: &str| {
            match SubtitleEntry::new_validated(seq_num, start_ms, end_ms, text.to_string()) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping invalid subtitle entry {}: {}", seq_num, e),
            }
        };

        for (line_index, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            // A blank line closes the current entry
            if trimmed.is_empty() {
                if let (Some(seq_num), Some((start_ms, end_ms))) = (current_seq_num, current_times) {
                    if !current_text.is_empty() {
                        add_current_entry(seq_num, start_ms, end_ms, &current_text);
                        current_seq_num = None;
                        current_times = None;
                        current_text.clear();
                    }
                }
                continue;
            }

            if current_seq_num.is_none() && current_text.is_empty() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
            }

            if current_seq_num.is_some() && current_times.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                    current_times = Some((Self::parse_timestamp_to_ms(&caps, 1), Self::parse_timestamp_to_ms(&caps, 5)));
                    continue;
                }
            }

            if current_seq_num.is_some() && current_times.is_some() {
                if !current_text.is_empty() {
                    current_text.push('\n');
                }
                current_text.push_str(trimmed);
            } else {
                warn!("Unexpected text at line {} before sequence number or timestamp: {}", line_index + 1, trimmed);
            }
        }

        // Add the last entry if there is one
        if let (Some(seq_num), Some((start_ms, end_ms))) = (current_seq_num, current_times) {
            if !current_text.is_empty() {
                add_current_entry(seq_num, start_ms, end_ms, &current_text);
            }
        }

        if entries.is_empty() {
            return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
        }

        Ok(entries)
    }

    /// Parse timestamp to milliseconds
    fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
        let field = |offset: usize| -> u64 {
            caps.get(start_idx + offset)
                .map_or(0, |m| m.as_str().parse().unwrap_or(0))
        };

        (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + field(3)
    }
}
