use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::subtitle_processor::{CueGranularity, DEFAULT_MAX_PHRASE_CHARS};

/// Application configuration module
/// This module handles the application configuration including defaults and
/// validation. Every section may be omitted from conf.json.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Speech recognition service settings
    #[serde(default)]
    pub recognition: RecognitionConfig,

    /// External media tool settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Subtitle generation settings
    #[serde(default)]
    pub subtitles: SubtitleConfig,

    /// Directory for job artifacts; defaults to the input's directory
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Deadline for a whole job in seconds; unlimited when absent
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Recognition service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognitionConfig {
    // @field: WebSocket URL of the recognizer
    #[serde(default = "default_server_url")]
    pub server_url: String,

    // @field: Audio bytes per binary frame
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    // @field: Connect deadline in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    // @field: Per-response read deadline in seconds
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl RecognitionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            chunk_size: default_chunk_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

/// Media tool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaConfig {
    /// ffmpeg binary name or path
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe binary name or path, used to identify input files
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Per-process deadline in seconds
    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,

    /// Sample rate of the extracted mono audio
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate: u32,

    /// Portrait canvas width
    #[serde(default = "default_target_width")]
    pub target_width: u32,

    /// Portrait canvas height
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    /// Scale factor applied to the centered foreground copy
    #[serde(default = "default_source_scale")]
    pub source_scale: f64,

    /// Box blur radius of the background copy
    #[serde(default = "default_blur_radius")]
    pub blur_radius: u32,

    /// Box blur power of the background copy
    #[serde(default = "default_blur_power")]
    pub blur_power: f64,
}

impl MediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_media_timeout_secs(),
            audio_sample_rate: default_audio_sample_rate(),
            target_width: default_target_width(),
            target_height: default_target_height(),
            source_scale: default_source_scale(),
            blur_radius: default_blur_radius(),
            blur_power: default_blur_power(),
        }
    }
}

/// Configuration for subtitle generation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubtitleConfig {
    /// One cue per word or per phrase
    #[serde(default)]
    pub granularity: CueGranularity,

    /// Phrase length that closes a cue without punctuation
    #[serde(default = "default_max_phrase_chars")]
    pub max_phrase_chars: usize,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            granularity: CueGranularity::default(),
            max_phrase_chars: default_max_phrase_chars(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

// Largest accepted audio frame
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

fn default_server_url() -> String {
    "ws://localhost:2700".to_string()
}

fn default_chunk_size() -> usize {
    8000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_media_timeout_secs() -> u64 {
    1800
}

fn default_audio_sample_rate() -> u32 {
    8000
}

fn default_target_width() -> u32 {
    1080
}

fn default_target_height() -> u32 {
    1920
}

fn default_source_scale() -> f64 {
    1.83
}

fn default_blur_radius() -> u32 {
    20
}

fn default_blur_power() -> f64 {
    1.5
}

fn default_max_phrase_chars() -> usize {
    DEFAULT_MAX_PHRASE_CHARS
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.recognition.validate()?;
        self.media.validate()?;

        if self.subtitles.max_phrase_chars == 0 {
            return Err(anyhow!("subtitles.max_phrase_chars must be greater than zero"));
        }

        if self.job_timeout_secs == Some(0) {
            return Err(anyhow!("job_timeout_secs must be greater than zero when set"));
        }

        Ok(())
    }

    /// Deadline for a whole job, if one is configured
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

impl RecognitionConfig {
    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| anyhow!("Invalid recognition server URL '{}': {}", self.server_url, e))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(anyhow!(
                "Recognition server URL must use ws:// or wss://, got '{}'",
                self.server_url
            ));
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(anyhow!(
                "recognition.chunk_size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            ));
        }

        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(anyhow!("Recognition timeouts must be greater than zero"));
        }

        Ok(())
    }
}

impl MediaConfig {
    fn validate(&self) -> Result<()> {
        if self.ffmpeg_path.trim().is_empty() {
            return Err(anyhow!("media.ffmpeg_path must not be empty"));
        }

        if self.ffprobe_path.trim().is_empty() {
            return Err(anyhow!("media.ffprobe_path must not be empty"));
        }

        if self.timeout_secs == 0 {
            return Err(anyhow!("media.timeout_secs must be greater than zero"));
        }

        if self.audio_sample_rate == 0 {
            return Err(anyhow!("media.audio_sample_rate must be greater than zero"));
        }

        // yuv420p output needs even dimensions
        for (name, value) in [("target_width", self.target_width), ("target_height", self.target_height)] {
            if value == 0 || value % 2 != 0 {
                return Err(anyhow!("media.{} must be a positive even number, got {}", name, value));
            }
        }

        if !(self.source_scale.is_finite() && self.source_scale > 0.0) {
            return Err(anyhow!("media.source_scale must be positive, got {}", self.source_scale));
        }

        if !(self.blur_power.is_finite() && self.blur_power > 0.0) {
            return Err(anyhow!("media.blur_power must be positive, got {}", self.blur_power));
        }

        Ok(())
    }
}
