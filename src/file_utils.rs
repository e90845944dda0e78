use anyhow::{Result, Context, anyhow};
use std::fs;
use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;
use log::debug;

use crate::executor::CommandRunner;
use crate::media_commands::MediaCommands;
use crate::subtitle_processor::SubtitleCollection;

// @module: File and directory utilities

// @const: SRT record pattern (sequence number followed by a time range)
static SRT_RECORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\s*\r?\n\d{2}:\d{2}:\d{2},\d{3}\s+-->\s+\d{2}:\d{2}:\d{2},\d{3}").unwrap()
});

// @const: Common video container extensions handled by ffmpeg
const VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
    "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

// @const: Audio extensions accepted by the transcribe-only path
const AUDIO_EXTENSIONS: [&str; 6] = ["wav", "flac", "mp3", "ogg", "m4a", "aac"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Classify a file as video, audio or subtitle.
    ///
    /// Extension first, then ffprobe's stream list, then the SRT pattern.
    /// The probe goes through `runner`, so it is bound by the runner's deadline.
    pub async fn detect_file_type<P: AsRef<Path>>(
        path: P,
        runner: &dyn CommandRunner,
        commands: &MediaCommands,
    ) -> Result<FileType> {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(anyhow!("File does not exist: {:?}", path));
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();

            if ext_str == "srt" {
                return Ok(FileType::Subtitle);
            }
            if VIDEO_EXTENSIONS.contains(&ext_str.as_str()) {
                return Ok(FileType::Video);
            }
            if AUDIO_EXTENSIONS.contains(&ext_str.as_str()) {
                return Ok(FileType::Audio);
            }
        }

        if let Some(file_type) = Self::probe_stream_types(path, runner, commands).await {
            return Ok(file_type);
        }

        // Fall back to examining file contents
        if let Ok(content) = tokio::fs::read_to_string(path).await {
            if content.contains("-->")
                && SRT_RECORD_REGEX.is_match(&content)
                && SubtitleCollection::parse_srt_string(&content).is_ok()
            {
                return Ok(FileType::Subtitle);
            }
        }

        Ok(FileType::Unknown)
    }

    /// Ask ffprobe which stream types the file has
    async fn probe_stream_types(path: &Path, runner: &dyn CommandRunner, commands: &MediaCommands) -> Option<FileType> {
        let output = match runner.execute(&commands.probe_streams(path)).await {
            Ok(output) => output,
            Err(e) => {
                debug!("Could not probe {:?}: {}", path, e);
                return None;
            }
        };

        let streams = output.stdout.to_lowercase();
        let has = |kind: &str| streams.lines().any(|line| line.trim() == kind);

        if has("video") {
            Some(FileType::Video)
        } else if has("audio") {
            Some(FileType::Audio)
        } else {
            None
        }
    }
}

/// Enum representing different file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Video file supported by ffmpeg
    Video,
    /// Audio-only file
    Audio,
    /// Subtitle file (SRT)
    Subtitle,
    /// Unknown file type
    Unknown,
}
