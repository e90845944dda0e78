use std::path::Path;

use crate::app_config::MediaConfig;
use crate::executor::CommandSpec;

// @module: ffmpeg invocations for the three media transforms

// @const: Burn-in style for the overlay stage (ASS force_style syntax)
pub const SUBTITLE_STYLE: &str = "FontName=Verdana,Fontsize=24,Bold=1,MarginV=65";

// @struct: Builds ffmpeg command lines from media settings
#[derive(Debug, Clone)]
pub struct MediaCommands {
    config: MediaConfig,
}

impl MediaCommands {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Demux the audio track to mono, fixed-rate, 16-bit PCM WAV
    pub fn extract_audio(&self, input: &Path, output: &Path) -> CommandSpec {
        self.base(input)
            .args(["-vn", "-ac", "1"])
            .arg("-ar")
            .arg(self.config.audio_sample_rate.to_string())
            .args(["-c:a", "pcm_s16le"])
            .output(output)
    }

    /// Reframe the video into the target composition: a blurred, cropped
    /// copy fills the frame and the scaled original sits centered on top.
    pub fn format_video(&self, input: &Path, output: &Path) -> CommandSpec {
        self.base(input)
            .arg("-vf")
            .arg(self.format_filter())
            .output(output)
    }

    /// Burn a subtitle file into a video
    pub fn burn_subtitles(&self, video: &Path, subtitles: &Path, output: &Path) -> CommandSpec {
        let filter = format!(
            "subtitles=filename={}:force_style={}",
            escape_filter_option(&subtitles.to_string_lossy()),
            escape_filter_option(SUBTITLE_STYLE)
        );

        self.base(video)
            .arg("-vf")
            .arg(filter)
            .args(["-c:a", "copy"])
            .output(output)
    }

    /// List the codec type of every stream, one per line
    pub fn probe_streams(&self, input: &Path) -> CommandSpec {
        CommandSpec::new(self.config.ffprobe_path.clone())
            .args(["-v", "error", "-show_entries", "stream=codec_type", "-of", "csv=p=0"])
            .arg(input.to_string_lossy())
    }

    /// Filter graph used by `format_video`
    pub fn format_filter(&self) -> String {
        let c = &self.config;
        format!(
            "split[original][copy];\
             [copy]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},\
             boxblur=luma_radius={radius}:luma_power={power}[blurred];\
             [original]scale=iw*{scale}:ih*{scale}[original_scaled];\
             [blurred][original_scaled]overlay=(main_w-overlay_w)/2:(main_h-overlay_h)/2",
            w = c.target_width,
            h = c.target_height,
            radius = c.blur_radius,
            power = c.blur_power,
            scale = c.source_scale,
        )
    }

    fn base(&self, input: &Path) -> CommandSpec {
        CommandSpec::new(self.config.ffmpeg_path.clone())
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(input.to_string_lossy())
    }
}

/// Escape a value for use as a filter option inside an ffmpeg filter graph.
///
/// Two levels apply: option values (`\`, `'`, `:`) and then the whole graph
/// description (`\`, `'`, `[`, `]`, `,`, `;`).
pub fn escape_filter_option(value: &str) -> String {
    let option_level = escape_chars(value, &['\\', '\'', ':']);
    escape_chars(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        let trimmed = stderr.trim();
        if trimmed.is_empty() {
            "no error output".to_string()
        } else {
            // Nothing survived filtering; keep the tail so the cause is not lost
            trimmed.lines().last().unwrap_or_default().to_string()
        }
    } else {
        meaningful.join("\n")
    }
}
