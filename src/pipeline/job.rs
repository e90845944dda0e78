use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// @module: Per-request job state and artifact paths

// @const: Suffix of the reframed video artifact
const FORMATTED_SUFFIX: &str = "_formatted";

// @const: Suffix of the final output artifact
const SUBTITLED_SUFFIX: &str = "_subtitled";

// @struct: One pipeline run and the artifacts it produces
//
// Each artifact path is written by exactly one stage:
// audio by extraction, formatted video by formatting, subtitles by
// transcription and the output by the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    // @field: Job identifier used in log lines
    pub id: Uuid,

    // @field: Source video (owned by the caller, never written)
    pub input_video: PathBuf,

    // @field: Mono PCM audio extracted from the input
    pub audio_path: PathBuf,

    // @field: Portrait-reframed video
    pub formatted_video_path: PathBuf,

    // @field: Subtitle file built from the transcription
    pub subtitle_path: PathBuf,

    // @field: Final subtitled video
    pub output_path: PathBuf,
}

impl PipelineJob {
    /// Derive the job's artifact paths from the input video.
    ///
    /// Artifacts go to `output_dir`, or next to the input when it is `None`.
    pub fn new(input_video: impl Into<PathBuf>, output_dir: Option<&Path>) -> Self {
        let input_video = input_video.into();
        let stem = input_video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "video".to_string());

        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input_video
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        Self {
            id: Uuid::new_v4(),
            audio_path: dir.join(format!("{}.wav", stem)),
            formatted_video_path: dir.join(format!("{}{}.mp4", stem, FORMATTED_SUFFIX)),
            subtitle_path: dir.join(format!("{}.srt", stem)),
            output_path: dir.join(format!("{}{}.mp4", stem, SUBTITLED_SUFFIX)),
            input_video,
        }
    }

    /// Short form of the job id for log prefixes
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// Artifacts written by the job, in production order
    pub fn artifacts(&self) -> [&Path; 4] {
        [
            &self.audio_path,
            &self.formatted_video_path,
            &self.subtitle_path,
            &self.output_path,
        ]
    }
}

impl fmt::Display for PipelineJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} ({})", self.short_id(), self.input_video.display())
    }
}
