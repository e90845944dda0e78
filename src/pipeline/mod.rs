/*!
 * Video subtitling pipeline.
 *
 * - `job`: per-request state and artifact naming
 * - `orchestrator`: the stage graph, stage events and `VideoPipeline`
 */

pub mod job;
pub mod orchestrator;

pub use job::PipelineJob;
pub use orchestrator::{
    NoopObserver, PipelineConfig, PipelineObserver, PipelineStage, StageEvent, VideoPipeline,
};
