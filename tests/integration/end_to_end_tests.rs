/*!
 * End-to-end runs: controller, pipeline and the real WebSocket client against
 * the stub recognition service
 */

use anyhow::Result;
use std::process::Command;
use std::sync::Arc;
use vidsub::app_config::Config;
use vidsub::app_controller::Controller;
use vidsub::executor::ProcessExecutor;
use vidsub::pipeline::{PipelineConfig, PipelineJob, PipelineStage, VideoPipeline};
use vidsub::subtitle_processor::SubtitleCollection;
use vidsub::transcription::TranscriptionClient;
use crate::common::{self, result_message};
use crate::common::scripted_runner::{ScriptedRunner, Timeline};
use crate::common::stub_recognizer::{StubRecognizer, StubScript};

const EXPECTED_SRT: &str = "1\n00:00:01,000 --> 00:00:01,500\nhello\n\n2\n00:00:03,000 --> 00:00:03,600\nworld\n\n";

/// Stub that reports "hello" after the first chunk and "world" after the third,
/// with fillers mixed in
fn two_word_script() -> StubScript {
    StubScript::default()
        .reply_to_audio(0, vec![result_message(&[("uh", 0.2, 0.4), ("hello", 1.0, 1.5)])])
        .reply_to_audio(2, vec![result_message(&[("world", 3.0, 3.6), ("the", 3.6, 3.7)])])
}

fn config_for(url: &str) -> Config {
    let mut config = Config::default();
    config.recognition.server_url = url.to_string();
    config.recognition.read_timeout_secs = 5;
    config
}

#[tokio::test]
async fn test_controller_run_withStubRecognizer_shouldWriteTwoCues() -> Result<()> {
    common::init_test_logger();
    let stub = StubRecognizer::start(two_word_script()).await;
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let output_dir = temp_dir.path().join("out");

    let config = config_for(&stub.url);
    let runner = Arc::new(ScriptedRunner::new(Timeline::new()).with_audio_bytes(20_000));
    let transcriber = Arc::new(TranscriptionClient::new(config.recognition.clone()));
    let controller = Controller::with_components(config, runner.clone(), transcriber)?;

    let output = controller
        .run(input.clone(), Some(output_dir.clone()), false)
        .await?
        .expect("job should run");

    assert_eq!(output, output_dir.join("clip_subtitled.mp4"));
    assert!(output.exists());
    assert_eq!(std::fs::read_to_string(output_dir.join("clip.srt"))?, EXPECTED_SRT);
    assert_eq!(stub.audio_frame_sizes(), vec![8000, 8000, 4000]);

    // The overlay consumed the formatted video and the subtitle file
    let overlay = runner
        .executed()
        .into_iter()
        .find(|c| c.output_path.as_deref() == Some(output.as_path()))
        .unwrap();
    let args = overlay.args.join(" ");
    assert!(args.contains("clip_formatted.mp4"));
    assert!(args.contains("clip.srt"));
    assert!(args.contains("-c:a copy"));
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let stub = StubRecognizer::start(two_word_script()).await;
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let existing = common::create_test_file(temp_dir.path(), "clip_subtitled.mp4", b"old")?;

    let config = config_for(&stub.url);
    let runner = Arc::new(ScriptedRunner::new(Timeline::new()));
    let transcriber = Arc::new(TranscriptionClient::new(config.recognition.clone()));
    let controller = Controller::with_components(config, runner.clone(), transcriber)?;

    assert!(controller.run(input.clone(), None, false).await?.is_none());
    assert!(runner.executed().is_empty());
    assert_eq!(std::fs::read(&existing)?, b"old");

    let output = controller.run(input, None, true).await?;
    assert_eq!(output, Some(existing.clone()));
    assert_eq!(std::fs::read(&existing)?, b"video");
    Ok(())
}

#[tokio::test]
async fn test_controller_run_withSubtitleInput_shouldRefuse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "clip.srt", b"1\n")?;

    let config = Config::default();
    let runner = Arc::new(ScriptedRunner::new(Timeline::new()));
    let transcriber = Arc::new(TranscriptionClient::new(config.recognition.clone()));
    let controller = Controller::with_components(config, runner.clone(), transcriber)?;

    assert!(controller.run(input, None, false).await.is_err());
    assert!(runner.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_controller_transcribeOnly_shouldWriteSrtBesideAudio() -> Result<()> {
    let stub = StubRecognizer::start(two_word_script()).await;
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "speech.wav", &vec![0u8; 24_000])?;

    let config = config_for(&stub.url);
    let runner = Arc::new(ScriptedRunner::new(Timeline::new()));
    let transcriber = Arc::new(TranscriptionClient::new(config.recognition.clone()));
    let controller = Controller::with_components(config, runner, transcriber)?;

    let output = controller.transcribe_only(audio, None).await?;

    assert_eq!(output, temp_dir.path().join("speech.srt"));
    assert_eq!(std::fs::read_to_string(&output)?, EXPECTED_SRT);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_withRecognizerClosingMidStream_shouldFailWithoutOverlay() -> Result<()> {
    let script = StubScript {
        close_after_audio_frames: Some(2),
        ..two_word_script()
    };
    let stub = StubRecognizer::start(script).await;
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_video(temp_dir.path(), "clip.mp4")?;

    let config = config_for(&stub.url);
    let runner = Arc::new(ScriptedRunner::new(Timeline::new()));
    let pipeline = VideoPipeline::new(
        runner.clone(),
        Arc::new(TranscriptionClient::new(config.recognition.clone())),
        PipelineConfig::from(&config),
    );

    let job = PipelineJob::new(&input, None);
    let error = pipeline.process(&job).await.unwrap_err();

    assert_eq!(error.stage(), Some(PipelineStage::Transcribing));
    assert!(!runner.executed_stages().contains(&PipelineStage::Overlaying));
    assert!(!job.output_path.exists());
    Ok(())
}

/// Full run with the real ffmpeg binary on a synthetic 10 second clip
#[tokio::test]
#[ignore = "requires ffmpeg with libass on PATH"]
async fn test_pipeline_withRealFfmpeg_shouldProduceSubtitledVideo() -> Result<()> {
    let stub = StubRecognizer::start(two_word_script()).await;
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("synthetic.mp4");

    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "lavfi", "-i", "testsrc=duration=10:size=640x360:rate=25"])
        .args(["-f", "lavfi", "-i", "sine=frequency=440:duration=10"])
        .args(["-shortest", "-pix_fmt", "yuv420p"])
        .arg(&input)
        .status()?;
    assert!(status.success());

    let config = config_for(&stub.url);
    let pipeline = VideoPipeline::new(
        Arc::new(ProcessExecutor::new(Some(config.media.timeout()))),
        Arc::new(TranscriptionClient::new(config.recognition.clone())),
        PipelineConfig::from(&config),
    );

    let job = PipelineJob::new(&input, None);
    let output = pipeline.process(&job).await?;

    assert!(std::fs::metadata(&output)?.len() > 0);
    let cues = SubtitleCollection::parse_srt_string(&std::fs::read_to_string(&job.subtitle_path)?)?;
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].text, "hello");
    assert_eq!(cues[1].text, "world");
    Ok(())
}
