/*!
 * Tests for external process execution
 */

#![cfg(unix)]

use anyhow::Result;
use std::time::{Duration, Instant};
use vidsub::errors::ExecutionError;
use vidsub::executor::{CommandRunner, CommandSpec, ProcessExecutor};
use crate::common;

#[tokio::test]
async fn test_execute_withDeclaredOutput_shouldLeaveArtifact() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let artifact = temp_dir.path().join("out.wav");
    let spec = CommandSpec::new("sh")
        .args(["-c", "echo data > \"$0\""])
        .output(&artifact);

    ProcessExecutor::default().execute(&spec).await?;

    assert_eq!(std::fs::read_to_string(&artifact)?.trim(), "data");
    Ok(())
}

#[tokio::test]
async fn test_execute_withSignalTermination_shouldReportTerminated() {
    let spec = CommandSpec::new("sh").args(["-c", "echo dying >&2; kill -9 $$"]);

    let error = ProcessExecutor::default().execute(&spec).await.unwrap_err();

    match error {
        ExecutionError::Terminated { stderr, .. } => assert!(stderr.contains("dying")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_whenDropped_shouldNotWaitForProcess() {
    let executor = ProcessExecutor::default();
    let spec = CommandSpec::new("sleep").arg("5");
    let start = Instant::now();

    let result = tokio::time::timeout(Duration::from_millis(100), executor.execute(&spec)).await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_execute_withTimeout_shouldNameProgram() {
    let executor = ProcessExecutor::new(Some(Duration::from_millis(50)));
    let spec = CommandSpec::new("sleep").arg("2");

    let error = executor.execute(&spec).await.unwrap_err();

    assert!(error.to_string().contains("`sleep` timed out"));
    assert!(error.stderr().is_none());
}
