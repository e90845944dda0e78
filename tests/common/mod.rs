/*!
 * Common test utilities for the vidsub test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use tempfile::TempDir;

pub mod scripted_runner;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a placeholder input video (content is never decoded by scripted runs)
pub fn create_test_video(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, b"not really a video")
}

/// Recognition result message holding the given (word, start, end) triples
pub fn result_message(words: &[(&str, f64, f64)]) -> String {
    let entries: Vec<serde_json::Value> = words
        .iter()
        .map(|(word, start, end)| {
            serde_json::json!({ "conf": 1.0, "word": word, "start": start, "end": end })
        })
        .collect();
    let text: Vec<&str> = words.iter().map(|(word, _, _)| *word).collect();

    serde_json::json!({ "result": entries, "text": text.join(" ") }).to_string()
}

/// Partial-hypothesis message sent while nothing is final yet
pub fn partial_message() -> String {
    r#"{"partial" : ""}"#.to_string()
}

/// Route log output to the test harness; safe to call from every test
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
