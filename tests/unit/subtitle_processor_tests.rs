/*!
 * Tests for cue building and SRT handling
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use vidsub::subtitle_processor::{CueBuilder, CueGranularity, SubtitleCollection, SubtitleEntry};
use vidsub::transcription::{FILLER_WORDS, RecognitionResult, RecognitionWord, TranscriptionSession};
use crate::common;

const VOCABULARY: [&str; 8] = ["alpha", "bravo", "The", "um", "charlie", "Yeah", "delta", "an"];

/// Random recognition message mixing real words and fillers
fn random_result(rng: &mut StdRng, clock: &mut f64) -> String {
    let count = rng.random_range(0..6);
    let words: Vec<(&str, f64, f64)> = (0..count)
        .map(|_| {
            let word = VOCABULARY[rng.random_range(0..VOCABULARY.len())];
            let start = *clock;
            *clock += rng.random_range(0.1..0.8);
            (word, start, *clock)
        })
        .collect();
    common::result_message(&words)
}

/// Sequence numbers are exactly 1..N and fillers never become cues
#[test]
fn test_buildCues_withRandomWordStreams_shouldNumberWithoutGapsAndDropFillers() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let mut clock = 0.0;
        let mut words: Vec<RecognitionWord> = Vec::new();
        for _ in 0..rng.random_range(1..8) {
            let message = random_result(&mut rng, &mut clock);
            words.extend(RecognitionResult::parse(&message).unwrap().words());
        }

        let cues = CueBuilder::build(&words, CueGranularity::Word, 150);

        assert_eq!(cues.len(), words.len());
        for (index, cue) in cues.iter().enumerate() {
            assert_eq!(cue.seq_num, index + 1);
            assert!(cue.end_time_ms >= cue.start_time_ms);
            assert!(!FILLER_WORDS.contains(&cue.text.as_str()), "filler {:?} became a cue", cue.text);
        }
    }
}

#[test]
fn test_buildCues_wordMode_shouldCopyTimesVerbatim() {
    let words = vec![
        RecognitionWord::new("hello", 1.0, 1.5).unwrap(),
        RecognitionWord::new("world", 3.0, 3.6).unwrap(),
    ];

    let cues = CueBuilder::build(&words, CueGranularity::Word, 150);

    assert_eq!(
        cues,
        vec![
            SubtitleEntry::new(1, 1000, 1500, "hello".to_string()),
            SubtitleEntry::new(2, 3000, 3600, "world".to_string()),
        ]
    );
}

#[test]
fn test_cueBuilder_incremental_shouldExposeFinalizedCuesOnly() {
    let mut builder = CueBuilder::new(CueGranularity::Phrase);
    builder.push_word(&RecognitionWord::new("wait", 0.0, 0.3).unwrap());
    assert!(builder.entries().is_empty());

    builder.push_word(&RecognitionWord::new("here!", 0.3, 0.7).unwrap());
    assert_eq!(builder.entries().len(), 1);

    builder.push_word(&RecognitionWord::new("then", 1.0, 1.2).unwrap());
    let cues = builder.finish();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[1].text, "then");
    assert_eq!((cues[1].start_time_ms, cues[1].end_time_ms), (1000, 1200));
}

/// An open phrase is closed when its recognition result ends
#[test]
fn test_buildCues_phraseMode_shouldNotJoinAcrossResults() {
    let mut session = TranscriptionSession::new();
    session.ingest_frame(&common::result_message(&[("see", 0.2, 0.5), ("you", 0.5, 0.7)]));
    session.ingest_frame(&common::result_message(&[("later", 2.0, 2.4), ("then", 2.4, 2.8), ("um", 2.8, 3.0)]));

    let cues = CueBuilder::build(&session.finish(), CueGranularity::Phrase, 150);

    let texts: Vec<&str> = cues.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["see you", "later then"]);
    assert_eq!((cues[1].start_time_ms, cues[1].end_time_ms), (2000, 2800));
    assert_eq!(cues[1].seq_num, 2);
}

#[test]
fn test_formatTimestamp_shouldNeverUseDotSeparator() {
    for seconds in [0.0, 0.001, 59.999, 65.25, 3599.5, 3661.999, 86_400.0] {
        let formatted = SubtitleEntry::format_seconds(seconds);
        assert!(!formatted.contains('.'), "{} rendered as {}", seconds, formatted);
        assert_eq!(formatted.len(), 12);
    }
    assert_eq!(SubtitleEntry::format_seconds(86_400.0), "24:00:00,000");
}

#[tokio::test]
async fn test_writeToSrt_shouldProduceNumberedRecords() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("clip.srt");
    let words = vec![
        RecognitionWord::new("hello", 1.0, 1.5).unwrap(),
        RecognitionWord::new("world", 3.0, 3.6).unwrap(),
    ];

    let collection = SubtitleCollection::from_words(PathBuf::from("clip.wav"), &words, CueGranularity::Word, 150);
    collection.write_to_srt(&path).await?;

    let content = std::fs::read_to_string(&path)?;
    assert_eq!(
        content,
        "1\n00:00:01,000 --> 00:00:01,500\nhello\n\n2\n00:00:03,000 --> 00:00:03,600\nworld\n\n"
    );

    let parsed = SubtitleCollection::parse_srt_string(&content)?;
    assert_eq!(parsed, collection.entries);
    Ok(())
}

#[test]
fn test_parseSrtString_withMultilineText_shouldJoinLines() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nfirst line\nsecond line\n\n2\n00:00:03,000 --> 00:00:04,000\nnext\n";
    let entries = SubtitleCollection::parse_srt_string(content)?;

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "first line\nsecond line");
    assert_eq!(entries[1].start_time_ms, 3000);
    Ok(())
}

#[test]
fn test_parseSrtString_withNoEntries_shouldFail() {
    assert!(SubtitleCollection::parse_srt_string("").is_err());
    assert!(SubtitleCollection::parse_srt_string("just text").is_err());
}
