//! Phase 1 (P0): interrupted writes to the progress log and segment files.

use tempfile::TempDir;
use vodgrab_core::download::{ProgressLog, segment_path};

#[tokio::test]
async fn p0_torn_progress_log_keeps_only_backed_entries() {
    let temp = TempDir::new().expect("temp dir");
    let output = temp.path().join("Show").join("Episode 01.mp4");
    let log = ProgressLog::open(&output).await.expect("open log");

    for index in [0, 1, 3] {
        std::fs::write(segment_path(log.dir(), index), b"segment").expect("write segment");
    }
    // 2 was logged but its file never reached disk; the last line was torn mid-write
    std::fs::write(log.log_path(), "0\n1\n2\n3\n1x").expect("write log");

    let completed: Vec<usize> = log.load().await.into_iter().collect();
    assert_eq!(completed, vec![0, 1, 3]);
}

#[tokio::test]
async fn p0_zero_length_segment_is_not_resumed() {
    let temp = TempDir::new().expect("temp dir");
    let output = temp.path().join("Episode.mp4");
    let log = ProgressLog::open(&output).await.expect("open log");

    std::fs::write(segment_path(log.dir(), 0), b"").expect("write empty segment");
    log.record(0).await.expect("record");

    assert!(log.load().await.is_empty());
}

#[tokio::test]
async fn p0_reopening_log_preserves_earlier_records() {
    let temp = TempDir::new().expect("temp dir");
    let output = temp.path().join("Episode.mp4");
    {
        let log = ProgressLog::open(&output).await.expect("open log");
        std::fs::write(log.segment_path(4), b"data").expect("write segment");
        log.record(4).await.expect("record");
    }

    let reopened = ProgressLog::open(&output).await.expect("reopen log");
    assert!(reopened.load().await.contains(&4));
}
