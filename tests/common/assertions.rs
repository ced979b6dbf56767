//! Custom test assertions for integration tests

use bulk_audio_dl::Event;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use walkdir::WalkDir;

/// Every file below `dir`, recursively
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Assert no `.tmp` artifact is left anywhere below `dir`
pub fn assert_no_temp_files(dir: &Path) {
    let leftovers: Vec<_> = files_under(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

/// Collect events until `RunComplete` (inclusive), the channel closes, or `timeout` passes
pub async fn collect_events_until_complete(
    mut events: broadcast::Receiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = matches!(event, Event::RunComplete { .. });
                    collected.push(event);
                    if done {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    collected
}
