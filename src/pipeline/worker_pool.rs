//! Bounded worker pool
//!
//! Workers pull `(index, item)` pairs from a shared channel and send each result
//! back tagged with its index. The collector stores it in slot `index`, so
//! results come out in queue order however the workers interleave.

use super::cleanup::run_cleanup_stage;
use super::{PipelineExecutor, StageCell};
use crate::error::Error;
use crate::types::{Event, ItemDescriptor, PipelineResult, Stage};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Process `items` with `workers` concurrent workers
///
/// Returns exactly one result per item, in the order of `items`.
pub(super) async fn run(
    executor: &PipelineExecutor,
    items: Vec<ItemDescriptor>,
    workers: usize,
) -> Vec<PipelineResult> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }

    let (work_tx, work_rx) = mpsc::channel::<(usize, ItemDescriptor)>(len);
    let (result_tx, mut result_rx) = mpsc::channel::<(usize, PipelineResult)>(len);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let mut slots: Vec<Option<PipelineResult>> = Vec::with_capacity(len);
    slots.resize_with(len, || None);
    let originals = items.clone();

    for (index, item) in items.into_iter().enumerate() {
        // Capacity equals the item count, so this never waits
        if work_tx.send((index, item)).await.is_err() {
            break;
        }
    }
    drop(work_tx);

    let mut join_set = JoinSet::new();
    for worker in 0..workers.max(1) {
        let executor = executor.clone();
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        join_set.spawn(worker_loop(worker, executor, work_rx, result_tx));
    }
    drop(result_tx);

    while let Some((index, result)) = result_rx.recv().await {
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(result),
            Some(_) => warn!(index, "duplicate result for queue slot, keeping the first"),
            None => warn!(index, "result for unknown queue slot"),
        }
    }

    while let Some(joined) = join_set.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "pipeline worker terminated abnormally");
        }
    }

    slots
        .into_iter()
        .zip(originals)
        .map(|(slot, item)| {
            slot.unwrap_or_else(|| {
                PipelineResult::failed(
                    item,
                    Stage::Fetch,
                    Error::Other("item was never processed".to_string()),
                )
            })
        })
        .collect()
}

async fn worker_loop(
    worker: usize,
    executor: PipelineExecutor,
    work_rx: Arc<Mutex<mpsc::Receiver<(usize, ItemDescriptor)>>>,
    result_tx: mpsc::Sender<(usize, PipelineResult)>,
) {
    debug!(worker, "pipeline worker started");

    loop {
        let next = {
            let mut rx = work_rx.lock().await;
            rx.recv().await
        };
        let Some((index, item)) = next else {
            break;
        };

        let stage = StageCell::default();
        let fallback = item.clone();
        let task = {
            let executor = executor.clone();
            let stage = stage.clone();
            tokio::spawn(async move { executor.process_item_tracked(item, &stage).await })
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                let failed_stage = stage.get();
                error!(
                    worker,
                    item = %fallback.id,
                    stage = %failed_stage,
                    error = %e,
                    "pipeline task panicked"
                );
                run_cleanup_stage(fallback.id, &fallback.temp_path(), &executor.event_tx).await;
                let error = Error::Other(format!("pipeline task panicked: {}", e));
                executor
                    .event_tx
                    .send(Event::Failed {
                        id: fallback.id,
                        stage: failed_stage,
                        error: error.to_string(),
                    })
                    .ok();
                PipelineResult::failed(fallback, failed_stage, error)
            }
        };

        if result_tx.send((index, result)).await.is_err() {
            break;
        }
    }

    debug!(worker, "pipeline worker finished");
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::resolver::{PlaylistListing, StreamResolver};
    use crate::tagging::TagWriter;
    use crate::transcoder::Transcoder;
    use crate::types::{ItemId, MetadataRecord};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Fetch sleeps longer for earlier items so completion order is reversed
    struct SlowResolver {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl StreamResolver for SlowResolver {
        async fn resolve_title(&self, reference: &str) -> Result<String, ResolutionError> {
            Ok(reference.to_string())
        }

        async fn fetch_audio_only(&self, reference: &str, dest: &Path) -> Result<PathBuf, ResolutionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay: u64 = reference.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if reference == "panic" {
                tokio::fs::write(dest, b"half a stream").await.unwrap();
                panic!("resolver blew up");
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tokio::fs::write(dest, b"raw").await.unwrap();
            Ok(dest.to_path_buf())
        }

        async fn resolve_playlist_members(&self, reference: &str) -> Result<PlaylistListing, ResolutionError> {
            Ok(PlaylistListing {
                title: reference.to_string(),
                members: vec![],
            })
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    struct RenameTranscoder;

    #[async_trait]
    impl Transcoder for RenameTranscoder {
        async fn convert(&self, src: &Path, dest: &Path) -> crate::Result<PathBuf> {
            tokio::fs::rename(src, dest).await?;
            Ok(dest.to_path_buf())
        }

        fn name(&self) -> &'static str {
            "rename"
        }
    }

    struct NoopTagger;

    #[async_trait]
    impl TagWriter for NoopTagger {
        async fn write_tags(&self, path: &Path, _metadata: &MetadataRecord) -> crate::Result<PathBuf> {
            Ok(path.to_path_buf())
        }

        fn name(&self) -> &'static str {
            "noop"
        }
    }

    fn setup() -> (PipelineExecutor, Arc<SlowResolver>) {
        let resolver = Arc::new(SlowResolver {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (event_tx, _) = broadcast::channel(256);
        let executor = PipelineExecutor::new(
            event_tx,
            resolver.clone(),
            Arc::new(RenameTranscoder),
            Arc::new(NoopTagger),
        );
        (executor, resolver)
    }

    fn items(dir: &Path, delays: &[&str]) -> Vec<ItemDescriptor> {
        delays
            .iter()
            .enumerate()
            .map(|(index, delay)| ItemDescriptor {
                id: ItemId(index),
                remote_id: delay.to_string(),
                display_title: format!("item {}", index),
                output_path: dir.join(format!("item {}.mp3", index)),
                metadata: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_results_keep_queue_order() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (executor, _) = setup();

        let results = run(&executor, items(temp_dir.path(), &["60", "30", "0"]), 3).await;

        let ids: Vec<_> = results.iter().map(|r| r.item.id).collect();
        assert_eq!(ids, vec![ItemId(0), ItemId(1), ItemId(2)]);
        assert!(results.iter().all(|r| r.outcome.is_success()));
    }

    #[tokio::test]
    async fn test_pool_size_bounds_concurrency() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (executor, resolver) = setup();

        let results = run(
            &executor,
            items(temp_dir.path(), &["20", "20", "20", "20", "20", "20"]),
            2,
        )
        .await;

        assert_eq!(results.len(), 6);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_worker_is_sequential() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (executor, resolver) = setup();

        run(&executor, items(temp_dir.path(), &["10", "10", "10"]), 1).await;

        assert_eq!(resolver.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_item_becomes_failed_result() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let (executor, _) = setup();

        let queued = items(temp_dir.path(), &["0", "panic", "0"]);
        let panicking_temp = queued[1].temp_path();
        let mut events = executor.subscribe();

        let results = run(&executor, queued, 2).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.is_success());
        assert_eq!(results[1].outcome.failed_stage(), Some(Stage::Fetch));
        assert!(results[2].outcome.is_success());
        // Partial download from the panicking fetch is removed
        assert!(!panicking_temp.exists());

        let mut failed_ids = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::Failed { id, .. } = event {
                failed_ids.push(id);
            }
        }
        assert_eq!(failed_ids, vec![ItemId(1)]);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let (executor, _) = setup();
        assert!(run(&executor, Vec::new(), 4).await.is_empty());
    }
}
