//! Pipeline executor for queued items
//!
//! Every item runs the same stage chain, strictly in order:
//! 1. Fetch - download the audio stream to `<output>.tmp`
//! 2. Convert - transcode the temp file to the final audio file
//! 3. Tag - write manifest metadata (only for items that carry a record)
//! 4. Cleanup - best-effort removal of leftover temp files
//!
//! A failing stage ends that item's chain (cleanup still runs) and is recorded in
//! its [`PipelineResult`]; it never affects other items.

use crate::config::ExecutionConfig;
use crate::error::Error;
use crate::resolver::StreamResolver;
use crate::tagging::TagWriter;
use crate::transcoder::Transcoder;
use crate::types::{Event, ItemDescriptor, PipelineResult, Stage, WorkQueue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;
use tracing::{info, warn};

mod cleanup;
mod convert;
mod fetch;
mod tag;
mod worker_pool;

use cleanup::run_cleanup_stage;
use convert::run_convert_stage;
use fetch::run_fetch_stage;
use tag::run_tag_stage;

/// Pipeline executor
///
/// Cheap to clone; clones share the collaborators and the event channel.
#[derive(Clone)]
pub struct PipelineExecutor {
    /// Event channel for emitting pipeline events
    event_tx: broadcast::Sender<Event>,
    /// Fetches raw audio streams
    resolver: Arc<dyn StreamResolver>,
    /// Converts fetched streams to the output format
    transcoder: Arc<dyn Transcoder>,
    /// Writes metadata tags
    tagger: Arc<dyn TagWriter>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(
        event_tx: broadcast::Sender<Event>,
        resolver: Arc<dyn StreamResolver>,
        transcoder: Arc<dyn Transcoder>,
        tagger: Arc<dyn TagWriter>,
    ) -> Self {
        Self {
            event_tx,
            resolver,
            transcoder,
            tagger,
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run every queued item and return one result per item, in queue order
    ///
    /// Sequential mode runs a single worker, so items are processed one at a
    /// time in queue order. Concurrent mode runs
    /// [`effective_workers`](ExecutionConfig::effective_workers) workers; results
    /// are still returned in queue order.
    pub async fn execute(&self, queue: WorkQueue, execution: &ExecutionConfig) -> Vec<PipelineResult> {
        let workers = execution.effective_workers(queue.len());
        info!(items = queue.len(), workers, mode = ?execution.mode, "executing work queue");

        for item in &queue {
            self.event_tx
                .send(Event::Queued {
                    id: item.id,
                    title: item.display_title.clone(),
                })
                .ok();
        }

        let results = worker_pool::run(self, queue.into_items(), workers).await;

        let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
        let failed = results.len() - succeeded;
        info!(succeeded, failed, "work queue finished");
        self.event_tx
            .send(Event::RunComplete { succeeded, failed })
            .ok();

        results
    }

    /// Run the full stage chain for one item
    pub async fn process_item(&self, item: ItemDescriptor) -> PipelineResult {
        self.process_item_tracked(item, &StageCell::default()).await
    }

    /// Run the stage chain, recording the current stage in `stage`
    pub(crate) async fn process_item_tracked(
        &self,
        item: ItemDescriptor,
        stage: &StageCell,
    ) -> PipelineResult {
        let temp_path = item.temp_path();
        info!(item = %item.id, title = %item.display_title, "processing item");

        let outcome = self.run_stages(&item, &temp_path, stage).await;

        stage.set(Stage::Cleanup);
        run_cleanup_stage(item.id, &temp_path, &self.event_tx).await;

        match outcome {
            Ok(path) => {
                info!(item = %item.id, ?path, "item complete");
                self.event_tx
                    .send(Event::Completed {
                        id: item.id,
                        path: path.clone(),
                    })
                    .ok();
                PipelineResult::success(item, path)
            }
            Err((failed_stage, error)) => {
                warn!(item = %item.id, stage = %failed_stage, error = %error, "item failed");
                self.event_tx
                    .send(Event::Failed {
                        id: item.id,
                        stage: failed_stage,
                        error: error.to_string(),
                    })
                    .ok();
                PipelineResult::failed(item, failed_stage, error)
            }
        }
    }

    async fn run_stages(
        &self,
        item: &ItemDescriptor,
        temp_path: &Path,
        stage: &StageCell,
    ) -> std::result::Result<PathBuf, (Stage, Error)> {
        stage.set(Stage::Fetch);
        let fetched = run_fetch_stage(item, temp_path, &self.event_tx, &self.resolver)
            .await
            .map_err(|e| (Stage::Fetch, e))?;

        stage.set(Stage::Convert);
        let audio_path = run_convert_stage(item, &fetched, &self.event_tx, &self.transcoder)
            .await
            .map_err(|e| (Stage::Convert, e))?;

        if let Some(metadata) = &item.metadata {
            stage.set(Stage::Tag);
            run_tag_stage(item, &audio_path, metadata, &self.event_tx, &self.tagger)
                .await
                .map_err(|e| (Stage::Tag, e))?;
        }

        Ok(audio_path)
    }
}

/// Last stage an item entered, readable after its task has panicked
#[derive(Clone, Debug, Default)]
pub(crate) struct StageCell(Arc<AtomicU8>);

impl StageCell {
    fn set(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> Stage {
        match self.0.load(Ordering::Acquire) {
            x if x == Stage::Convert as u8 => Stage::Convert,
            x if x == Stage::Tag as u8 => Stage::Tag,
            x if x == Stage::Cleanup as u8 => Stage::Cleanup,
            _ => Stage::Fetch,
        }
    }
}
