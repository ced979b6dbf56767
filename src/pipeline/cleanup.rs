//! Cleanup stage for removing leftover temp artifacts

use crate::types::{Event, ItemId};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Execute the cleanup stage
///
/// Runs after every item whatever its outcome. Errors are logged as warnings and
/// never change the item's result.
pub(crate) async fn run_cleanup_stage(
    id: ItemId,
    temp_path: &Path,
    event_tx: &broadcast::Sender<Event>,
) {
    debug!(item = %id, ?temp_path, "running cleanup stage");

    event_tx.send(Event::Cleaning { id }).ok();

    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(item = %id, ?temp_path, "deleted leftover temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(item = %id, ?temp_path, error = %e, "failed to delete temp file"),
    }
}
