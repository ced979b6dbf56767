//! Fetch stage: download the raw audio stream to the item's temp path

use crate::error::{Error, ResolutionError, ResolutionReason, Result};
use crate::resolver::StreamResolver;
use crate::types::{Event, ItemDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Execute the fetch stage
///
/// On failure any partial file at `temp_path` is removed before returning.
pub(crate) async fn run_fetch_stage(
    item: &ItemDescriptor,
    temp_path: &Path,
    event_tx: &broadcast::Sender<Event>,
    resolver: &Arc<dyn StreamResolver>,
) -> Result<PathBuf> {
    debug!(item = %item.id, remote_id = %item.remote_id, ?temp_path, "running fetch stage");

    event_tx.send(Event::Fetching { id: item.id }).ok();

    let fetched = match resolver.fetch_audio_only(&item.remote_id, temp_path).await {
        Ok(path) => path,
        Err(e) => {
            remove_partial(item, temp_path).await;
            return Err(Error::Resolution(e));
        }
    };

    if tokio::fs::metadata(&fetched).await.is_err() {
        remove_partial(item, temp_path).await;
        return Err(Error::Resolution(ResolutionError::new(
            item.remote_id.as_str(),
            ResolutionReason::Tool,
            format!(
                "{} reported success but {} does not exist",
                resolver.name(),
                fetched.display()
            ),
        )));
    }

    debug!(item = %item.id, path = ?fetched, "fetch complete");
    Ok(fetched)
}

async fn remove_partial(item: &ItemDescriptor, temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(item = %item.id, ?temp_path, "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(item = %item.id, ?temp_path, error = %e, "failed to remove partial download"),
    }
}
