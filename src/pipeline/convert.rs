//! Convert stage: transcode the temp file into the final audio file

use crate::error::Result;
use crate::transcoder::Transcoder;
use crate::types::{Event, ItemDescriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Execute the convert stage
///
/// The temp file is deleted whether conversion succeeds or fails.
pub(crate) async fn run_convert_stage(
    item: &ItemDescriptor,
    temp_path: &Path,
    event_tx: &broadcast::Sender<Event>,
    transcoder: &Arc<dyn Transcoder>,
) -> Result<PathBuf> {
    debug!(
        item = %item.id,
        ?temp_path,
        output = ?item.output_path,
        transcoder = transcoder.name(),
        "running convert stage"
    );

    event_tx.send(Event::Converting { id: item.id }).ok();

    let result = transcoder.convert(temp_path, &item.output_path).await;

    if let Err(e) = tokio::fs::remove_file(temp_path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(item = %item.id, ?temp_path, error = %e, "failed to delete temp file after conversion");
    }

    result
}
