//! Tag stage

use crate::error::Result;
use crate::tagging::TagWriter;
use crate::types::{Event, ItemDescriptor, MetadataRecord};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Execute the tag stage
///
/// Only called for items that carry a [`MetadataRecord`]. A failure leaves the
/// converted file in place.
pub(crate) async fn run_tag_stage(
    item: &ItemDescriptor,
    audio_path: &Path,
    metadata: &MetadataRecord,
    event_tx: &broadcast::Sender<Event>,
    tagger: &Arc<dyn TagWriter>,
) -> Result<()> {
    debug!(item = %item.id, ?audio_path, tagger = tagger.name(), "running tag stage");

    event_tx.send(Event::Tagging { id: item.id }).ok();

    tagger.write_tags(audio_path, metadata).await?;
    Ok(())
}
