//! Queue builder
//!
//! Merges resolver output (and optionally manifest records) into the canonical
//! [`WorkQueue`], assigning each item its final output path. Entries are added in
//! the order they should run; [`QueueBuilder::build`] assigns queue positions and
//! attaches manifest metadata positionally.

use crate::error::{Error, Result};
use crate::resolver::{ResolvedItem, ResolvedPlaylist, title_from_filename};
use crate::types::{ItemDescriptor, ItemId, MetadataRecord, OutputLayout, WorkQueue};
use crate::utils::sanitize_filename;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// An entry waiting for its queue position
#[derive(Clone, Debug)]
struct PendingItem {
    remote_id: String,
    display_title: String,
    output_path: PathBuf,
    metadata: Option<MetadataRecord>,
}

/// Builds a [`WorkQueue`] from resolved sources
///
/// # Examples
///
/// ```
/// use bulk_audio_dl::queue::QueueBuilder;
/// use bulk_audio_dl::resolver::ResolvedItem;
/// use bulk_audio_dl::types::OutputLayout;
/// use std::path::PathBuf;
///
/// let layout = OutputLayout::new("/out");
/// let mut builder = QueueBuilder::new(&layout);
/// builder
///     .add_single(ResolvedItem {
///         remote_id: "abc123".to_string(),
///         title: "Song A".to_string(),
///     })
///     .unwrap();
///
/// let queue = builder.build(None).unwrap();
/// assert_eq!(queue.items()[0].output_path, PathBuf::from("/out/Song A.mp3"));
/// ```
pub struct QueueBuilder<'a> {
    layout: &'a OutputLayout,
    pending: Vec<PendingItem>,
}

impl<'a> QueueBuilder<'a> {
    /// Create an empty builder placing files under `layout`
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self {
            layout,
            pending: Vec::new(),
        }
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no entries have been added
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue a standalone item at `<base>/<sanitized title>.mp3`
    pub fn add_single(&mut self, item: ResolvedItem) -> Result<()> {
        let stem = sanitized_stem(&item.title)?;
        self.pending.push(PendingItem {
            output_path: self.layout.item_path(&stem),
            remote_id: item.remote_id,
            display_title: item.title,
            metadata: None,
        });
        Ok(())
    }

    /// Queue every member of a playlist under `<base>/<sanitized playlist title>/`
    ///
    /// The playlist directory is created before any member is queued. A title
    /// that sanitizes to nothing is a configuration error; failing to create the
    /// directory is an I/O error that only concerns this playlist, and nothing is
    /// queued for it.
    pub async fn add_playlist(&mut self, playlist: ResolvedPlaylist) -> Result<()> {
        let dir_name = sanitized_stem(&playlist.title)?;
        let members = playlist
            .items
            .into_iter()
            .map(|item| {
                let stem = sanitized_stem(&item.title)?;
                Ok(PendingItem {
                    output_path: self.layout.playlist_item_path(&dir_name, &stem),
                    remote_id: item.remote_id,
                    display_title: item.title,
                    metadata: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dir = self.layout.playlist_dir(&dir_name);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            warn!(?dir, error = %e, "failed to create playlist directory");
            Error::Io(e)
        })?;

        info!(playlist = %playlist.title, ?dir, members = members.len(), "queued playlist");
        self.pending.extend(members);
        Ok(())
    }

    /// Queue a manifest-only row at `<base>/<filename>` with its own metadata
    ///
    /// `filename` is expected to carry the audio extension already (see
    /// [`resolve_manifest_row`](crate::resolver::resolve_manifest_row)).
    pub fn add_manifest_row(
        &mut self,
        remote_id: String,
        filename: &str,
        metadata: MetadataRecord,
    ) -> Result<()> {
        let title = title_from_filename(filename);
        let stem = sanitized_stem(title)?;
        self.pending.push(PendingItem {
            output_path: self.layout.item_path(&stem),
            remote_id,
            display_title: title.to_string(),
            metadata: Some(metadata),
        });
        Ok(())
    }

    /// Finish the queue, attaching `metadata` records positionally
    ///
    /// Fails with a configuration error, producing no queue at all, when the
    /// number of records differs from the number of queued items. Output paths
    /// shared by several items are logged; the later item overwrites the earlier.
    pub fn build(self, metadata: Option<Vec<MetadataRecord>>) -> Result<WorkQueue> {
        let mut pending = self.pending;

        if let Some(records) = metadata {
            if records.len() != pending.len() {
                return Err(Error::config_key(
                    format!(
                        "manifest has {} records but {} items were resolved",
                        records.len(),
                        pending.len()
                    ),
                    "manifest",
                ));
            }
            for (entry, record) in pending.iter_mut().zip(records) {
                entry.metadata = Some(record);
            }
        }

        let mut seen: HashMap<PathBuf, ItemId> = HashMap::new();
        let items: Vec<ItemDescriptor> = pending
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let id = ItemId(index);
                if let Some(previous) = seen.insert(entry.output_path.clone(), id) {
                    warn!(
                        path = ?entry.output_path,
                        earlier = %previous,
                        later = %id,
                        "duplicate output path, later item overwrites earlier"
                    );
                }
                ItemDescriptor {
                    id,
                    remote_id: entry.remote_id,
                    display_title: entry.display_title,
                    output_path: entry.output_path,
                    metadata: entry.metadata,
                }
            })
            .collect();

        debug!(items = items.len(), "work queue built");
        Ok(WorkQueue::from_items(items))
    }
}

fn sanitized_stem(title: &str) -> Result<String> {
    let stem = sanitize_filename(title);
    if stem.is_empty() {
        return Err(Error::config(format!(
            "title {:?} is empty after sanitizing",
            title
        )));
    }
    Ok(stem)
}
