//! Core types and events

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extension of every produced audio file
pub const AUDIO_EXTENSION: &str = "mp3";

/// Position of an item in the work queue
///
/// The queue index is the item's identity: it is assigned by the queue builder in
/// insertion order and never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl ItemId {
    /// Get the inner queue index
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for ItemId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Per-item tag data read from the manifest
///
/// Every field is optional. An empty manifest cell is `None`, never an empty
/// string, so tag writing can tell "not provided" apart from a real value and
/// leave existing tags alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Local path or http(s) URL of the cover image
    pub thumbnail_path: Option<String>,
    /// Track title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
    /// Track number within the album
    pub track_num: Option<u32>,
    /// Genre
    pub genre: Option<String>,
    /// Year of recording
    pub recording_year: Option<i32>,
}

impl MetadataRecord {
    /// Whether no field carries a value
    pub fn is_empty(&self) -> bool {
        self == &MetadataRecord::default()
    }
}

/// One unit of work: a remote reference and where its audio ends up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Queue position
    pub id: ItemId,
    /// Canonical remote id (or the reference itself when it cannot be canonicalised)
    pub remote_id: String,
    /// Human-readable title used for logging and the file name
    pub display_title: String,
    /// Final audio file path
    pub output_path: PathBuf,
    /// Tag data, when a manifest supplied it
    pub metadata: Option<MetadataRecord>,
}

impl ItemDescriptor {
    /// Path the raw download is written to before conversion
    pub fn temp_path(&self) -> PathBuf {
        crate::utils::temp_path_for(&self.output_path)
    }
}

/// Ordered sequence of items to process
///
/// Items are never reordered or removed once the queue is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkQueue {
    items: Vec<ItemDescriptor>,
}

impl WorkQueue {
    pub(crate) fn from_items(items: Vec<ItemDescriptor>) -> Self {
        Self { items }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over queued items in queue order
    pub fn iter(&self) -> std::slice::Iter<'_, ItemDescriptor> {
        self.items.iter()
    }

    /// Borrow the queued items
    pub fn items(&self) -> &[ItemDescriptor] {
        &self.items
    }

    /// Consume the queue, yielding its items in order
    pub fn into_items(self) -> Vec<ItemDescriptor> {
        self.items
    }
}

impl<'a> IntoIterator for &'a WorkQueue {
    type Item = &'a ItemDescriptor;
    type IntoIter = std::slice::Iter<'a, ItemDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Where produced files are placed
///
/// Built once at startup from configuration and passed explicitly to every
/// component; nothing in the library falls back to the home or current directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    /// Create a layout rooted at `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base output directory
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding the items of a playlist (name must already be sanitized)
    pub fn playlist_dir(&self, sanitized_playlist_title: &str) -> PathBuf {
        self.base.join(sanitized_playlist_title)
    }

    /// Final path for a standalone item (name must already be sanitized)
    pub fn item_path(&self, sanitized_title: &str) -> PathBuf {
        audio_file_in(&self.base, sanitized_title)
    }

    /// Final path for a playlist item (names must already be sanitized)
    pub fn playlist_item_path(&self, sanitized_playlist_title: &str, sanitized_title: &str) -> PathBuf {
        audio_file_in(&self.playlist_dir(sanitized_playlist_title), sanitized_title)
    }
}

fn audio_file_in(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, AUDIO_EXTENSION))
}

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Source resolution (only reported for sources that never reached the queue)
    Resolve,
    /// Audio download to the temporary path
    Fetch,
    /// Transcoding to the final audio file
    Convert,
    /// Metadata tag writing
    Tag,
    /// Removal of temporary artifacts
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Convert => "convert",
            Stage::Tag => "tag",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// How an item's pipeline ended
#[derive(Debug)]
pub enum Outcome {
    /// The audio file was produced at `path`
    Success {
        /// Final audio file path
        path: PathBuf,
    },
    /// A stage failed
    Failed {
        /// The stage that failed
        stage: Stage,
        /// The error reported by that stage
        error: Error,
    },
}

impl Outcome {
    /// Whether the item produced its audio file
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The failing stage, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// Result of one item's pipeline; exactly one exists per queued item
#[derive(Debug)]
pub struct PipelineResult {
    /// The processed item
    pub item: ItemDescriptor,
    /// What happened to it
    pub outcome: Outcome,
}

impl PipelineResult {
    /// Create a success result
    pub fn success(item: ItemDescriptor, path: PathBuf) -> Self {
        Self {
            item,
            outcome: Outcome::Success { path },
        }
    }

    /// Create a failure result
    pub fn failed(item: ItemDescriptor, stage: Stage, error: Error) -> Self {
        Self {
            item,
            outcome: Outcome::Failed { stage, error },
        }
    }
}

/// Event emitted during a run
///
/// Events are best-effort notifications for progress output; the run report is
/// the authoritative record of what happened.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item added to the work queue
    Queued {
        /// Item ID
        id: ItemId,
        /// Display title
        title: String,
    },

    /// Fetching audio to the temporary path
    Fetching {
        /// Item ID
        id: ItemId,
    },

    /// Converting the temporary file
    Converting {
        /// Item ID
        id: ItemId,
    },

    /// Writing tags
    Tagging {
        /// Item ID
        id: ItemId,
    },

    /// Removing temporary artifacts
    Cleaning {
        /// Item ID
        id: ItemId,
    },

    /// Item finished successfully
    Completed {
        /// Item ID
        id: ItemId,
        /// Final audio file path
        path: PathBuf,
    },

    /// Item failed
    Failed {
        /// Item ID
        id: ItemId,
        /// Stage that failed
        stage: Stage,
        /// Error message
        error: String,
    },

    /// Every queued item has finished
    RunComplete {
        /// Number of items that succeeded
        succeeded: usize,
        /// Number of items that failed
        failed: usize,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_layout_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(layout.item_path("Song A"), PathBuf::from("/out/Song A.mp3"));
        assert_eq!(
            layout.playlist_item_path("Album X", "Track 1"),
            PathBuf::from("/out/Album X/Track 1.mp3")
        );
        assert_eq!(layout.playlist_dir("Album X"), PathBuf::from("/out/Album X"));
    }

    #[test]
    fn test_item_temp_path() {
        let item = ItemDescriptor {
            id: ItemId(0),
            remote_id: "abc123".to_string(),
            display_title: "Song A".to_string(),
            output_path: PathBuf::from("/out/Song A.mp3"),
            metadata: None,
        };
        assert_eq!(item.temp_path(), PathBuf::from("/out/Song A.mp3.tmp"));
    }

    #[test]
    fn test_item_id_display_is_one_based() {
        assert_eq!(ItemId(0).to_string(), "#1");
        assert_eq!(ItemId(41).to_string(), "#42");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = Event::Failed {
            id: ItemId(2),
            stage: Stage::Convert,
            error: "ffmpeg exited with status 1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["id"], 2);
        assert_eq!(json["stage"], "convert");
    }

    #[test]
    fn test_metadata_record_is_empty() {
        assert!(MetadataRecord::default().is_empty());
        let record = MetadataRecord {
            genre: Some("Rock".to_string()),
            ..Default::default()
        };
        assert!(!record.is_empty());
    }
}
