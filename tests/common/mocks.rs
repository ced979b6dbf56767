//! In-memory collaborators standing in for yt-dlp, ffmpeg and the tag writer

use async_trait::async_trait;
use bulk_audio_dl::error::{ResolutionError, ResolutionReason};
use bulk_audio_dl::resolver::{PlaylistListing, PlaylistMember, StreamResolver};
use bulk_audio_dl::{Error, MetadataRecord, TagWriter, Transcoder};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stream resolver backed by fixed maps
///
/// Unknown references fail with [`ResolutionReason::NotFound`]. Fetches write a
/// small file to the destination unless the remote id was marked as failing.
#[derive(Default)]
pub struct MockResolver {
    titles: HashMap<String, String>,
    playlists: HashMap<String, PlaylistListing>,
    failing_fetches: HashSet<String>,
    title_lookups: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a video that resolves to `title`
    pub fn with_video(mut self, reference: &str, title: &str) -> Self {
        self.titles.insert(reference.to_string(), title.to_string());
        self
    }

    /// Register a playlist with `(reference, title)` members in order
    pub fn with_playlist(mut self, reference: &str, title: &str, members: &[(&str, &str)]) -> Self {
        self.playlists.insert(
            reference.to_string(),
            PlaylistListing {
                title: title.to_string(),
                members: members
                    .iter()
                    .map(|(reference, title)| PlaylistMember {
                        reference: reference.to_string(),
                        title: title.to_string(),
                    })
                    .collect(),
            },
        );
        self
    }

    /// Make fetching `remote_id` fail
    pub fn with_failing_fetch(mut self, remote_id: &str) -> Self {
        self.failing_fetches.insert(remote_id.to_string());
        self
    }

    /// Number of title lookups performed
    pub fn title_lookups(&self) -> usize {
        self.title_lookups.load(Ordering::SeqCst)
    }

    /// Remote ids fetched so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamResolver for MockResolver {
    async fn resolve_title(&self, reference: &str) -> Result<String, ResolutionError> {
        self.title_lookups.fetch_add(1, Ordering::SeqCst);
        self.titles.get(reference).cloned().ok_or_else(|| {
            ResolutionError::new(reference, ResolutionReason::NotFound, "Video unavailable")
        })
    }

    async fn fetch_audio_only(&self, reference: &str, dest: &Path) -> Result<PathBuf, ResolutionError> {
        self.fetched.lock().unwrap().push(reference.to_string());
        if self.failing_fetches.contains(reference) {
            // Simulate an interrupted download
            tokio::fs::write(dest, b"partial").await.ok();
            return Err(ResolutionError::new(
                reference,
                ResolutionReason::Network,
                "connection reset by peer",
            ));
        }
        tokio::fs::write(dest, format!("audio stream of {}", reference))
            .await
            .map_err(|e| ResolutionError::new(reference, ResolutionReason::Tool, e.to_string()))?;
        Ok(dest.to_path_buf())
    }

    async fn resolve_playlist_members(&self, reference: &str) -> Result<PlaylistListing, ResolutionError> {
        self.playlists.get(reference).cloned().ok_or_else(|| {
            ResolutionError::new(reference, ResolutionReason::Private, "This playlist is private")
        })
    }

    fn name(&self) -> &'static str {
        "mock-resolver"
    }
}

/// Transcoder that copies the input, failing for chosen output file names
#[derive(Default)]
pub struct MockTranscoder {
    failing_outputs: HashSet<String>,
    conversions: AtomicUsize,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make conversion fail when the output file is named `file_name`
    pub fn with_failing_output(mut self, file_name: &str) -> Self {
        self.failing_outputs.insert(file_name.to_string());
        self
    }

    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn convert(&self, src: &Path, dest: &Path) -> bulk_audio_dl::Result<PathBuf> {
        self.conversions.fetch_add(1, Ordering::SeqCst);
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing_outputs.contains(&name) {
            return Err(Error::Conversion {
                path: src.to_path_buf(),
                reason: "Invalid data found when processing input".to_string(),
            });
        }
        tokio::fs::copy(src, dest).await?;
        Ok(dest.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "mock-transcoder"
    }
}

/// Tag writer that records every call
#[derive(Default)]
pub struct MockTagWriter {
    fail: bool,
    calls: Mutex<Vec<(PathBuf, MetadataRecord)>>,
}

impl MockTagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tag writer whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Recorded `(path, metadata)` calls
    pub fn calls(&self) -> Vec<(PathBuf, MetadataRecord)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagWriter for MockTagWriter {
    async fn write_tags(&self, path: &Path, metadata: &MetadataRecord) -> bulk_audio_dl::Result<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), metadata.clone()));
        if self.fail {
            return Err(Error::Tag {
                path: path.to_path_buf(),
                reason: "file is read-only".to_string(),
            });
        }
        Ok(path.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "mock-tagger"
    }
}
