//! Source resolution
//!
//! Turns the three kinds of input (single references, playlist references and
//! manifest-only rows) into normalized `(remote id, title)` pairs for the queue
//! builder. Talking to the video platform is delegated to a [`StreamResolver`],
//! which also performs the audio fetch for the pipeline.

use crate::error::ResolutionError;
use crate::manifest::ManifestSource;
use crate::types::AUDIO_EXTENSION;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

mod traits;
mod yt_dlp;

pub use traits::{PlaylistListing, PlaylistMember, StreamResolver};
pub use yt_dlp::{YtDlpResolver, classify_error};

/// A reference resolved to its canonical id and title
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedItem {
    /// Canonical remote id
    pub remote_id: String,
    /// Display title
    pub title: String,
}

/// A playlist resolved to its title and members, in platform order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPlaylist {
    /// Playlist title
    pub title: String,
    /// Members in the order the platform reports them
    pub items: Vec<ResolvedItem>,
}

/// Resolves input references through a [`StreamResolver`]
#[derive(Clone)]
pub struct SourceResolver {
    stream: Arc<dyn StreamResolver>,
}

impl SourceResolver {
    /// Create a source resolver backed by `stream`
    pub fn new(stream: Arc<dyn StreamResolver>) -> Self {
        Self { stream }
    }

    /// Resolve a single video reference to its title and canonical id
    ///
    /// Fails when the video does not exist, is restricted, or is a live stream.
    pub async fn resolve_single(&self, reference: &str) -> Result<ResolvedItem, ResolutionError> {
        let title = self.stream.resolve_title(reference).await?;
        let remote_id = canonical_id(reference);

        debug!(reference, %remote_id, %title, "resolved video");
        Ok(ResolvedItem { remote_id, title })
    }

    /// Resolve a playlist reference to its title and ordered members
    ///
    /// Member order is preserved exactly as reported; an empty playlist resolves
    /// successfully with no items.
    pub async fn resolve_playlist(
        &self,
        reference: &str,
    ) -> Result<ResolvedPlaylist, ResolutionError> {
        let listing = self.stream.resolve_playlist_members(reference).await?;

        let items: Vec<ResolvedItem> = listing
            .members
            .into_iter()
            .map(|member| ResolvedItem {
                remote_id: canonical_id(&member.reference),
                title: member.title,
            })
            .collect();

        let id = playlist_id(reference).unwrap_or_else(|| reference.trim().to_string());
        info!(
            playlist = %id,
            title = %listing.title,
            members = items.len(),
            "resolved playlist"
        );
        Ok(ResolvedPlaylist {
            title: listing.title,
            items,
        })
    }
}

/// Resolve a manifest-only row to `(canonical id, file name)` without a title lookup
///
/// The file name gets the audio extension appended unless it already has it.
pub fn resolve_manifest_row(row: &ManifestSource) -> (String, String) {
    let filename = if has_audio_extension(&row.filename) {
        row.filename.clone()
    } else {
        format!("{}.{}", row.filename, AUDIO_EXTENSION)
    };
    (canonical_id(&row.reference), filename)
}

/// Strip the audio extension from a manifest file name to obtain its display title
pub fn title_from_filename(filename: &str) -> &str {
    if has_audio_extension(filename) {
        &filename[..filename.len() - AUDIO_EXTENSION.len() - 1]
    } else {
        filename
    }
}

fn has_audio_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(AUDIO_EXTENSION))
}

/// Canonical id of a video reference
///
/// YouTube watch, short-link, shorts and embed URLs are reduced to the bare video
/// id. Anything else (bare ids, URLs of other sites) is returned trimmed but
/// otherwise unchanged.
///
/// # Examples
///
/// ```
/// use bulk_audio_dl::resolver::canonical_id;
///
/// assert_eq!(canonical_id("https://www.youtube.com/watch?v=abc123&t=42"), "abc123");
/// assert_eq!(canonical_id("https://youtu.be/abc123"), "abc123");
/// assert_eq!(canonical_id("abc123"), "abc123");
/// ```
pub fn canonical_id(reference: &str) -> String {
    let reference = reference.trim();
    let Ok(url) = url::Url::parse(reference) else {
        return reference.to_string();
    };
    let Some(host) = url.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
    else {
        return reference.to_string();
    };

    let id = match host.as_str() {
        "youtu.be" => url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
            match segments.as_slice() {
                ["watch"] => query_param(&url, "v"),
                ["shorts", id] | ["embed", id] | ["live", id] => Some(id.to_string()),
                _ => None,
            }
        }
        _ => None,
    };

    id.filter(|id| !id.is_empty())
        .unwrap_or_else(|| reference.to_string())
}

/// Playlist id (`list` query parameter) of a playlist reference, if present
fn playlist_id(reference: &str) -> Option<String> {
    let url = url::Url::parse(reference.trim()).ok()?;
    query_param(&url, "list").filter(|id| !id.is_empty())
}

fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
