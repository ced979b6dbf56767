//! Traits and types for the stream-resolver collaborator

use crate::error::ResolutionError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One entry of a playlist listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMember {
    /// Reference (URL or id) of the member video
    pub reference: String,
    /// Title of the member video
    pub title: String,
}

/// Title and members of a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistListing {
    /// Playlist title
    pub title: String,
    /// Members in platform order
    pub members: Vec<PlaylistMember>,
}

/// Trait for the video-platform collaborator
///
/// Implementations resolve references to titles and playlist listings, and
/// download the audio stream of a video. Every failure is a [`ResolutionError`]
/// carrying a classified reason.
///
/// # Examples
///
/// ```no_run
/// use bulk_audio_dl::resolver::{StreamResolver, YtDlpResolver};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = YtDlpResolver::from_path().expect("yt-dlp not found in PATH");
///
/// let title = resolver.resolve_title("https://youtu.be/abc123").await?;
/// resolver
///     .fetch_audio_only("abc123", Path::new("/tmp/song.mp3.tmp"))
///     .await?;
/// println!("fetched {}", title);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Look up the title of a single video
    ///
    /// Fails for videos that do not exist, are restricted, or are live.
    async fn resolve_title(&self, reference: &str) -> Result<String, ResolutionError>;

    /// Download the best audio-only stream of a video to `dest`
    ///
    /// Returns the path written, which is `dest`.
    async fn fetch_audio_only(&self, reference: &str, dest: &Path)
    -> Result<PathBuf, ResolutionError>;

    /// Look up a playlist's title and ordered members
    async fn resolve_playlist_members(
        &self,
        reference: &str,
    ) -> Result<PlaylistListing, ResolutionError>;

    /// Name of this implementation
    fn name(&self) -> &'static str;
}
