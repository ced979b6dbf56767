//! Metadata tag writing
//!
//! The [`TagWriter`] trait is the boundary to the tag format library. The default
//! implementation, [`Id3TagWriter`], writes ID3v2.4 tags with the `id3` crate.
//! Only fields present in the [`MetadataRecord`] are written; tags already in the
//! file are preserved for absent fields.

use crate::error::{Error, Result};
use crate::types::MetadataRecord;
use async_trait::async_trait;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Timestamp, Version};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default timeout for downloading remote cover art
pub const DEFAULT_COVER_ART_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for writing metadata tags into a converted audio file
#[async_trait]
pub trait TagWriter: Send + Sync {
    /// Write the present fields of `metadata` into `path`, returning `path`
    async fn write_tags(&self, path: &Path, metadata: &MetadataRecord) -> Result<PathBuf>;

    /// Name of this implementation
    fn name(&self) -> &'static str;
}

/// Cover image ready to embed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverArt {
    /// MIME type of the image
    pub mime_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

/// ID3v2.4 tag writer
///
/// Cover art is read from a local file, or downloaded when the thumbnail is an
/// `http(s)` URL. Downloads are bounded by a timeout so a stalled image host
/// fails the tag stage instead of holding up the run.
#[derive(Clone)]
pub struct Id3TagWriter {
    http: reqwest::Client,
}

impl Id3TagWriter {
    /// Create a tag writer with the default cover art timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_COVER_ART_TIMEOUT)
    }

    /// Create a tag writer whose cover art downloads give up after `timeout`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Load cover art from a local path or an http(s) URL
    pub async fn load_cover_art(&self, thumbnail: &str) -> Result<CoverArt> {
        if is_remote(thumbnail) {
            let response = self.http.get(thumbnail).send().await?.error_for_status()?;
            let header_mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .filter(|v| v.starts_with("image/"))
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
            let data = response.bytes().await?.to_vec();
            let url_path = url::Url::parse(thumbnail)
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            let mime_type = header_mime.unwrap_or_else(|| mime_from_extension(&url_path).to_string());

            debug!(thumbnail, bytes = data.len(), %mime_type, "downloaded cover art");
            return Ok(CoverArt { mime_type, data });
        }

        let data = tokio::fs::read(thumbnail).await.map_err(|e| Error::Tag {
            path: PathBuf::from(thumbnail),
            reason: format!("cannot read cover art: {}", e),
        })?;
        Ok(CoverArt {
            mime_type: mime_from_extension(thumbnail).to_string(),
            data,
        })
    }
}

#[async_trait]
impl TagWriter for Id3TagWriter {
    async fn write_tags(&self, path: &Path, metadata: &MetadataRecord) -> Result<PathBuf> {
        let cover = match metadata.thumbnail_path.as_deref() {
            Some(thumbnail) => Some(self.load_cover_art(thumbnail).await?),
            None => None,
        };

        let owned_path = path.to_path_buf();
        let metadata = metadata.clone();
        tokio::task::spawn_blocking(move || apply_tags(&owned_path, &metadata, cover))
            .await
            .map_err(|e| Error::Tag {
                path: path.to_path_buf(),
                reason: format!("tag writer task failed: {}", e),
            })??;

        debug!(?path, "tags written");
        Ok(path.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "id3"
    }
}

/// Write present fields into the file's ID3 tag (blocking)
fn apply_tags(path: &Path, metadata: &MetadataRecord, cover: Option<CoverArt>) -> Result<()> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Tag::new(),
        Err(e) => return Err(tag_error(path, e)),
    };

    if let Some(title) = &metadata.title {
        tag.set_title(title.as_str());
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.as_str());
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.as_str());
    }
    if let Some(track) = metadata.track_num {
        tag.set_track(track);
    }
    if let Some(genre) = &metadata.genre {
        tag.set_genre(genre.as_str());
    }
    if let Some(year) = metadata.recording_year {
        tag.set_date_recorded(Timestamp {
            year,
            month: None,
            day: None,
            hour: None,
            minute: None,
            second: None,
        });
    }
    if let Some(cover) = cover {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: cover.mime_type,
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: cover.data,
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| tag_error(path, e))
}

fn tag_error(path: &Path, e: id3::Error) -> Error {
    Error::Tag {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn is_remote(thumbnail: &str) -> bool {
    let lower = thumbnail.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn mime_from_extension(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
