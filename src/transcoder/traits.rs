//! Traits for the transcoder collaborator

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for audio conversion
///
/// Implementations convert the raw download at `src` into the target audio
/// format at `dest`. No progress reporting is required. Failures are reported as
/// [`Error::Conversion`](crate::Error::Conversion).
///
/// # Examples
///
/// ```no_run
/// use bulk_audio_dl::transcoder::{FfmpegTranscoder, Transcoder};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transcoder = FfmpegTranscoder::from_path("192k")
///     .expect("ffmpeg not found in PATH");
///
/// transcoder
///     .convert(Path::new("song.mp3.tmp"), Path::new("song.mp3"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `src` to the target format at `dest`, returning `dest`
    async fn convert(&self, src: &Path, dest: &Path) -> crate::Result<PathBuf>;

    /// Name of this implementation
    fn name(&self) -> &'static str;
}
