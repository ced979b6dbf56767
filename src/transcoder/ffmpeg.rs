//! Transcoder using the external ffmpeg binary

use super::traits::Transcoder;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Transcoder using the external `ffmpeg` binary
///
/// Converts to MP3 with the LAME encoder at a fixed bitrate, dropping any video
/// stream.
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
    bitrate: String,
}

impl FfmpegTranscoder {
    /// Create a new transcoder with an explicit binary path
    ///
    /// # Arguments
    ///
    /// * `binary_path` - Path to the ffmpeg binary
    /// * `bitrate` - Target bitrate in ffmpeg notation (e.g. `"192k"`)
    pub fn new(binary_path: PathBuf, bitrate: impl Into<String>) -> Self {
        Self {
            binary_path,
            bitrate: bitrate.into(),
        }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path(bitrate: impl Into<String>) -> Option<Self> {
        which::which("ffmpeg")
            .ok()
            .map(|path| Self::new(path, bitrate))
    }

    fn args(&self, src: &Path, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-y",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(src.as_os_str().to_owned());
        args.extend(
            ["-vn", "-codec:a", "libmp3lame", "-b:a", self.bitrate.as_str(), "-f", "mp3"]
                .iter()
                .map(OsString::from),
        );
        args.push(dest.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn convert(&self, src: &Path, dest: &Path) -> crate::Result<PathBuf> {
        debug!(?src, ?dest, bitrate = %self.bitrate, "running ffmpeg");

        let output = Command::new(&self.binary_path)
            .args(self.args(src, dest))
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("ffmpeg exited with {}", output.status),
                text => text.to_string(),
            };
            return Err(crate::Error::Conversion {
                path: src.to_path_buf(),
                reason,
            });
        }

        if tokio::fs::metadata(dest).await.is_err() {
            return Err(crate::Error::Conversion {
                path: src.to_path_buf(),
                reason: format!("ffmpeg reported success but {} is missing", dest.display()),
            });
        }

        Ok(dest.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
