//! Configuration types for bulk-audio-dl
//!
//! A [`RunConfig`] is built once at startup (optionally from a TOML file, then
//! overridden by command-line flags) and passed by reference into every
//! component. Nothing reads configuration from hidden object state.

use crate::error::{Error, Result};
use crate::types::OutputLayout;
use crate::utils::sanitize_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the work queue is executed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One item at a time, in queue order
    #[default]
    Sequential,
    /// Items processed by a pool of workers
    Concurrent,
}

/// Queue execution settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Sequential or concurrent execution (default: sequential)
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Worker-pool size in concurrent mode (None = one worker per queued item)
    #[serde(default)]
    pub workers: Option<usize>,
}

impl ExecutionConfig {
    /// Number of workers to spawn for a queue of `queue_len` items
    ///
    /// Always at least 1 and never more than the number of items.
    pub fn effective_workers(&self, queue_len: usize) -> usize {
        match self.mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Concurrent => self
                .workers
                .unwrap_or(queue_len)
                .min(queue_len)
                .max(1),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Locate the yt-dlp binary
    pub fn find_yt_dlp(&self) -> Result<PathBuf> {
        find_binary(self.yt_dlp_path.as_deref(), "yt-dlp", self.search_path, "tools.yt_dlp_path")
    }

    /// Locate the ffmpeg binary
    pub fn find_ffmpeg(&self) -> Result<PathBuf> {
        find_binary(self.ffmpeg_path.as_deref(), "ffmpeg", self.search_path, "tools.ffmpeg_path")
    }
}

/// Audio output settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioConfig {
    /// Target MP3 bitrate passed to the transcoder (default: "192k")
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Timeout in seconds for downloading remote cover art (default: 30)
    #[serde(default = "default_cover_art_timeout")]
    pub cover_art_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bitrate: default_bitrate(),
            cover_art_timeout_secs: default_cover_art_timeout(),
        }
    }
}

/// Configuration for one run
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Base output directory (required before a run starts)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Queue execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Verbose (debug-level) logging
    #[serde(default)]
    pub verbose: bool,
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config_key(
                format!("cannot read config file {}: {}", path.display(), e),
                "config",
            )
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("invalid config file: {}", e)))
    }

    /// Check settings that cannot be expressed in the type system
    pub fn validate(&self) -> Result<()> {
        if self.execution.workers == Some(0) {
            return Err(Error::config_key(
                "worker count must be at least 1",
                "execution.workers",
            ));
        }
        if self.audio.bitrate.trim().is_empty() {
            return Err(Error::config_key("bitrate must not be empty", "audio.bitrate"));
        }
        if self.audio.cover_art_timeout_secs == 0 {
            return Err(Error::config_key(
                "cover art timeout must be at least 1 second",
                "audio.cover_art_timeout_secs",
            ));
        }
        Ok(())
    }

    /// Build the output layout from the configured directory
    ///
    /// The directory is sanitized; an unset directory or one that sanitizes to
    /// nothing is a configuration error.
    pub fn output_layout(&self) -> Result<OutputLayout> {
        let dir = self
            .output_dir
            .as_deref()
            .ok_or_else(|| Error::config_key("no output directory configured", "output_dir"))?;
        let clean = sanitize_path(dir);
        if clean.as_os_str().is_empty() {
            return Err(Error::config_key(
                format!("output directory {:?} is not a usable path", dir),
                "output_dir",
            ));
        }
        Ok(OutputLayout::new(clean))
    }
}

fn find_binary(
    explicit: Option<&Path>,
    name: &str,
    search_path: bool,
    key: &str,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if !search_path {
        return Err(Error::config_key(
            format!("no path configured for {} and PATH search is disabled", name),
            key,
        ));
    }
    which::which(name)
        .map_err(|e| Error::config_key(format!("{} not found in PATH: {}", name, e), key))
}

fn default_true() -> bool {
    true
}

fn default_bitrate() -> String {
    "192k".to_string()
}

fn default_cover_art_timeout() -> u64 {
    30
}
