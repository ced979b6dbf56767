//! Error types for bulk-audio-dl
//!
//! This module provides the error taxonomy for the library:
//! - Fatal pre-flight errors (configuration, manifest parsing) that abort a run
//!   before any item is fetched
//! - Per-item errors (resolution, conversion, tagging) that are captured into the
//!   item's [`PipelineResult`](crate::types::PipelineResult) and never abort the batch
//! - Machine-readable error codes for the JSON run report

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bulk-audio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-audio-dl
///
/// Each variant includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Manifest file could not be parsed
    #[error("failed to parse {path} (line {line}): {reason}")]
    Parse {
        /// The manifest file being parsed
        path: PathBuf,
        /// 1-based line number of the offending row (0 when unknown)
        line: u64,
        /// Why the row was rejected
        reason: String,
    },

    /// Remote entity could not be resolved or fetched
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Audio conversion failed
    #[error("conversion failed for {path}: {reason}")]
    Conversion {
        /// The source file handed to the transcoder
        path: PathBuf,
        /// The reason conversion failed (usually transcoder stderr)
        reason: String,
    },

    /// Tag writing failed
    #[error("tag writing failed for {path}: {reason}")]
    Tag {
        /// The audio file being tagged
        path: PathBuf,
        /// The reason tagging failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error without an associated key
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error for a specific configuration key
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error aborts the whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Parse { .. })
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Parse { .. } => "parse_error",
            Error::Resolution(e) => e.reason.error_code(),
            Error::Conversion { .. } => "conversion_failed",
            Error::Tag { .. } => "tag_failed",
            Error::Io(_) => "io_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Why a remote reference could not be resolved or fetched
///
/// Replaces the per-reason failure classes of platform extraction libraries with
/// a single tagged reason code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    /// The video or playlist does not exist
    NotFound,
    /// The video or playlist is private
    Private,
    /// The video requires age verification
    AgeRestricted,
    /// The video is blocked in the caller's region
    RegionBlocked,
    /// The video is a live, unterminated stream
    LiveStream,
    /// The video is unavailable for another reason
    Unavailable,
    /// The platform could not be reached
    Network,
    /// The resolver tool failed or produced unusable output
    Tool,
}

impl ResolutionReason {
    /// Get the machine-readable error code for this reason
    pub fn error_code(&self) -> &'static str {
        match self {
            ResolutionReason::NotFound => "resolution_not_found",
            ResolutionReason::Private => "resolution_private",
            ResolutionReason::AgeRestricted => "resolution_age_restricted",
            ResolutionReason::RegionBlocked => "resolution_region_blocked",
            ResolutionReason::LiveStream => "resolution_live_stream",
            ResolutionReason::Unavailable => "resolution_unavailable",
            ResolutionReason::Network => "resolution_network",
            ResolutionReason::Tool => "resolution_tool_error",
        }
    }
}

impl fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResolutionReason::NotFound => "not found",
            ResolutionReason::Private => "private",
            ResolutionReason::AgeRestricted => "age restricted",
            ResolutionReason::RegionBlocked => "blocked in your region",
            ResolutionReason::LiveStream => "live stream",
            ResolutionReason::Unavailable => "unavailable",
            ResolutionReason::Network => "network failure",
            ResolutionReason::Tool => "resolver failure",
        };
        f.write_str(text)
    }
}

/// A remote reference could not be resolved or its audio could not be fetched
#[derive(Debug, Clone, Error)]
#[error("cannot resolve {reference} ({reason}): {message}")]
pub struct ResolutionError {
    /// The reference (URL or id) that failed
    pub reference: String,
    /// Classified failure reason
    pub reason: ResolutionReason,
    /// Detail from the resolver
    pub message: String,
}

impl ResolutionError {
    /// Create a new resolution error
    pub fn new(
        reference: impl Into<String>,
        reason: ResolutionReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            reference: reference.into(),
            reason,
            message: message.into(),
        }
    }
}
