//! # bulk-audio-dl
//!
//! Batch audio acquisition: resolve video references, playlists or a CSV
//! manifest into a work queue, then fetch, convert and tag every item into a
//! deterministic output tree.
//!
//! ## Design Philosophy
//!
//! bulk-audio-dl is designed to be:
//! - **Failure-isolated** - One bad item never aborts the batch; every item gets a result
//! - **Deterministic** - Output paths derive from sanitized titles only
//! - **Pluggable** - The resolver, transcoder and tag writer are traits
//! - **Event-driven** - Progress is broadcast as events, the report is the record
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_audio_dl::{BatchRunner, RunConfig, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig {
//!         output_dir: Some("/music".into()),
//!         ..Default::default()
//!     };
//!
//!     let runner = BatchRunner::from_config(config)?;
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = RunRequest {
//!         playlist: Some("https://www.youtube.com/playlist?list=PL123".to_string()),
//!         ..Default::default()
//!     };
//!     let report = runner.run(&request).await?;
//!     println!("{}", report.summary());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Manifest (CSV) parsing
pub mod manifest;
/// Per-item pipeline execution
pub mod pipeline;
/// Work queue construction
pub mod queue;
/// Source resolution and the stream resolver collaborator
pub mod resolver;
/// Run orchestration and reporting
pub mod runner;
/// Metadata tag writing
pub mod tagging;
/// Audio transcoding
pub mod transcoder;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{AudioConfig, ExecutionConfig, ExecutionMode, RunConfig, ToolsConfig};
pub use error::{Error, ResolutionError, ResolutionReason, Result};
pub use pipeline::PipelineExecutor;
pub use queue::QueueBuilder;
pub use resolver::{SourceResolver, StreamResolver, YtDlpResolver};
pub use runner::{BatchRunner, RunReport, RunRequest, SourceFailure};
pub use tagging::{Id3TagWriter, TagWriter};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use types::{
    Event, ItemDescriptor, ItemId, MetadataRecord, OutputLayout, Outcome, PipelineResult, Stage,
    WorkQueue,
};
