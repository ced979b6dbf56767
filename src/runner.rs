//! End-to-end orchestration of a run
//!
//! [`BatchRunner::run`] performs every pre-flight step (manifest parsing, source
//! resolution, queue building) before the first fetch. Fatal problems are returned
//! as `Err`; everything per-item ends up in the [`RunReport`].

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::manifest;
use crate::pipeline::PipelineExecutor;
use crate::queue::QueueBuilder;
use crate::resolver::{SourceResolver, StreamResolver, YtDlpResolver, resolve_manifest_row};
use crate::tagging::{Id3TagWriter, TagWriter};
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::types::{Event, MetadataRecord, OutputLayout, Outcome, PipelineResult, Stage};
use serde_json::json;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Inputs of one run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Single video references, in the order given
    pub singles: Vec<String>,
    /// Playlist reference
    pub playlist: Option<String>,
    /// Manifest file
    ///
    /// With singles or a playlist it supplies metadata aligned to the queue;
    /// on its own every row also names its source and file name.
    pub manifest: Option<PathBuf>,
}

impl RunRequest {
    /// Whether the manifest is the only source of items
    pub fn is_manifest_only(&self) -> bool {
        self.manifest.is_some() && self.singles.is_empty() && self.playlist.is_none()
    }

    fn is_empty(&self) -> bool {
        self.singles.is_empty() && self.playlist.is_none() && self.manifest.is_none()
    }
}

/// A source that failed before producing queue entries
#[derive(Debug)]
pub struct SourceFailure {
    /// The reference that failed
    pub reference: String,
    /// Why it failed
    pub error: Error,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    /// One result per queued item, in queue order
    pub results: Vec<PipelineResult>,
    /// Sources that never reached the queue
    pub source_failures: Vec<SourceFailure>,
}

impl RunReport {
    /// Whether every item succeeded and every source resolved
    pub fn is_success(&self) -> bool {
        self.source_failures.is_empty() && self.results.iter().all(|r| r.outcome.is_success())
    }

    /// Number of items that produced their audio file
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Number of failed items plus failed sources
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded() + self.source_failures.len()
    }

    /// Process exit code for this report (0 on success, 1 otherwise)
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Line-oriented summary listing every item with its outcome
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let item = &result.item;
            match &result.outcome {
                Outcome::Success { path } => {
                    let _ = writeln!(out, "{} ok     {} -> {}", item.id, item.display_title, path.display());
                }
                Outcome::Failed { stage, error } => {
                    let _ = writeln!(out, "{} FAILED {} at {}: {}", item.id, item.display_title, stage, error);
                }
            }
        }
        for failure in &self.source_failures {
            let _ = writeln!(
                out,
                "source FAILED {} at {}: {}",
                failure.reference,
                Stage::Resolve,
                failure.error
            );
        }
        let _ = write!(out, "{} succeeded, {} failed", self.succeeded(), self.failed());
        out
    }

    /// Machine-readable report
    pub fn to_json(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .results
            .iter()
            .map(|result| {
                let item = &result.item;
                match &result.outcome {
                    Outcome::Success { path } => json!({
                        "index": item.id,
                        "remote_id": item.remote_id,
                        "title": item.display_title,
                        "status": "success",
                        "path": path,
                    }),
                    Outcome::Failed { stage, error } => json!({
                        "index": item.id,
                        "remote_id": item.remote_id,
                        "title": item.display_title,
                        "status": "failed",
                        "output_path": item.output_path,
                        "stage": stage,
                        "error_code": error.error_code(),
                        "error": error.to_string(),
                    }),
                }
            })
            .collect();

        let source_failures: Vec<serde_json::Value> = self
            .source_failures
            .iter()
            .map(|failure| {
                json!({
                    "reference": failure.reference,
                    "stage": Stage::Resolve,
                    "error_code": failure.error.error_code(),
                    "error": failure.error.to_string(),
                })
            })
            .collect();

        json!({
            "success": self.is_success(),
            "succeeded": self.succeeded(),
            "failed": self.failed(),
            "items": items,
            "source_failures": source_failures,
        })
    }
}

/// Drives a complete run: resolve, build the queue, execute
pub struct BatchRunner {
    config: Arc<RunConfig>,
    layout: OutputLayout,
    sources: SourceResolver,
    executor: PipelineExecutor,
}

impl BatchRunner {
    /// Create a runner with explicit collaborators
    ///
    /// Validates `config` and derives the output layout; both failures are
    /// configuration errors.
    pub fn new(
        config: RunConfig,
        stream: Arc<dyn StreamResolver>,
        transcoder: Arc<dyn Transcoder>,
        tagger: Arc<dyn TagWriter>,
    ) -> Result<Self> {
        config.validate()?;
        let layout = config.output_layout()?;

        // Buffer enough events for a large queue; slow subscribers only lose progress lines
        let (event_tx, _rx) = broadcast::channel(1000);

        info!(
            resolver = stream.name(),
            transcoder = transcoder.name(),
            tagger = tagger.name(),
            output_dir = ?layout.base(),
            "collaborators initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            layout,
            sources: SourceResolver::new(Arc::clone(&stream)),
            executor: PipelineExecutor::new(event_tx, stream, transcoder, tagger),
        })
    }

    /// Create a runner using yt-dlp, ffmpeg and the ID3 tag writer
    ///
    /// The binaries come from configuration or a PATH search; a missing binary is
    /// a configuration error.
    pub fn from_config(config: RunConfig) -> Result<Self> {
        let stream: Arc<dyn StreamResolver> =
            Arc::new(YtDlpResolver::new(config.tools.find_yt_dlp()?));
        let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::new(
            config.tools.find_ffmpeg()?,
            config.audio.bitrate.clone(),
        ));
        let tagger: Arc<dyn TagWriter> = Arc::new(Id3TagWriter::with_timeout(
            Duration::from_secs(config.audio.cover_art_timeout_secs),
        )?);
        Self::new(config, stream, transcoder, tagger)
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.executor.subscribe()
    }

    /// The output layout of this runner
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Execute a run
    ///
    /// Returns `Err` only for fatal pre-flight errors, in which case nothing was
    /// fetched. Otherwise every queued item has a result in the report.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport> {
        if request.is_empty() {
            return Err(Error::config(
                "nothing to do: give at least one single reference, a playlist or a manifest",
            ));
        }

        let base = self.layout.base();
        tokio::fs::create_dir_all(base).await.map_err(|e| {
            Error::config_key(
                format!("cannot create output directory {}: {}", base.display(), e),
                "output_dir",
            )
        })?;

        // Parse the manifest first so a malformed file fails before any network access
        let manifest_path = request.manifest.as_deref();
        let manifest_rows = match manifest_path {
            Some(path) if request.is_manifest_only() => Some(manifest::parse_sources(path)?),
            _ => None,
        };
        let metadata: Option<Vec<MetadataRecord>> = match manifest_path {
            Some(path) if !request.is_manifest_only() => Some(manifest::parse(path)?),
            _ => None,
        };

        let mut builder = QueueBuilder::new(&self.layout);
        let mut source_failures = Vec::new();

        for reference in &request.singles {
            match self.sources.resolve_single(reference).await {
                Ok(item) => builder.add_single(item)?,
                Err(e) => {
                    warn!(reference = %reference, error = %e, "failed to resolve video");
                    source_failures.push(SourceFailure {
                        reference: reference.clone(),
                        error: Error::Resolution(e),
                    });
                }
            }
        }

        if let Some(reference) = &request.playlist {
            let outcome = match self.sources.resolve_playlist(reference).await {
                Ok(playlist) => builder.add_playlist(playlist).await,
                Err(e) => Err(Error::Resolution(e)),
            };
            match outcome {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(reference = %reference, error = %e, "playlist branch failed");
                    source_failures.push(SourceFailure {
                        reference: reference.clone(),
                        error: e,
                    });
                }
            }
        }

        for (source, record) in manifest_rows.into_iter().flatten() {
            let (remote_id, filename) = resolve_manifest_row(&source);
            builder.add_manifest_row(remote_id, &filename, record)?;
        }

        if metadata.is_some() && !source_failures.is_empty() {
            return Err(Error::config_key(
                format!(
                    "{} source(s) failed to resolve, so manifest rows cannot be aligned to the queue",
                    source_failures.len()
                ),
                "manifest",
            ));
        }

        let queue = builder.build(metadata)?;
        info!(
            items = queue.len(),
            source_failures = source_failures.len(),
            "work queue ready"
        );

        let results = self.executor.execute(queue, &self.config.execution).await;

        Ok(RunReport {
            results,
            source_failures,
        })
    }
}
