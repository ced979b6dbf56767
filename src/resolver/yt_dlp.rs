//! Stream resolver backed by the external yt-dlp binary

use super::traits::{PlaylistListing, PlaylistMember, StreamResolver};
use crate::error::{ResolutionError, ResolutionReason};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, warn};

/// Stream resolver using the external `yt-dlp` binary
///
/// Titles and playlists are read from yt-dlp's JSON output; audio is fetched with
/// the `bestaudio` format selector straight to the requested path.
pub struct YtDlpResolver {
    binary_path: PathBuf,
}

impl YtDlpResolver {
    /// Create a new resolver with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Run yt-dlp and return stdout, mapping failures to a [`ResolutionError`]
    async fn run(&self, reference: &str, args: &[&str]) -> Result<Vec<u8>, ResolutionError> {
        debug!(binary = ?self.binary_path, reference, ?args, "running yt-dlp");

        let output = Command::new(&self.binary_path)
            .args(args)
            .arg("--")
            .arg(reference)
            .output()
            .await
            .map_err(|e| {
                ResolutionError::new(
                    reference,
                    ResolutionReason::Tool,
                    format!("Failed to execute yt-dlp: {}", e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = last_error_line(&stderr);
            return Err(ResolutionError::new(
                reference,
                classify_error(&stderr),
                message,
            ));
        }

        Ok(output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct VideoJson {
    title: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    live_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistJson {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<EntryJson>>,
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve_title(&self, reference: &str) -> Result<String, ResolutionError> {
        let stdout = self
            .run(
                reference,
                &["--dump-single-json", "--no-playlist", "--skip-download", "--no-warnings"],
            )
            .await?;
        let video: VideoJson = parse_json(reference, &stdout)?;

        let live = video.is_live.unwrap_or(false)
            || matches!(
                video.live_status.as_deref(),
                Some("is_live") | Some("is_upcoming")
            );
        if live {
            return Err(ResolutionError::new(
                reference,
                ResolutionReason::LiveStream,
                "cannot download a live or upcoming stream",
            ));
        }

        video.title.filter(|t| !t.is_empty()).ok_or_else(|| {
            ResolutionError::new(reference, ResolutionReason::Tool, "yt-dlp reported no title")
        })
    }

    async fn fetch_audio_only(
        &self,
        reference: &str,
        dest: &Path,
    ) -> Result<PathBuf, ResolutionError> {
        let template = output_template(dest);
        self.run(
            reference,
            &[
                "--format",
                "bestaudio/best",
                "--no-playlist",
                "--no-part",
                "--no-continue",
                "--force-overwrites",
                "--quiet",
                "--no-warnings",
                "--output",
                &template,
            ],
        )
        .await?;
        Ok(dest.to_path_buf())
    }

    async fn resolve_playlist_members(
        &self,
        reference: &str,
    ) -> Result<PlaylistListing, ResolutionError> {
        let stdout = self
            .run(
                reference,
                &["--flat-playlist", "--dump-single-json", "--no-warnings"],
            )
            .await?;
        let playlist: PlaylistJson = parse_json(reference, &stdout)?;

        let title = playlist.title.filter(|t| !t.is_empty()).ok_or_else(|| {
            ResolutionError::new(
                reference,
                ResolutionReason::Tool,
                "yt-dlp reported no playlist title",
            )
        })?;

        let members = playlist
            .entries
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let reference = entry.url.or(entry.id)?;
                let title = entry.title.unwrap_or_else(|| reference.clone());
                Some(PlaylistMember { reference, title })
            })
            .collect();

        Ok(PlaylistListing { title, members })
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    reference: &str,
    stdout: &[u8],
) -> Result<T, ResolutionError> {
    serde_json::from_slice(stdout).map_err(|e| {
        ResolutionError::new(
            reference,
            ResolutionReason::Tool,
            format!("unreadable yt-dlp output: {}", e),
        )
    })
}

/// yt-dlp treats `%` in `--output` as a template directive
fn output_template(dest: &Path) -> String {
    dest.to_string_lossy().replace('%', "%%")
}

/// Last `ERROR:` line of yt-dlp stderr, or the last non-empty line
fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "yt-dlp failed without output".to_string())
}

/// Patterns checked in order; the first match decides the reason
const ERROR_PATTERNS: &[(&str, ResolutionReason)] = &[
    (r"private video|video is private|playlist is private|members-only", ResolutionReason::Private),
    (r"confirm your age|age[- ]restricted|inappropriate for some users", ResolutionReason::AgeRestricted),
    (r"available in your country|blocked it in your country|geo[- ]?restrict", ResolutionReason::RegionBlocked),
    (r"live event will begin|premieres in|is a live stream|this live event|is_live", ResolutionReason::LiveStream),
    (r"does not exist|not found|http error 404|incomplete youtube id|not a valid url|unsupported url", ResolutionReason::NotFound),
    (r"video unavailable|has been removed|no longer available|is unavailable|terminated", ResolutionReason::Unavailable),
    (r"unable to download (webpage|api page)|timed out|connection (reset|refused)|name resolution|network is unreachable|temporary failure", ResolutionReason::Network),
];

fn error_patterns() -> &'static [(Regex, ResolutionReason)] {
    static PATTERNS: OnceLock<Vec<(Regex, ResolutionReason)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ERROR_PATTERNS
            .iter()
            .filter_map(|(pattern, reason)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        warn!("Invalid yt-dlp error pattern '{}': {}", pattern, e);
                    })
                    .ok()
                    .map(|regex| (regex, *reason))
            })
            .collect()
    })
}

/// Classify yt-dlp error output into a [`ResolutionReason`]
///
/// # Examples
///
/// ```
/// use bulk_audio_dl::error::ResolutionReason;
/// use bulk_audio_dl::resolver::classify_error;
///
/// assert_eq!(
///     classify_error("ERROR: [youtube] abc123: Private video. Sign in if you've been granted access"),
///     ResolutionReason::Private
/// );
/// ```
pub fn classify_error(stderr: &str) -> ResolutionReason {
    error_patterns()
        .iter()
        .find(|(regex, _)| regex.is_match(stderr))
        .map(|(_, reason)| *reason)
        .unwrap_or(ResolutionReason::Tool)
}
