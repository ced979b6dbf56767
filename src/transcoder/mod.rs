//! Audio transcoding
//!
//! The [`Transcoder`] trait is the boundary to the external codec. The default
//! implementation, [`FfmpegTranscoder`], runs the `ffmpeg` binary as a
//! subprocess.

mod ffmpeg;
mod traits;

pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
