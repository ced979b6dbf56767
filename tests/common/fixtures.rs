//! Manifest fixtures and runner construction helpers

use bulk_audio_dl::{
    BatchRunner, ExecutionConfig, ExecutionMode, RunConfig, StreamResolver, TagWriter, Transcoder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Metadata manifest for two items
pub const TWO_ROW_MANIFEST: &str = "\
cover1.jpg,Intro,The Band,Debut,1,Rock,1999
,Outro,The Band,Debut,2,,
";

/// Metadata manifest for three items
pub const THREE_ROW_MANIFEST: &str = "\
,One,Artist,,1,,
,Two,Artist,,2,,
,Three,Artist,,3,,
";

/// Manifest-only rows: metadata followed by source and file name
pub const SOURCE_MANIFEST: &str = "\
,Intro,The Band,Debut,1,Rock,1999,https://youtu.be/intro01,01 Intro
,Outro,The Band,Debut,2,Rock,1999,outro02,02 Outro.mp3
";

/// Write `content` to `name` inside `dir`
pub fn write_manifest(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Configuration writing into `output_dir` with the given execution mode
pub fn test_config(output_dir: &Path, mode: ExecutionMode, workers: Option<usize>) -> RunConfig {
    RunConfig {
        output_dir: Some(output_dir.to_path_buf()),
        execution: ExecutionConfig { mode, workers },
        ..Default::default()
    }
}

/// Build a runner over mock collaborators
pub fn build_runner(
    config: RunConfig,
    resolver: Arc<dyn StreamResolver>,
    transcoder: Arc<dyn Transcoder>,
    tagger: Arc<dyn TagWriter>,
) -> BatchRunner {
    BatchRunner::new(config, resolver, transcoder, tagger).unwrap()
}
