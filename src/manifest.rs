//! Manifest parsing
//!
//! A manifest is a header-less CSV file with one row per queued item, in queue
//! order. Each row starts with seven metadata fields:
//!
//! ```text
//! thumbnail_path,title,artist,album,track_num,genre,recording_year
//! ```
//!
//! Empty fields mean "not provided". In manifest-only mode two more fields follow,
//! naming the source reference and the destination file name:
//!
//! ```text
//! cover.jpg,Intro,Band,Debut,1,Rock,1999,https://youtu.be/abc123,01 Intro
//! ```
//!
//! Rows are aligned to the work queue by position only; checking that the row
//! count matches the queue is the queue builder's job.

use crate::error::{Error, Result};
use crate::types::MetadataRecord;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::debug;

/// Number of metadata fields every row must carry
pub const METADATA_FIELDS: usize = 7;

/// Number of fields a manifest-only row must carry
pub const SOURCE_FIELDS: usize = METADATA_FIELDS + 2;

/// Source columns of a manifest-only row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestSource {
    /// Remote reference (URL or id)
    pub reference: String,
    /// Explicit destination file name
    pub filename: String,
}

/// Parse the metadata records of a manifest, in row order
pub fn parse(path: &Path) -> Result<Vec<MetadataRecord>> {
    let rows = read_rows(path)?;
    let records = rows
        .iter()
        .map(|(line, row)| parse_metadata(path, *line, row))
        .collect::<Result<Vec<_>>>()?;

    debug!(?path, records = records.len(), "parsed manifest");
    Ok(records)
}

/// Parse a manifest-only file: every row names its source and destination
pub fn parse_sources(path: &Path) -> Result<Vec<(ManifestSource, MetadataRecord)>> {
    let rows = read_rows(path)?;
    let mut entries = Vec::with_capacity(rows.len());

    for (line, row) in &rows {
        let metadata = parse_metadata(path, *line, row)?;
        let (Some(reference), Some(filename)) = (
            field(row, METADATA_FIELDS),
            field(row, METADATA_FIELDS + 1),
        ) else {
            return Err(parse_error(
                path,
                *line,
                format!(
                    "manifest-only rows need {} fields (metadata, source, filename), found {}",
                    SOURCE_FIELDS,
                    row.len()
                ),
            ));
        };
        entries.push((ManifestSource { reference, filename }, metadata));
    }

    debug!(?path, rows = entries.len(), "parsed manifest sources");
    Ok(entries)
}

/// Read all non-blank rows with their 1-based line numbers
fn read_rows(path: &Path) -> Result<Vec<(u64, StringRecord)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, 0, format!("cannot open manifest: {}", e)))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            parse_error(path, line, e.to_string())
        })?;
        // Whitespace-only line; an all-empty row with separators is still a record
        if record.len() == 1 && record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push((line, record));
    }
    Ok(rows)
}

fn parse_metadata(path: &Path, line: u64, row: &StringRecord) -> Result<MetadataRecord> {
    if row.len() < METADATA_FIELDS {
        return Err(parse_error(
            path,
            line,
            format!("expected {} fields, found {}", METADATA_FIELDS, row.len()),
        ));
    }

    let track_num = field(row, 4)
        .map(|track| parse_track(&track))
        .transpose()
        .map_err(|reason| parse_error(path, line, reason))?;
    let recording_year = field(row, 6)
        .map(|year| parse_year(&year))
        .transpose()
        .map_err(|reason| parse_error(path, line, reason))?;

    Ok(MetadataRecord {
        thumbnail_path: field(row, 0),
        title: field(row, 1),
        artist: field(row, 2),
        album: field(row, 3),
        track_num,
        genre: field(row, 5),
        recording_year,
    })
}

/// Field `index` of `row`, or `None` when missing or empty
fn field(row: &StringRecord, index: usize) -> Option<String> {
    row.get(index)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Track numbers may be written as `3` or `3/12`
fn parse_track(value: &str) -> std::result::Result<u32, String> {
    let number = value.split('/').next().unwrap_or(value).trim();
    number
        .parse()
        .map_err(|_| format!("invalid track number {:?}", value))
}

/// Years may be written as `1999` or as a date starting with the year (`1999-05-01`)
fn parse_year(value: &str) -> std::result::Result<i32, String> {
    let year = value.split('-').next().unwrap_or(value).trim();
    year.parse()
        .map_err(|_| format!("invalid recording year {:?}", value))
}

fn parse_error(path: &Path, line: u64, reason: impl Into<String>) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(contents: &str) -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.csv");
        fs::write(&path, contents).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_parse_full_and_sparse_rows() {
        let (_dir, path) = write_manifest(
            "cover.jpg,Intro,The Band,Debut,1,Rock,1999\n\
             ,Second Song,,,,,\n",
        );

        let records = parse(&path).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(
            records[0],
            MetadataRecord {
                thumbnail_path: Some("cover.jpg".to_string()),
                title: Some("Intro".to_string()),
                artist: Some("The Band".to_string()),
                album: Some("Debut".to_string()),
                track_num: Some(1),
                genre: Some("Rock".to_string()),
                recording_year: Some(1999),
            }
        );
        assert_eq!(
            records[1],
            MetadataRecord {
                title: Some("Second Song".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_all_empty_row_keeps_its_position() {
        let (_dir, path) = write_manifest(",A,,,,,\n,,,,,,\n,C,,,,,\n");
        let records = parse(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title.as_deref(), Some("A"));
        assert_eq!(records[1], MetadataRecord::default());
        assert_eq!(records[2].title.as_deref(), Some("C"));
    }

    #[test]
    fn test_whitespace_only_fields_are_absent() {
        let (_dir, path) = write_manifest(" , ,  ,,,,\n");
        let records = parse(&path).unwrap();
        assert_eq!(records, vec![MetadataRecord::default()]);

        let (_dir, path) = write_manifest(",Title,  ,,,,\n");
        let records = parse(&path).unwrap();
        assert_eq!(records[0].artist, None);
        assert_eq!(records[0].title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_quoted_fields() {
        let (_dir, path) =
            write_manifest("\"art, front.png\",\"Song, Part 2\",Artist,Album,2,Pop,2001\n");
        let records = parse(&path).unwrap();
        assert_eq!(records[0].thumbnail_path.as_deref(), Some("art, front.png"));
        assert_eq!(records[0].title.as_deref(), Some("Song, Part 2"));
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let (_dir, path) = write_manifest(
            "cover.jpg,Intro,Band,Album,1,Rock,1999\n\
             cover.jpg,Outro,Band\n",
        );
        match parse(&path) {
            Err(Error::Parse { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 7 fields, found 3"));
            }
            other => panic!("Expected Parse error, got: {:?}", other),
        }
    }

    #[test]
    fn test_track_and_year_formats() {
        let (_dir, path) = write_manifest(",,,,3/12,,2004-06-01\n");
        let records = parse(&path).unwrap();
        assert_eq!(records[0].track_num, Some(3));
        assert_eq!(records[0].recording_year, Some(2004));
    }

    #[test]
    fn test_invalid_track_is_parse_error() {
        let (_dir, path) = write_manifest(",,,,three,,\n");
        assert!(matches!(parse(&path), Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_extra_fields_ignored_by_parse() {
        let (_dir, path) = write_manifest(",Title,,,,,,https://youtu.be/abc123,Song\n");
        let records = parse(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let (_dir, path) = write_manifest("\n,A,,,,,\n\n,B,,,,,\n");
        let records = parse(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].title.as_deref(), Some("B"));
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let result = parse(Path::new("/nonexistent/manifest-xyz.csv"));
        assert!(matches!(result, Err(Error::Parse { line: 0, .. })));
    }

    #[test]
    fn test_parse_sources() {
        let (_dir, path) = write_manifest(
            ",Intro,Band,,1,,,https://youtu.be/abc123,01 Intro\n\
             ,,,,,,,xyz789,02 Outro.mp3\n",
        );
        let entries = parse_sources(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].0,
            ManifestSource {
                reference: "https://youtu.be/abc123".to_string(),
                filename: "01 Intro".to_string(),
            }
        );
        assert_eq!(entries[0].1.artist.as_deref(), Some("Band"));
        assert_eq!(entries[1].0.filename, "02 Outro.mp3");
        assert!(entries[1].1.is_empty());
    }

    #[test]
    fn test_parse_sources_requires_source_columns() {
        let (_dir, path) = write_manifest(",Intro,Band,,1,,\n");
        match parse_sources(&path) {
            Err(Error::Parse { reason, .. }) => assert!(reason.contains("manifest-only")),
            other => panic!("Expected Parse error, got: {:?}", other),
        }
    }
}
