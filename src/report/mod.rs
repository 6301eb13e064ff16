//! CSV run artifacts
//!
//! Flat CSV files written under the data directory after each run, so the
//! pairing and duplicate decisions can be audited without re-running:
//!
//! - `pairing_report.csv` - `(metadata_source, target_file, method, confidence)`
//! - `duplicate_report.csv` - `(original, duplicate)`
//! - `unmatched_report.csv` - `(metadata_source, title)`
//!
//! Fields containing commas or quotes are quoted; paths usually do not need
//! it but exporter titles can contain anything.

use crate::core::error::Result;
use crate::duplicate::DuplicateGroup;
use crate::pairing::MatchPair;
use crate::sidecar::MetadataRecord;
use log::info;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes run artifacts under one data directory
pub struct ReportWriter {
    data_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Write the pairing report; returns the file path
    pub fn write_pairing_report(&self, pairs: &[MatchPair]) -> Result<PathBuf> {
        let path = self.data_dir.join("pairing_report.csv");
        let mut out = self.create(&path)?;

        writeln!(out, "metadata_source,target_file,method,confidence")?;
        for pair in pairs {
            writeln!(
                out,
                "{},{},{},{:.2}",
                csv_field(&pair.record.source_path.to_string_lossy()),
                csv_field(&pair.file.path.to_string_lossy()),
                pair.method,
                pair.confidence
            )?;
        }

        info!("Wrote pairing report: {} ({} rows)", path.display(), pairs.len());
        Ok(path)
    }

    /// Write the duplicate report, one row per (original, duplicate) edge
    pub fn write_duplicate_report(&self, groups: &[DuplicateGroup]) -> Result<PathBuf> {
        let path = self.data_dir.join("duplicate_report.csv");
        let mut out = self.create(&path)?;

        writeln!(out, "original,duplicate")?;
        let mut rows = 0usize;
        for group in groups {
            for dup in &group.duplicates {
                writeln!(
                    out,
                    "{},{}",
                    csv_field(&group.original.path.to_string_lossy()),
                    csv_field(&dup.path.to_string_lossy())
                )?;
                rows += 1;
            }
        }

        info!("Wrote duplicate report: {} ({} rows)", path.display(), rows);
        Ok(path)
    }

    /// Write the unmatched-records report
    pub fn write_unmatched_report(&self, unmatched: &[MetadataRecord]) -> Result<PathBuf> {
        let path = self.data_dir.join("unmatched_report.csv");
        let mut out = self.create(&path)?;

        writeln!(out, "metadata_source,title")?;
        for record in unmatched {
            writeln!(
                out,
                "{},{}",
                csv_field(&record.source_path.to_string_lossy()),
                csv_field(&record.canonical_title)
            )?;
        }

        info!(
            "Wrote unmatched report: {} ({} rows)",
            path.display(),
            unmatched.len()
        );
        Ok(path)
    }

    fn create(&self, path: &Path) -> Result<File> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(File::create(path)?)
    }
}

/// Quote a CSV field when it contains a comma, quote, or newline
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MediaFile;
    use crate::pairing::MatchMethod;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn media(path: &str) -> MediaFile {
        MediaFile {
            path: path.into(),
            base_name: "x".into(),
            extension: "jpg".into(),
            size: 1,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    fn record(source: &str, title: &str) -> MetadataRecord {
        MetadataRecord {
            source_path: source.into(),
            canonical_title: title.into(),
            captured_at: None,
            latitude: None,
            longitude: None,
            description: None,
            raw_fields: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_pairing_report_format() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(&dir.path().join("data"));

        let pairs = vec![MatchPair {
            record: record("/src/a.jpg.json", "a.jpg"),
            file: media("/dst/a.jpg"),
            method: MatchMethod::Name,
            confidence: 0.95,
        }];

        let path = writer.write_pairing_report(&pairs).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "metadata_source,target_file,method,confidence\n/src/a.jpg.json,/dst/a.jpg,name,0.95\n"
        );
    }

    #[test]
    fn test_duplicate_report_one_row_per_edge() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(&dir.path().join("data"));

        let groups = vec![DuplicateGroup {
            original: media("/dst/keep.jpg"),
            duplicates: vec![media("/dst/d1.jpg"), media("/dst/d2.jpg")],
        }];

        let path = writer.write_duplicate_report(&groups).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "/dst/keep.jpg,/dst/d1.jpg");
        assert_eq!(lines[2], "/dst/keep.jpg,/dst/d2.jpg");
    }

    #[test]
    fn test_unmatched_report() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(&dir.path().join("data"));

        let path = writer
            .write_unmatched_report(&[record("/src/lost.jpg.json", "lost.jpg")])
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("/src/lost.jpg.json,lost.jpg"));
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(&dir.path().join("data"));

        let path = writer
            .write_unmatched_report(&[record("/src/trip, day 1/a.json", "a, b.jpg")])
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\"/src/trip, day 1/a.json\",\"a, b.jpg\""));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
