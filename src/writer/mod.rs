//! Metadata writing via exiftool
//!
//! Applies a paired record's date, GPS position, and title to the target
//! file by shelling out to exiftool. EXIF/XMP encoding is never done here;
//! exiftool is the single source of truth for the container formats.
//!
//! Writes follow a two-step retry ladder: a full write (date + GPS + title)
//! that fails because exiftool rejected a tag is retried once with date
//! fields only, because date metadata is the one thing the whole pairing
//! exercise exists to restore and some containers reject GPS or title tags.
//! Any other failure (unreadable file, bad binary, exiftool internal error)
//! would fail identically on a retry and goes straight to `Failed`. A
//! failed date-only write is final.

use crate::core::error::{Result, SyncError};
use crate::pairing::MatchPair;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::Path;
use std::process::Command;

/// Which field set an attempt carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Date + GPS + title
    Full,
    /// Date fields only
    DateOnly,
}

/// Why an exiftool invocation failed
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteFailure {
    /// exiftool rejected a specific tag; a reduced field set may succeed
    FieldRejected(String),
    /// Anything else; a retry with fewer fields would fail the same way
    Other(String),
}

impl WriteFailure {
    fn into_message(self) -> String {
        match self {
            WriteFailure::FieldRejected(m) | WriteFailure::Other(m) => m,
        }
    }
}

/// stderr fragments that mark a tag-level rejection rather than a file- or
/// invocation-level failure
const FIELD_REJECTION_MARKERS: &[&str] = &["not writable", "not defined", "no writable tags"];

fn classify_failure(stderr: &str) -> WriteFailure {
    let lowered = stderr.to_lowercase();
    if FIELD_REJECTION_MARKERS.iter().any(|m| lowered.contains(m)) {
        WriteFailure::FieldRejected(stderr.to_string())
    } else {
        WriteFailure::Other(stderr.to_string())
    }
}

/// Final outcome of writing one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All fields written
    Full,
    /// Full write failed; the date-only retry succeeded
    DateOnly,
    /// The record carries no writable fields
    Nothing,
    /// Both attempts failed
    Failed(String),
}

/// Tallies for a write pass
#[derive(Debug, Default)]
pub struct WriteReport {
    pub full_writes: usize,
    pub date_only_writes: usize,
    pub skipped: usize,
    pub failures: usize,
}

/// Thin front-end over the exiftool binary
pub struct MetadataWriter {
    exiftool: String,
    preserve_originals: bool,
    dry_run: bool,
}

impl MetadataWriter {
    pub fn new(exiftool: &str, preserve_originals: bool, dry_run: bool) -> Self {
        Self {
            exiftool: exiftool.to_string(),
            preserve_originals,
            dry_run,
        }
    }

    /// Verify the exiftool binary is invocable; returns its version string
    pub fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.exiftool)
            .arg("-ver")
            .output()
            .map_err(|_| SyncError::ExifToolMissing)?;
        if !output.status.success() {
            return Err(SyncError::ExifToolMissing);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Write one pair's metadata into its target file
    pub fn write_pair(&self, pair: &MatchPair) -> WriteOutcome {
        let record = &pair.record;

        let full_args = build_args(
            record.captured_at.as_ref(),
            record.latitude.zip(record.longitude),
            Some(record.canonical_title.as_str()),
            self.preserve_originals,
        );
        if full_args.is_empty() {
            debug!("{}: nothing to write", record.source_path.display());
            return WriteOutcome::Nothing;
        }

        match self.run_exiftool(&full_args, &pair.file.path, Attempt::Full) {
            Ok(()) => return WriteOutcome::Full,
            Err(WriteFailure::Other(e)) => WriteOutcome::Failed(e),
            Err(WriteFailure::FieldRejected(first_error)) => {
                let date_args =
                    build_args(record.captured_at.as_ref(), None, None, self.preserve_originals);
                if date_args.is_empty() || date_args == full_args {
                    // No reduced field set left to retry with
                    return WriteOutcome::Failed(first_error);
                }
                warn!(
                    "exiftool rejected a tag for {} ({}); retrying with date fields only",
                    pair.file.path.display(),
                    first_error
                );
                match self.run_exiftool(&date_args, &pair.file.path, Attempt::DateOnly) {
                    Ok(()) => WriteOutcome::DateOnly,
                    Err(second_error) => WriteOutcome::Failed(second_error.into_message()),
                }
            }
        }
    }

    /// Write a whole batch, accumulating a report. Individual failures are
    /// recorded, never retried beyond the per-pair ladder, and never abort
    /// the pass.
    pub fn write_all(&self, pairs: &[MatchPair]) -> WriteReport {
        let mut report = WriteReport::default();
        for pair in pairs {
            match self.write_pair(pair) {
                WriteOutcome::Full => report.full_writes += 1,
                WriteOutcome::DateOnly => report.date_only_writes += 1,
                WriteOutcome::Nothing => report.skipped += 1,
                WriteOutcome::Failed(e) => {
                    warn!("Metadata write failed for {}: {}", pair.file.path.display(), e);
                    report.failures += 1;
                }
            }
        }
        info!(
            "Metadata writes: {} full, {} date-only, {} skipped, {} failed",
            report.full_writes, report.date_only_writes, report.skipped, report.failures
        );
        report
    }

    fn run_exiftool(
        &self,
        args: &[String],
        target: &Path,
        attempt: Attempt,
    ) -> std::result::Result<(), WriteFailure> {
        if self.dry_run {
            info!(
                "[dry-run] {} {} {} ({:?})",
                self.exiftool,
                args.join(" "),
                target.display(),
                attempt
            );
            return Ok(());
        }

        let output = Command::new(&self.exiftool)
            .args(args)
            .arg(target)
            .output()
            .map_err(|e| WriteFailure::Other(format!("failed to invoke {}: {}", self.exiftool, e)))?;

        if output.status.success() {
            debug!("exiftool ok for {} ({:?})", target.display(), attempt);
            Ok(())
        } else {
            Err(classify_failure(
                String::from_utf8_lossy(&output.stderr).trim(),
            ))
        }
    }
}

/// Assemble the exiftool argument list for one write.
///
/// Returns an empty list when no field is present; the caller treats that
/// as nothing-to-write rather than invoking exiftool with no tags.
fn build_args(
    captured_at: Option<&DateTime<Utc>>,
    position: Option<(f64, f64)>,
    title: Option<&str>,
    preserve_originals: bool,
) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(ts) = captured_at {
        let stamp = ts.format("%Y:%m:%d %H:%M:%S").to_string();
        args.push(format!("-DateTimeOriginal={}", stamp));
        args.push(format!("-CreateDate={}", stamp));
        args.push(format!("-ModifyDate={}", stamp));
    }

    if let Some((lat, lon)) = position {
        args.push(format!("-GPSLatitude={}", lat.abs()));
        args.push(format!("-GPSLatitudeRef={}", if lat >= 0.0 { "N" } else { "S" }));
        args.push(format!("-GPSLongitude={}", lon.abs()));
        args.push(format!("-GPSLongitudeRef={}", if lon >= 0.0 { "E" } else { "W" }));
    }

    if let Some(t) = title {
        if !t.is_empty() {
            args.push(format!("-Title={}", t));
        }
    }

    if args.is_empty() {
        return args;
    }

    if !preserve_originals {
        args.push("-overwrite_original".to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MediaFile;
    use crate::pairing::{MatchMethod, MatchPair};
    use crate::sidecar::MetadataRecord;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 20, 12, 30, 45).unwrap()
    }

    /// A pair whose record carries a date and a title, so the full and
    /// date-only argument lists differ
    fn fixture_pair(dir: &Path) -> MatchPair {
        let sidecar = dir.join("a.jpg.json");
        fs::write(
            &sidecar,
            r#"{"title": "a.jpg", "photoTakenTime": {"timestamp": "1621512345"}}"#,
        )
        .unwrap();
        let media = dir.join("a.jpg");
        fs::write(&media, b"x").unwrap();

        MatchPair {
            record: MetadataRecord::from_sidecar(&sidecar).unwrap(),
            file: MediaFile::from_path(&media).unwrap(),
            method: MatchMethod::Name,
            confidence: 1.0,
        }
    }

    /// Script standing in for exiftool: appends one line to `log` per
    /// invocation, prints `stderr_line`, and exits nonzero
    #[cfg(unix)]
    fn failing_exiftool(dir: &Path, log: &Path, stderr_line: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("exiftool-fake");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho run >> '{}'\necho '{}' >&2\nexit 1\n",
                log.display(),
                stderr_line
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().to_string()
    }

    fn invocations(log: &Path) -> usize {
        fs::read_to_string(log).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn test_full_args() {
        let args = build_args(Some(&ts()), Some((40.7128, -74.0060)), Some("IMG_0001.jpg"), false);

        assert!(args.contains(&"-DateTimeOriginal=2021:05:20 12:30:45".to_string()));
        assert!(args.contains(&"-CreateDate=2021:05:20 12:30:45".to_string()));
        assert!(args.contains(&"-ModifyDate=2021:05:20 12:30:45".to_string()));
        assert!(args.contains(&"-GPSLatitude=40.7128".to_string()));
        assert!(args.contains(&"-GPSLatitudeRef=N".to_string()));
        assert!(args.contains(&"-GPSLongitude=74.006".to_string()));
        assert!(args.contains(&"-GPSLongitudeRef=W".to_string()));
        assert!(args.contains(&"-Title=IMG_0001.jpg".to_string()));
        assert_eq!(args.last().unwrap(), "-overwrite_original");
    }

    #[test]
    fn test_southern_hemisphere_refs() {
        let args = build_args(None, Some((-33.8688, 151.2093)), None, false);
        assert!(args.contains(&"-GPSLatitudeRef=S".to_string()));
        assert!(args.contains(&"-GPSLongitudeRef=E".to_string()));
        assert!(args.contains(&"-GPSLatitude=33.8688".to_string()));
    }

    #[test]
    fn test_preserve_originals_omits_overwrite_flag() {
        let args = build_args(Some(&ts()), None, None, true);
        assert!(!args.iter().any(|a| a == "-overwrite_original"));
        assert!(!args.is_empty());
    }

    #[test]
    fn test_no_fields_yields_empty_args() {
        assert!(build_args(None, None, None, false).is_empty());
        assert!(build_args(None, None, Some(""), false).is_empty());
    }

    #[test]
    fn test_date_only_args_subset() {
        let full = build_args(Some(&ts()), Some((1.0, 2.0)), Some("t.jpg"), false);
        let date_only = build_args(Some(&ts()), None, None, false);
        assert!(date_only.len() < full.len());
        assert!(date_only.iter().all(|a| full.contains(a)));
    }

    #[test]
    fn test_dry_run_never_invokes_exiftool() {
        let dir = TempDir::new().unwrap();
        let pair = fixture_pair(dir.path());

        // A nonexistent binary would fail loudly if dry-run ever invoked it
        let writer = MetadataWriter::new("/nonexistent/exiftool-binary", false, true);
        assert_eq!(writer.write_pair(&pair), WriteOutcome::Full);
    }

    #[test]
    fn test_missing_exiftool_reported() {
        let writer = MetadataWriter::new("/nonexistent/exiftool-binary", false, false);
        assert!(matches!(
            writer.check_available(),
            Err(SyncError::ExifToolMissing)
        ));
    }

    #[test]
    fn test_title_alone_is_writable() {
        let args = build_args(None, None, Some("a.jpg"), false);
        assert_eq!(args, vec!["-Title=a.jpg", "-overwrite_original"]);
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("Warning: Sorry, GPSLatitude is not writable"),
            WriteFailure::FieldRejected(_)
        ));
        assert!(matches!(
            classify_failure("Warning: Tag 'Frobnicate' is not defined"),
            WriteFailure::FieldRejected(_)
        ));
        assert!(matches!(
            classify_failure("Error: File not found - a.jpg"),
            WriteFailure::Other(_)
        ));
        assert!(matches!(classify_failure(""), WriteFailure::Other(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_level_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("invocations.log");
        let script = failing_exiftool(dir.path(), &log, "Error: File not found - a.jpg");
        let pair = fixture_pair(dir.path());

        let writer = MetadataWriter::new(&script, false, false);
        let outcome = writer.write_pair(&pair);

        assert!(matches!(outcome, WriteOutcome::Failed(ref m) if m.contains("File not found")));
        // A failure exiftool did not blame on a tag gets no second attempt
        assert_eq!(invocations(&log), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_tag_rejection_triggers_date_only_retry() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("invocations.log");
        let script = failing_exiftool(dir.path(), &log, "Warning: Sorry, Title is not writable");
        let pair = fixture_pair(dir.path());

        let writer = MetadataWriter::new(&script, false, false);
        let outcome = writer.write_pair(&pair);

        // Both attempts fail here, but the tag rejection earned the retry
        assert!(matches!(outcome, WriteOutcome::Failed(_)));
        assert_eq!(invocations(&log), 2);
    }
}
