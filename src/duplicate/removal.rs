//! Duplicate removal
//!
//! Consumes [`DuplicateGroup`]s produced by the detector and deletes the
//! redundant copies. Deletion is deliberately paranoid: each duplicate's
//! signature is recomputed and compared against the original's immediately
//! before removal, so a file that changed after detection is left alone.
//! The group's `original` is never touched.

use crate::core::error::Result;
use crate::duplicate::detector::DuplicateGroup;
use crate::hash::compute_signature;
use log::{info, warn};
use std::fs;

/// Outcome of a removal pass
#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Files deleted (or that would be deleted under dry-run)
    pub removed: usize,
    /// Bytes reclaimed (or reclaimable under dry-run)
    pub reclaimed_bytes: u64,
    /// Duplicates skipped because their content no longer matched
    pub verification_failures: usize,
    /// Duplicates skipped because deletion itself failed
    pub errors: usize,
}

/// Deletes verified duplicates from a set of groups
pub struct DuplicateRemover {
    dry_run: bool,
}

impl DuplicateRemover {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Remove the duplicates in each group, keeping every `original`.
    ///
    /// A duplicate is deleted only when its freshly computed signature still
    /// equals the original's; anything else is counted and skipped. Errors
    /// on individual files never abort the pass.
    pub fn remove(&self, groups: &[DuplicateGroup]) -> Result<RemovalReport> {
        let mut report = RemovalReport::default();

        for group in groups {
            let original_sig = match compute_signature(&group.original.path, group.original.is_image())
            {
                Ok(r) => r.signature,
                Err(e) => {
                    warn!(
                        "Cannot verify original {}; leaving its group intact: {}",
                        group.original.path.display(),
                        e
                    );
                    report.verification_failures += group.duplicates.len();
                    continue;
                }
            };

            for dup in &group.duplicates {
                let dup_sig = match compute_signature(&dup.path, dup.is_image()) {
                    Ok(r) => r.signature,
                    Err(e) => {
                        warn!("Cannot re-verify {}; skipping: {}", dup.path.display(), e);
                        report.verification_failures += 1;
                        continue;
                    }
                };

                if dup_sig != original_sig {
                    warn!(
                        "{} changed since detection; skipping removal",
                        dup.path.display()
                    );
                    report.verification_failures += 1;
                    continue;
                }

                if self.dry_run {
                    info!(
                        "[dry-run] would remove {} (duplicate of {})",
                        dup.path.display(),
                        group.original.path.display()
                    );
                    report.removed += 1;
                    report.reclaimed_bytes += dup.size;
                    continue;
                }

                match fs::remove_file(&dup.path) {
                    Ok(()) => {
                        info!(
                            "Removed {} (duplicate of {})",
                            dup.path.display(),
                            group.original.path.display()
                        );
                        report.removed += 1;
                        report.reclaimed_bytes += dup.size;
                    }
                    Err(e) => {
                        warn!("Failed to remove {}: {}", dup.path.display(), e);
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            "Removal pass{}: {} removed, {} skipped on verification, {} errors, {} bytes reclaimed",
            if self.dry_run { " (dry-run)" } else { "" },
            report.removed,
            report.verification_failures,
            report.errors,
            report.reclaimed_bytes
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MediaFile;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_media(dir: &Path, name: &str, data: &[u8]) -> MediaFile {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        MediaFile::from_path(&path).unwrap()
    }

    fn group(original: MediaFile, duplicates: Vec<MediaFile>) -> DuplicateGroup {
        DuplicateGroup { original, duplicates }
    }

    #[test]
    fn test_removes_verified_duplicate() {
        let dir = TempDir::new().unwrap();
        let payload = vec![1u8; 2000];
        let original = write_media(dir.path(), "keep.mp4", &payload);
        let dup = write_media(dir.path(), "drop.mp4", &payload);
        let dup_path = dup.path.clone();

        let report = DuplicateRemover::new(false)
            .remove(&[group(original.clone(), vec![dup])])
            .unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(report.reclaimed_bytes, 2000);
        assert!(!dup_path.exists());
        assert!(original.path.exists());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let payload = vec![2u8; 1500];
        let original = write_media(dir.path(), "keep.mp4", &payload);
        let dup = write_media(dir.path(), "drop.mp4", &payload);
        let dup_path = dup.path.clone();

        let report = DuplicateRemover::new(true)
            .remove(&[group(original, vec![dup])])
            .unwrap();

        assert_eq!(report.removed, 1);
        assert!(dup_path.exists());
    }

    #[test]
    fn test_changed_file_is_not_removed() {
        let dir = TempDir::new().unwrap();
        let payload = vec![3u8; 1000];
        let original = write_media(dir.path(), "keep.mp4", &payload);
        let dup = write_media(dir.path(), "drop.mp4", &payload);

        // File content diverged after detection
        fs::write(&dup.path, b"rewritten after the scan").unwrap();

        let report = DuplicateRemover::new(false)
            .remove(&[group(original, vec![dup.clone()])])
            .unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(report.verification_failures, 1);
        assert!(dup.path.exists());
    }

    #[test]
    fn test_missing_duplicate_counts_as_verification_failure() {
        let dir = TempDir::new().unwrap();
        let payload = vec![4u8; 1000];
        let original = write_media(dir.path(), "keep.mp4", &payload);
        let dup = write_media(dir.path(), "drop.mp4", &payload);
        fs::remove_file(&dup.path).unwrap();

        let report = DuplicateRemover::new(false)
            .remove(&[group(original, vec![dup])])
            .unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(report.verification_failures, 1);
    }
}
