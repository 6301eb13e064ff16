//! Persistent signature cache
//!
//! Flat text file, one record per line: `path,algorithm,value`. The cache
//! is loaded once into an immutable snapshot at the start of a run; new
//! signatures land in a mutex-guarded overlay and are flushed in batches
//! from the orchestrating thread. A crash mid-run loses at most one batch
//! of recomputation and never corrupts the file (writes go through a
//! temporary file plus rename).
//!
//! Entries are never invalidated automatically: a changed file behind a
//! stale entry is an accepted risk. Delete the cache file to force
//! recomputation.

use crate::core::error::{Result, SyncError};
use crate::hash::signature::{ContentSignature, SignatureAlgorithm};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Persistent path -> signature mapping
#[derive(Debug)]
pub struct HashCache {
    /// Cache file on disk
    file: PathBuf,

    /// Snapshot loaded at startup; read lock-free for the whole run
    loaded: HashMap<PathBuf, ContentSignature>,

    /// Signatures computed this run
    fresh: Mutex<HashMap<PathBuf, ContentSignature>>,

    /// Entries added since the last flush
    dirty: AtomicUsize,

    /// Flush to disk after this many new entries
    flush_batch: usize,
}

impl HashCache {
    /// Create a cache bound to `file`, loading whatever is already there.
    ///
    /// A missing or unreadable file is an empty cache, never an error;
    /// corrupt lines are skipped individually.
    pub fn load(file: &Path, flush_batch: usize) -> Self {
        let mut loaded = HashMap::new();

        match fs::read_to_string(file) {
            Ok(content) => {
                let mut bad_lines = 0usize;
                for line in content.lines() {
                    match parse_line(line) {
                        Some((path, sig)) => {
                            loaded.insert(path, sig);
                        }
                        None => {
                            if !line.trim().is_empty() {
                                bad_lines += 1;
                            }
                        }
                    }
                }
                if bad_lines > 0 {
                    warn!("Skipped {} corrupt cache lines in {}", bad_lines, file.display());
                }
                info!("Loaded {} cached signatures from {}", loaded.len(), file.display());
            }
            Err(e) => {
                info!(
                    "No usable signature cache at {} ({}); starting empty",
                    file.display(),
                    e
                );
            }
        }

        Self {
            file: file.to_path_buf(),
            loaded,
            fresh: Mutex::new(HashMap::new()),
            dirty: AtomicUsize::new(0),
            flush_batch: flush_batch.max(1),
        }
    }

    /// Look up a signature. Checks the startup snapshot first, then the
    /// signatures computed this run.
    pub fn get(&self, path: &Path) -> Option<ContentSignature> {
        if let Some(sig) = self.loaded.get(path) {
            return Some(sig.clone());
        }
        self.fresh.lock().ok()?.get(path).cloned()
    }

    /// Record a freshly computed signature
    pub fn put(&self, path: &Path, sig: ContentSignature) {
        if let Ok(mut fresh) = self.fresh.lock() {
            if fresh.insert(path.to_path_buf(), sig).is_none() {
                self.dirty.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of entries visible (snapshot + this run)
    pub fn len(&self) -> usize {
        self.loaded.len() + self.fresh.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries added since the last flush
    pub fn pending(&self) -> usize {
        self.dirty.load(Ordering::Relaxed)
    }

    /// Flush if a full batch of new entries has accumulated.
    ///
    /// Call only from the orchestrating thread; worker threads go through
    /// [`put`](Self::put) and never touch the disk.
    pub fn maybe_flush(&self) -> Result<()> {
        if self.pending() >= self.flush_batch {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the full cache (snapshot + overlay) back to disk
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SyncError::CacheError(e.to_string()))?;
            }
        }

        let tmp = self.file.with_extension("csv.tmp");
        {
            let mut out = fs::File::create(&tmp).map_err(|e| SyncError::CacheError(e.to_string()))?;
            let fresh = self
                .fresh
                .lock()
                .map_err(|_| SyncError::CacheError("cache lock poisoned".to_string()))?;
            for (path, sig) in self.loaded.iter().chain(fresh.iter()) {
                writeln!(
                    out,
                    "{},{},{}",
                    path.display(),
                    sig.algorithm.as_tag(),
                    sig.value
                )
                .map_err(|e| SyncError::CacheError(e.to_string()))?;
            }
        }
        fs::rename(&tmp, &self.file).map_err(|e| SyncError::CacheError(e.to_string()))?;

        let flushed = self.dirty.swap(0, Ordering::Relaxed);
        if flushed > 0 {
            info!("Flushed {} new signatures to {}", flushed, self.file.display());
        }
        Ok(())
    }
}

/// Parse one `path,algorithm,value` line. The path may itself contain
/// commas, so the line is split from the right.
fn parse_line(line: &str) -> Option<(PathBuf, ContentSignature)> {
    let mut parts = line.trim_end().rsplitn(3, ',');
    let value = parts.next()?;
    let algorithm = SignatureAlgorithm::from_tag(parts.next()?)?;
    let path = parts.next()?;

    if path.is_empty() || value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some((
        PathBuf::from(path),
        ContentSignature {
            algorithm,
            value: value.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sig(value: &str) -> ContentSignature {
        ContentSignature {
            algorithm: SignatureAlgorithm::Perceptual,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::load(&dir.path().join("none.csv"), 10);
        assert!(cache.is_empty());
        assert!(cache.get(Path::new("/a.jpg")).is_none());
    }

    #[test]
    fn test_put_get_flush_reload() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache.csv");

        let cache = HashCache::load(&file, 10);
        cache.put(Path::new("/photos/a.jpg"), sig("00ff00ff00ff00ff"));
        assert_eq!(cache.get(Path::new("/photos/a.jpg")).unwrap().value, "00ff00ff00ff00ff");
        cache.flush().unwrap();

        let reloaded = HashCache::load(&file, 10);
        assert_eq!(reloaded.len(), 1);
        let got = reloaded.get(Path::new("/photos/a.jpg")).unwrap();
        assert_eq!(got.algorithm, SignatureAlgorithm::Perceptual);
        assert_eq!(got.value, "00ff00ff00ff00ff");
    }

    #[test]
    fn test_corrupt_file_does_not_crash() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache.csv");
        fs::write(&file, b"\x00\xffgarbage\nnot,enough\n,,\n").unwrap();

        let cache = HashCache::load(&file, 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped_good_lines_kept() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache.csv");
        fs::write(
            &file,
            "/a.jpg,perceptual,00ff00ff00ff00ff\nbroken line\n/b.mp4,byte-sample,abcd\n/c.jpg,md5,ffff\n",
        )
        .unwrap();

        let cache = HashCache::load(&file, 10);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Path::new("/a.jpg")).is_some());
        assert!(cache.get(Path::new("/b.mp4")).is_some());
        // Unknown algorithm tag is a corrupt line
        assert!(cache.get(Path::new("/c.jpg")).is_none());
    }

    #[test]
    fn test_path_with_comma_roundtrips() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache.csv");
        let odd = Path::new("/photos/trip, day 1/a.jpg");

        let cache = HashCache::load(&file, 10);
        cache.put(odd, sig("0123456789abcdef"));
        cache.flush().unwrap();

        let reloaded = HashCache::load(&file, 10);
        assert!(reloaded.get(odd).is_some());
    }

    #[test]
    fn test_maybe_flush_respects_batch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("cache.csv");

        let cache = HashCache::load(&file, 3);
        cache.put(Path::new("/a.jpg"), sig("01"));
        cache.put(Path::new("/b.jpg"), sig("02"));
        cache.maybe_flush().unwrap();
        assert!(!file.exists());

        cache.put(Path::new("/c.jpg"), sig("03"));
        cache.maybe_flush().unwrap();
        assert!(file.exists());
        assert_eq!(cache.pending(), 0);
    }

    #[test]
    fn test_duplicate_put_counts_once() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::load(&dir.path().join("cache.csv"), 10);
        cache.put(Path::new("/a.jpg"), sig("01"));
        cache.put(Path::new("/a.jpg"), sig("02"));
        assert_eq!(cache.pending(), 1);
        assert_eq!(cache.len(), 1);
    }
}
