//! Batch signature computation over a worker pool
//!
//! One shared implementation feeds both the duplicate detector and the
//! pairing orchestrator's content-hash fallback. Worker threads consult and
//! populate the cache's in-memory side only; flushing to disk stays with
//! the calling thread.

use crate::core::stats::RunStats;
use crate::hash::cache::HashCache;
use crate::hash::signature::{compute_signature, ContentSignature};
use crate::index::MediaFile;
use log::{info, trace};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Compute (or fetch from cache) signatures for every file, in parallel.
///
/// Setting `shutdown` stops new work between items; in-flight computations
/// finish and are included, so the result is a usable partial map. Files
/// that cannot be read are omitted. `progress` receives `(done, total)`
/// every 50 items and at the end.
pub fn compute_batch<F>(
    files: &[&MediaFile],
    cache: &HashCache,
    shutdown: &Arc<AtomicBool>,
    stats: &mut RunStats,
    progress: &F,
) -> HashMap<PathBuf, ContentSignature>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let total = files.len();
    let done = AtomicUsize::new(0);
    let cache_hits = AtomicUsize::new(0);
    let computed = AtomicUsize::new(0);
    let fallbacks = AtomicUsize::new(0);

    let signatures: HashMap<PathBuf, ContentSignature> = files
        .par_iter()
        .filter_map(|file| {
            if shutdown.load(Ordering::Relaxed) {
                return None;
            }

            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            if current % 50 == 0 || current == total {
                progress(current, total);
            }

            if let Some(sig) = cache.get(&file.path) {
                cache_hits.fetch_add(1, Ordering::Relaxed);
                return Some((file.path.clone(), sig));
            }

            match compute_signature(&file.path, file.is_image()) {
                Ok(result) => {
                    computed.fetch_add(1, Ordering::Relaxed);
                    if result.decode_fallback {
                        fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                    cache.put(&file.path, result.signature.clone());
                    Some((file.path.clone(), result.signature))
                }
                Err(e) => {
                    trace!("Could not hash {}: {}", file.path.display(), e);
                    None
                }
            }
        })
        .collect();

    stats.cache_hits += cache_hits.load(Ordering::Relaxed);
    stats.signatures_computed += computed.load(Ordering::Relaxed);
    stats.decode_fallbacks += fallbacks.load(Ordering::Relaxed);

    if shutdown.load(Ordering::Relaxed) {
        info!(
            "Signature pass interrupted after {} of {} files; continuing with partial set",
            signatures.len(),
            total
        );
    }

    signatures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_media(dir: &Path, name: &str, data: &[u8]) -> MediaFile {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        MediaFile::from_path(&path).unwrap()
    }

    #[test]
    fn test_batch_computes_and_caches() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::load(&dir.path().join("cache.csv"), 100);
        let a = write_media(dir.path(), "a.mp4", b"aaaa");
        let b = write_media(dir.path(), "b.mp4", b"bbbb");
        let refs: Vec<&MediaFile> = vec![&a, &b];

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut stats = RunStats::default();
        let sigs = compute_batch(&refs, &cache, &shutdown, &mut stats, &|_, _| {});

        assert_eq!(sigs.len(), 2);
        assert_eq!(stats.signatures_computed, 2);
        assert_eq!(cache.pending(), 2);

        // Second pass is all cache hits
        let mut stats2 = RunStats::default();
        let sigs2 = compute_batch(&refs, &cache, &shutdown, &mut stats2, &|_, _| {});
        assert_eq!(sigs2.len(), 2);
        assert_eq!(stats2.cache_hits, 2);
        assert_eq!(stats2.signatures_computed, 0);
    }

    #[test]
    fn test_unreadable_file_omitted() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::load(&dir.path().join("cache.csv"), 100);
        let a = write_media(dir.path(), "a.mp4", b"aaaa");
        let mut gone = a.clone();
        gone.path = dir.path().join("missing.mp4");
        let refs: Vec<&MediaFile> = vec![&a, &gone];

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut stats = RunStats::default();
        let sigs = compute_batch(&refs, &cache, &shutdown, &mut stats, &|_, _| {});
        assert_eq!(sigs.len(), 1);
    }
}
