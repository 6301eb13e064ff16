//! Duplicate grouping within one media collection
//!
//! Three-stage pass bounded by a coarse size pre-filter:
//!
//! 1. **Size buckets**: files are keyed by size rounded to 10 KiB; files in
//!    different buckets are never compared.
//! 2. **Exact signature match**: within a bucket, identical signatures form
//!    a group regardless of the similarity threshold. This catches
//!    byte-identical copies and pixel-identical re-saves.
//! 3. **Pairwise similarity**: image files left over as singletons are
//!    compared pairwise; a pair at or above the threshold joins one group.
//!
//! The survivor (`original`) of each group is the file with the earliest
//! modification time, ties broken by lexicographically smaller path. A file
//! never lands in two groups. Detection only reports; removal is a separate
//! step in [`super::removal`].

use crate::core::error::Result;
use crate::core::stats::RunStats;
use crate::hash::{compute_batch, similarity, ContentSignature, HashCache};
use crate::index::MediaFile;
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Size bucket granularity; files whose sizes round to different multiples
/// of this are never compared
const SIZE_BUCKET: u64 = 10 * 1024;

/// A canonical file plus the redundant copies of it
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Survivor: earliest modification time, then smaller path
    pub original: MediaFile,
    /// Files considered redundant copies of `original`
    pub duplicates: Vec<MediaFile>,
}

impl DuplicateGroup {
    /// Total number of files in the group, survivor included
    pub fn len(&self) -> usize {
        self.duplicates.len() + 1
    }

    /// Bytes that removing the duplicates would reclaim
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicates.iter().map(|f| f.size).sum()
    }
}

/// Groups near-duplicate files within one collection
pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Find duplicate groups among `files`.
    ///
    /// `threshold` applies only to the pairwise perceptual comparison;
    /// exact signature matches always group. Signatures come from `cache`
    /// when present and are computed (and cached) otherwise. Setting
    /// `shutdown` stops new signature work between items; files hashed so
    /// far still participate, so the result is a valid partial answer.
    pub fn find_duplicates<F>(
        files: &[MediaFile],
        threshold: f64,
        cache: &HashCache,
        shutdown: &Arc<AtomicBool>,
        stats: &mut RunStats,
        progress: F,
    ) -> Result<Vec<DuplicateGroup>>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        // Stage 1: size buckets. Singleton buckets need no signatures.
        let mut buckets: HashMap<u64, Vec<&MediaFile>> = HashMap::new();
        for file in files {
            buckets.entry(bucket_key(file.size)).or_default().push(file);
        }
        buckets.retain(|_, members| members.len() > 1);

        let mut candidates: Vec<&MediaFile> = buckets.values().flatten().copied().collect();
        // Deterministic work order keeps repeated runs byte-for-byte equal
        candidates.sort_by(|a, b| a.path.cmp(&b.path));

        if candidates.is_empty() {
            info!("No size-bucket collisions among {} files; no duplicates possible", files.len());
            return Ok(Vec::new());
        }

        debug!(
            "{} of {} files share a size bucket; computing signatures",
            candidates.len(),
            files.len()
        );

        let signatures = compute_batch(&candidates, cache, shutdown, stats, &progress);
        cache.flush()?;

        // Stages 2 and 3 run per bucket
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for members in buckets.values_mut() {
            members.sort_by(|a, b| a.path.cmp(&b.path));
            group_bucket(members, &signatures, threshold, &mut groups);
        }

        groups.sort_by(|a, b| a.original.path.cmp(&b.original.path));

        info!(
            "Found {} duplicate groups covering {} redundant files",
            groups.len(),
            groups.iter().map(|g| g.duplicates.len()).sum::<usize>()
        );

        Ok(groups)
    }
}

fn bucket_key(size: u64) -> u64 {
    (size + SIZE_BUCKET / 2) / SIZE_BUCKET
}

/// Group one size bucket: exact matches first, then pairwise similarity
/// among leftover image singletons.
fn group_bucket(
    members: &[&MediaFile],
    signatures: &HashMap<PathBuf, ContentSignature>,
    threshold: f64,
    groups: &mut Vec<DuplicateGroup>,
) {
    // Exact signature match, always grouped
    let mut by_signature: HashMap<&ContentSignature, Vec<&MediaFile>> = HashMap::new();
    for file in members {
        if let Some(sig) = signatures.get(&file.path) {
            by_signature.entry(sig).or_default().push(file);
        }
    }

    let mut singletons: Vec<(&MediaFile, &ContentSignature)> = Vec::new();
    let mut exact: Vec<Vec<&MediaFile>> = Vec::new();
    for (sig, matched) in by_signature {
        if matched.len() > 1 {
            exact.push(matched);
        } else if matched[0].is_image() {
            singletons.push((matched[0], sig));
        }
    }
    // HashMap iteration order is arbitrary; restore determinism
    exact.sort_by(|a, b| a[0].path.cmp(&b[0].path));
    singletons.sort_by(|a, b| a.0.path.cmp(&b.0.path));

    for matched in exact {
        groups.push(build_group(matched));
    }

    // Pairwise similarity among remaining images. Greedy over the sorted
    // list: each unassigned file seeds a group and pulls in everything at
    // or above the threshold.
    let mut assigned = vec![false; singletons.len()];
    for i in 0..singletons.len() {
        if assigned[i] {
            continue;
        }
        let mut matched = vec![singletons[i].0];
        for j in (i + 1)..singletons.len() {
            if assigned[j] {
                continue;
            }
            if similarity(singletons[i].1, singletons[j].1) >= threshold {
                matched.push(singletons[j].0);
                assigned[j] = true;
            }
        }
        if matched.len() > 1 {
            groups.push(build_group(matched));
        }
    }
}

/// Pick the survivor and assemble a group
fn build_group(mut matched: Vec<&MediaFile>) -> DuplicateGroup {
    matched.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    let original = matched[0].clone();
    let duplicates = matched[1..].iter().map(|f| (*f).clone()).collect();
    DuplicateGroup { original, duplicates }
}
