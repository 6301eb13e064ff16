//! Pairing orchestration
//!
//! Walks the metadata records and resolves each one to a target media file.
//! Name matching runs first because it is pure string work; content-hash
//! matching decodes files and is strictly a fallback, so the target-side
//! signature index is built lazily, once, the first time any record needs
//! it.
//!
//! A target file claimed by more than one record is pathological input, not
//! a crash: the highest-confidence (then first-encountered) pairing wins
//! and the losers are counted as conflicts.

use crate::core::error::{Result, SyncError};
use crate::core::stats::RunStats;
use crate::hash::{compute_batch, compute_signature, similarity, ContentSignature, HashCache};
use crate::index::{MediaFile, MediaIndex};
use crate::matching::match_name;
use crate::sidecar::MetadataRecord;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a pairing was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// Filename strategy ladder
    Name,
    /// Content-signature similarity fallback
    ContentHash,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMethod::Name => f.write_str("name"),
            MatchMethod::ContentHash => f.write_str("content-hash"),
        }
    }
}

/// One resolved record -> target file pairing
#[derive(Debug, Clone)]
pub struct MatchPair {
    pub record: MetadataRecord,
    pub file: MediaFile,
    pub method: MatchMethod,
    /// Confidence in [0, 1]; strategy confidence for name matches,
    /// measured similarity for content-hash matches
    pub confidence: f64,
}

/// Everything a pairing run produces
#[derive(Debug)]
pub struct PairingOutcome {
    pub pairs: Vec<MatchPair>,
    /// Records no strategy could resolve
    pub unmatched: Vec<MetadataRecord>,
    pub stats: RunStats,
}

/// Resolves metadata records against a target collection
pub struct PairingOrchestrator {
    /// Minimum similarity for the content-hash fallback
    content_threshold: f64,
}

impl PairingOrchestrator {
    pub fn new(content_threshold: f64) -> Self {
        Self { content_threshold }
    }

    /// Pair each record with a target file.
    ///
    /// Cancellation via `shutdown` is observed between records; records not
    /// yet examined are neither paired nor counted unmatched, and the
    /// partial outcome is returned as-is.
    pub fn pair(
        &self,
        records: Vec<MetadataRecord>,
        target: &MediaIndex,
        cache: &HashCache,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<PairingOutcome> {
        let mut stats = RunStats::default();
        let mut pairs: Vec<MatchPair> = Vec::new();
        let mut unmatched: Vec<MetadataRecord> = Vec::new();

        // Target path -> index into `pairs`, for conflict arbitration
        let mut claimed: HashMap<PathBuf, usize> = HashMap::new();

        // Built on first content-hash fallback, then reused
        let mut target_signatures: Option<HashMap<PathBuf, ContentSignature>> = None;

        let total = records.len();
        for record in records {
            if shutdown.load(Ordering::Relaxed) {
                info!(
                    "Pairing interrupted after {} of {} records",
                    stats.records_scanned, total
                );
                break;
            }

            stats.records_scanned += 1;
            let candidate = candidate_base_name(&record.canonical_title);

            if let Some(name_match) = match_name(&candidate, target) {
                let pair = MatchPair {
                    file: name_match.file.clone(),
                    confidence: name_match.confidence,
                    method: MatchMethod::Name,
                    record,
                };
                claim(pair, &mut pairs, &mut claimed, &mut unmatched, &mut stats);
                continue;
            }

            // Content fallback needs a readable source-side media file
            let source_file = record.media_path().filter(|p| p.is_file());
            let matched = match source_file {
                Some(source) => {
                    if target_signatures.is_none() {
                        target_signatures =
                            Some(build_target_signatures(target, cache, shutdown, &mut stats)?);
                    }
                    let signatures = target_signatures
                        .as_ref()
                        .ok_or_else(|| SyncError::CacheError("signature index unavailable".into()))?;
                    self.match_by_content(&source, cache, target, signatures, &mut stats)
                }
                None => None,
            };

            match matched {
                Some((file, confidence)) => {
                    let pair = MatchPair {
                        file,
                        confidence,
                        method: MatchMethod::ContentHash,
                        record,
                    };
                    claim(pair, &mut pairs, &mut claimed, &mut unmatched, &mut stats);
                }
                None => {
                    stats.unmatched += 1;
                    unmatched.push(record);
                }
            }
        }

        cache.flush()?;

        info!(
            "Paired {} records ({} by name, {} by content), {} unmatched, {} conflicts",
            pairs.len(),
            stats.matched_by_name,
            stats.matched_by_content,
            stats.unmatched,
            stats.conflicts
        );

        Ok(PairingOutcome { pairs, unmatched, stats })
    }

    /// Find the most similar target file at or above the threshold
    fn match_by_content(
        &self,
        source: &Path,
        cache: &HashCache,
        target: &MediaIndex,
        target_signatures: &HashMap<PathBuf, ContentSignature>,
        stats: &mut RunStats,
    ) -> Option<(MediaFile, f64)> {
        let source_sig = match cache.get(source) {
            Some(sig) => {
                stats.cache_hits += 1;
                sig
            }
            None => {
                let is_image = source
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| crate::index::is_image_extension(&e.to_lowercase()))
                    .unwrap_or(false);
                match compute_signature(source, is_image) {
                    Ok(result) => {
                        stats.signatures_computed += 1;
                        if result.decode_fallback {
                            stats.decode_fallbacks += 1;
                        }
                        cache.put(source, result.signature.clone());
                        result.signature
                    }
                    Err(e) => {
                        debug!("Cannot hash source {}: {}", source.display(), e);
                        return None;
                    }
                }
            }
        };

        let mut best: Option<(&MediaFile, f64)> = None;
        for file in target.files() {
            let sig = match target_signatures.get(&file.path) {
                Some(s) => s,
                None => continue,
            };
            let score = similarity(&source_sig, sig);
            if score < self.content_threshold {
                continue;
            }
            let better = match best {
                None => true,
                // Equal scores resolve to the lexicographically smaller path
                Some((best_file, best_score)) => {
                    score > best_score
                        || (score == best_score && file.path < best_file.path)
                }
            };
            if better {
                best = Some((file, score));
            }
        }

        best.map(|(file, score)| (file.clone(), score))
    }
}

/// Strip the recorded title down to a base name the matcher understands:
/// `"IMG_0001.jpg"` becomes `"IMG_0001"`.
fn candidate_base_name(title: &str) -> String {
    Path::new(title)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| title.to_string())
}

/// Compute signatures for the whole target collection
fn build_target_signatures(
    target: &MediaIndex,
    cache: &HashCache,
    shutdown: &Arc<AtomicBool>,
    stats: &mut RunStats,
) -> Result<HashMap<PathBuf, ContentSignature>> {
    info!(
        "Name matching exhausted; building content index for {} target files",
        target.len()
    );
    let refs: Vec<&MediaFile> = target.files().iter().collect();
    let signatures = compute_batch(&refs, cache, shutdown, stats, &|_, _| {});
    cache.flush()?;
    Ok(signatures)
}

/// Record a pairing, arbitrating when the target file is already claimed.
///
/// The higher-confidence pairing keeps the file; on equal confidence the
/// earlier pairing stands. The losing record joins `unmatched` and counts
/// both as a conflict and as unmatched, so the summary's unmatched total
/// always equals the unmatched report's row count.
fn claim(
    pair: MatchPair,
    pairs: &mut Vec<MatchPair>,
    claimed: &mut HashMap<PathBuf, usize>,
    unmatched: &mut Vec<MetadataRecord>,
    stats: &mut RunStats,
) {
    match claimed.get(&pair.file.path) {
        None => {
            claimed.insert(pair.file.path.clone(), pairs.len());
            count_match(&pair, stats);
            pairs.push(pair);
        }
        Some(&existing_idx) => {
            stats.conflicts += 1;
            stats.unmatched += 1;
            let existing = &mut pairs[existing_idx];
            warn!(
                "{} claimed by both {} and {}; keeping the higher-confidence pairing",
                pair.file.path.display(),
                existing.record.source_path.display(),
                pair.record.source_path.display()
            );
            if pair.confidence > existing.confidence {
                let loser = std::mem::replace(existing, pair);
                // Adjust method tallies: the replacement may differ
                uncount_match(&loser, stats);
                count_match(&pairs[existing_idx], stats);
                unmatched.push(loser.record);
            } else {
                unmatched.push(pair.record);
            }
        }
    }
}

fn count_match(pair: &MatchPair, stats: &mut RunStats) {
    match pair.method {
        MatchMethod::Name => stats.matched_by_name += 1,
        MatchMethod::ContentHash => stats.matched_by_content += 1,
    }
}

fn uncount_match(pair: &MatchPair, stats: &mut RunStats) {
    match pair.method {
        MatchMethod::Name => stats.matched_by_name -= 1,
        MatchMethod::ContentHash => stats.matched_by_content -= 1,
    }
}
