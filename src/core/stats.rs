//! Run statistics
//!
//! Every recoverable condition that is absorbed during a run increments a
//! counter here, so the end-of-run summary always accounts for every record
//! and file - nothing is dropped silently.

use log::info;

/// Counters accumulated over a pairing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Metadata records scanned
    pub records_scanned: usize,
    /// Pairs established by filename matching
    pub matched_by_name: usize,
    /// Pairs established by content-hash fallback
    pub matched_by_content: usize,
    /// Records left without a pairing: no match found, or lost a
    /// conflicting claim
    pub unmatched: usize,
    /// Target files claimed by more than one record; the losers are also
    /// counted in `unmatched`
    pub conflicts: usize,
    /// Sidecar files skipped as malformed
    pub skipped_sidecars: usize,
    /// Directory entries skipped due to read errors
    pub skipped_entries: usize,
    /// Images that fell back to a byte-sample signature after a decode error
    pub decode_fallbacks: usize,
    /// Signatures served from the cache instead of recomputed
    pub cache_hits: usize,
    /// Signatures computed this run
    pub signatures_computed: usize,
}

impl RunStats {
    /// Total pairs established by either method
    pub fn total_matched(&self) -> usize {
        self.matched_by_name + self.matched_by_content
    }

    /// Merge counters from another stats value (e.g. the indexing pass)
    pub fn absorb(&mut self, other: &RunStats) {
        self.records_scanned += other.records_scanned;
        self.matched_by_name += other.matched_by_name;
        self.matched_by_content += other.matched_by_content;
        self.unmatched += other.unmatched;
        self.conflicts += other.conflicts;
        self.skipped_sidecars += other.skipped_sidecars;
        self.skipped_entries += other.skipped_entries;
        self.decode_fallbacks += other.decode_fallbacks;
        self.cache_hits += other.cache_hits;
        self.signatures_computed += other.signatures_computed;
    }

    /// Log the end-of-run summary block
    pub fn log_summary(&self) {
        info!("==================================================");
        info!("Pairing Summary:");
        info!("  Records scanned:      {}", self.records_scanned);
        info!("  Matched by name:      {}", self.matched_by_name);
        info!("  Matched by content:   {}", self.matched_by_content);
        info!("  Unmatched:            {}", self.unmatched);
        if self.conflicts > 0 {
            info!(
                "  Conflicting claims:   {} (losers counted as unmatched)",
                self.conflicts
            );
        }
        if self.skipped_sidecars > 0 {
            info!("  Malformed sidecars:   {}", self.skipped_sidecars);
        }
        if self.skipped_entries > 0 {
            info!("  Unreadable entries:   {}", self.skipped_entries);
        }
        if self.decode_fallbacks > 0 {
            info!("  Decode fallbacks:     {}", self.decode_fallbacks);
        }
        info!(
            "  Signatures:           {} computed, {} cache hits",
            self.signatures_computed, self.cache_hits
        );
        info!("==================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_matched() {
        let stats = RunStats {
            matched_by_name: 3,
            matched_by_content: 2,
            ..Default::default()
        };
        assert_eq!(stats.total_matched(), 5);
    }

    #[test]
    fn test_absorb() {
        let mut a = RunStats {
            records_scanned: 10,
            unmatched: 1,
            ..Default::default()
        };
        let b = RunStats {
            records_scanned: 5,
            cache_hits: 7,
            ..Default::default()
        };
        a.absorb(&b);
        assert_eq!(a.records_scanned, 15);
        assert_eq!(a.unmatched, 1);
        assert_eq!(a.cache_hits, 7);
    }
}
