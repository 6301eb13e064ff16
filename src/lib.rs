//! Photo Sync Tool Library
//!
//! Reconciles two unordered exports of the same media collection: a source
//! export carrying per-file JSON sidecar metadata, and a target export with
//! the same photos but no reliable dates. Each target file is paired with
//! the sidecar record that describes it, the recovered metadata is written
//! back with exiftool, and near-duplicate target files are surfaced for
//! removal.
//!
//! # Architecture
//!
//! - [`core`] - Configuration, error types, and run statistics
//! - [`index`] - Directory walking and media index construction
//! - [`matching`] - Fuzzy filename matching strategy ladder
//! - [`hash`] - Perceptual/byte-sample signatures and the persistent cache
//! - [`duplicate`] - Duplicate detection and verified removal
//! - [`pairing`] - The orchestrator tying records to target files
//! - [`sidecar`] - Sidecar JSON parsing into metadata records
//! - [`writer`] - exiftool front-end for metadata writes
//! - [`report`] - CSV run artifacts
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photo_sync_tool::hash::HashCache;
//! use photo_sync_tool::index::FileIndexer;
//! use photo_sync_tool::pairing::PairingOrchestrator;
//! use photo_sync_tool::sidecar;
//! use photo_sync_tool::core::stats::RunStats;
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut stats = RunStats::default();
//!     let sidecars = FileIndexer::find_sidecars(Path::new("./old"))?;
//!     let records = sidecar::load_records(&sidecars, &mut stats);
//!
//!     let target = FileIndexer::index(Path::new("./new"))?;
//!     let cache = HashCache::load(Path::new("./data/signature_cache.csv"), 500);
//!
//!     let shutdown = Arc::new(AtomicBool::new(false));
//!     let outcome = PairingOrchestrator::new(0.98).pair(records, &target, &cache, &shutdown)?;
//!     println!("{} pairs, {} unmatched", outcome.pairs.len(), outcome.unmatched.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod duplicate;
pub mod hash;
pub mod index;
pub mod matching;
pub mod pairing;
pub mod report;
pub mod sidecar;
pub mod writer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
