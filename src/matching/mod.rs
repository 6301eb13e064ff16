//! Filename-based matching
//!
//! Pure-function fuzzy matching between an exporter-recorded title and an
//! indexed media collection. Content hashing is deliberately kept out of
//! this module; it is the orchestrator's fallback, not the matcher's.

pub mod name;

pub use name::{match_name, NameMatch};
