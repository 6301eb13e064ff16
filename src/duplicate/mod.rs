//! Near-duplicate detection and removal within one collection
//!
//! Detection ([`detector`]) only reports groups; removal ([`removal`]) is a
//! separate, explicitly invoked step with its own verification.

pub mod detector;
pub mod removal;

pub use detector::{DuplicateDetector, DuplicateGroup};
pub use removal::{DuplicateRemover, RemovalReport};
