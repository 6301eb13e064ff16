//! Record-to-file pairing
//!
//! The orchestrator owns the control flow of a pairing run: name matching
//! first, lazy content-hash fallback second, conflict arbitration on top.

pub mod orchestrator;

pub use orchestrator::{MatchMethod, MatchPair, PairingOrchestrator, PairingOutcome};
