//! Core functionality module
//!
//! This module contains configuration management, error handling, and the
//! run-statistics accounting shared by the indexing, pairing, and duplicate
//! detection passes.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `stats` - Run counters and the end-of-run summary

pub mod config;
pub mod error;
pub mod stats;
