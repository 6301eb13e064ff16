//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pair exported media files with their sidecar metadata, write the metadata
/// back with exiftool, and surface near-duplicate files for removal
#[derive(Parser, Debug)]
#[command(name = "photo-sync")]
#[command(version = "1.0.0")]
#[command(about = "Reconcile a sidecar-annotated media export with a second export of the same photos", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Simulate every destructive step (metadata writes, deletions)
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair metadata records with target files and write the metadata
    Pair {
        /// Source directory: media files plus JSON sidecars (overrides config)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Target directory: the collection to annotate (overrides config)
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Minimum similarity for the content-hash fallback (overrides config)
        #[arg(long, value_name = "RATIO")]
        content_threshold: Option<f64>,

        /// Pair only, skip the exiftool write phase
        #[arg(long)]
        skip_write: bool,

        /// Stop after this many records (0 = all)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Find (and optionally remove) near-duplicate files in the target
    Duplicates {
        /// Target directory to scan (overrides config)
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Minimum similarity for grouping (overrides config)
        #[arg(long, value_name = "RATIO")]
        threshold: Option<f64>,

        /// Delete the duplicates after re-verification
        #[arg(long)]
        remove: bool,
    },

    /// Index both collections and report what a pairing run would see
    Status {
        /// Source directory (overrides config)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Target directory (overrides config)
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Manage the configuration file
    ///
    /// The config file is stored at:
    /// - Linux/macOS: ~/.config/photo_sync_tool/config.toml
    /// - Windows: %APPDATA%\photo_sync_tool\config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without doing anything else
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Show current configuration
    ShowConfig,
}
