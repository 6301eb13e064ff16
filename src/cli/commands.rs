//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, print_error, print_header, print_info, print_step, print_success,
    print_warning, HashingProgress, IndexingSpinner,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::stats::RunStats;
use crate::duplicate::{DuplicateDetector, DuplicateGroup, DuplicateRemover};
use crate::hash::HashCache;
use crate::index::{FileIndexer, MediaFile};
use crate::pairing::PairingOrchestrator;
use crate::report::ReportWriter;
use crate::sidecar::{self, MetadataRecord};
use crate::writer::MetadataWriter;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(())
        }
        Some(Commands::Status { source, target }) => {
            status(config, source.as_deref(), target.as_deref())
        }
        Some(Commands::Duplicates { target, threshold, remove }) => find_duplicates(
            config,
            target.as_deref(),
            *threshold,
            *remove,
            args.dry_run,
            shutdown_flag,
        ),
        Some(Commands::Pair {
            source,
            target,
            content_threshold,
            skip_write,
            limit,
        }) => pair(
            config,
            source.as_deref(),
            target.as_deref(),
            *content_threshold,
            *skip_write,
            *limit,
            args.dry_run,
            shutdown_flag,
        ),
        // No subcommand runs the main pairing flow with config defaults
        None => pair(config, None, None, None, false, 0, args.dry_run, shutdown_flag),
    }
}

/// The full pairing flow: sidecars -> records -> pair -> reports -> writes
#[allow(clippy::too_many_arguments)]
fn pair(
    config: &Config,
    source_override: Option<&Path>,
    target_override: Option<&Path>,
    threshold_override: Option<f64>,
    skip_write: bool,
    limit: usize,
    dry_run: bool,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let source = source_override.unwrap_or(&config.directories.source_dir);
    let target = target_override.unwrap_or(&config.directories.target_dir);
    let threshold = threshold_override.unwrap_or(config.matching.content_threshold);

    print_header("Pairing Run");
    print_info(&format!("Source: {}", source.display()));
    print_info(&format!("Target: {}", target.display()));
    if dry_run {
        print_warning("Dry run: no metadata will be written");
    }

    let writer = MetadataWriter::new(
        &config.writer.exiftool,
        config.writer.preserve_originals,
        dry_run,
    );
    if !skip_write && !dry_run {
        // Fail before any expensive work if the write phase cannot happen
        let version = writer
            .check_available()
            .context("exiftool is required for the write phase (or pass --skip-write)")?;
        info!("Using exiftool {}", version);
    }

    let mut stats = RunStats::default();

    print_step(1, 4, "Loading sidecar metadata");
    let sidecars = FileIndexer::find_sidecars(source)?;
    let mut records = sidecar::load_records(&sidecars, &mut stats);
    if limit > 0 && records.len() > limit {
        info!("Limiting run to the first {} of {} records", limit, records.len());
        records.truncate(limit);
    }

    print_step(2, 4, "Indexing target collection");
    let spinner = IndexingSpinner::new("target collection");
    let target_index = FileIndexer::index(target)?;
    stats.skipped_entries += target_index.skipped_entries;
    spinner.finish(&format!("Indexed {} media files", target_index.len()));

    print_step(3, 4, "Pairing records with target files");
    let cache = load_cache(config);
    let orchestrator = PairingOrchestrator::new(threshold);
    let outcome = orchestrator.pair(records, &target_index, &cache, &shutdown)?;
    stats.absorb(&outcome.stats);

    let reports = ReportWriter::new(&config.directories.data_dir);
    reports.write_pairing_report(&outcome.pairs)?;
    reports.write_unmatched_report(&outcome.unmatched)?;

    if skip_write {
        print_info("Skipping the write phase (--skip-write)");
    } else {
        print_step(4, 4, "Writing metadata with exiftool");
        let report = writer.write_all(&outcome.pairs);
        print_success(&format!(
            "{} full writes, {} date-only, {} skipped, {} failed",
            report.full_writes, report.date_only_writes, report.skipped, report.failures
        ));
        if report.failures > 0 {
            print_warning(&format!(
                "{} files kept their old metadata; see the log for details",
                report.failures
            ));
        }
    }

    stats.log_summary();
    print_info(&describe_unmatched(&outcome.unmatched));
    print_success(&format!(
        "Paired {} of {} records",
        stats.total_matched(),
        stats.records_scanned
    ));

    Ok(())
}

/// Find duplicate groups in the target collection, optionally removing them
fn find_duplicates(
    config: &Config,
    target_override: Option<&Path>,
    threshold_override: Option<f64>,
    remove: bool,
    dry_run: bool,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let target = target_override
        .unwrap_or(&config.directories.target_dir)
        .to_path_buf();
    let threshold = threshold_override.unwrap_or(config.duplicates.similarity_threshold);

    print_header("Duplicate Scan");
    print_info(&format!("Target: {}", target.display()));
    print_info(&format!("Similarity threshold: {:.2}", threshold));

    // Overlap the directory walk with downstream work: the walker streams
    // files over a channel while this thread collects them
    let spinner = IndexingSpinner::new("target collection");
    let files = collect_streamed(&target)?;
    spinner.finish(&format!("Found {} media files", files.len()));

    let cache = load_cache(config);
    let mut stats = RunStats::default();
    let progress = HashingProgress::new(files.len() as u64);
    let groups = DuplicateDetector::find_duplicates(
        &files,
        threshold,
        &cache,
        &shutdown,
        &mut stats,
        |done, total| progress.update(done as u64, total as u64),
    )?;
    progress.finish();

    let reports = ReportWriter::new(&config.directories.data_dir);
    reports.write_duplicate_report(&groups)?;

    summarize_groups(&groups);

    if remove {
        let removal = DuplicateRemover::new(dry_run).remove(&groups)?;
        print_success(&format!(
            "{} duplicates removed{}, {} reclaimed",
            removal.removed,
            if dry_run { " (dry-run)" } else { "" },
            format_bytes(removal.reclaimed_bytes)
        ));
        if removal.verification_failures > 0 {
            print_warning(&format!(
                "{} files skipped: content changed since detection",
                removal.verification_failures
            ));
        }
    } else if !groups.is_empty() {
        print_info("Re-run with --remove to delete the duplicates");
    }

    stats.log_summary();
    Ok(())
}

/// Index both collections and report what a pairing run would see
fn status(
    config: &Config,
    source_override: Option<&Path>,
    target_override: Option<&Path>,
) -> Result<()> {
    let source = source_override.unwrap_or(&config.directories.source_dir);
    let target = target_override.unwrap_or(&config.directories.target_dir);

    print_header("Status");

    match FileIndexer::find_sidecars(source) {
        Ok(sidecars) => {
            let mut stats = RunStats::default();
            let records = sidecar::load_records(&sidecars, &mut stats);
            print_info(&format!(
                "Source {}: {} sidecars, {} parseable ({} with capture time, {} with GPS)",
                source.display(),
                sidecars.len(),
                records.len(),
                records.iter().filter(|r| r.captured_at.is_some()).count(),
                records.iter().filter(|r| r.has_location()).count(),
            ));
        }
        Err(e) => print_error(&format!("Source unavailable: {}", e)),
    }

    match FileIndexer::index(target) {
        Ok(index) => {
            let total_bytes: u64 = index.files().iter().map(|f| f.size).sum();
            print_info(&format!(
                "Target {}: {} media files, {}",
                target.display(),
                index.len(),
                format_bytes(total_bytes)
            ));
        }
        Err(e) => print_error(&format!("Target unavailable: {}", e)),
    }

    let cache = load_cache(config);
    print_info(&format!(
        "Signature cache {}: {} entries",
        config.hashing.cache_file.display(),
        cache.len()
    ));

    let writer = MetadataWriter::new(&config.writer.exiftool, config.writer.preserve_originals, true);
    match writer.check_available() {
        Ok(version) => print_info(&format!("exiftool {} available", version)),
        Err(_) => print_warning(&format!(
            "exiftool not found at '{}'; the write phase will fail",
            config.writer.exiftool
        )),
    }

    Ok(())
}

/// Walk `root` on a separate thread, collecting streamed files here
fn collect_streamed(root: &Path) -> Result<Vec<MediaFile>> {
    // Validate up front so the error surfaces on this thread
    if !root.is_dir() {
        anyhow::bail!("target directory not found: {}", root.display());
    }

    let (tx, rx) = crossbeam_channel::bounded(256);
    let walk_root = root.to_path_buf();
    let walker = thread::spawn(move || FileIndexer::stream(&walk_root, tx));

    let files: Vec<MediaFile> = rx.iter().collect();

    match walker.join() {
        Ok(Ok(skipped)) if skipped > 0 => {
            warn!("{} directory entries were unreadable and skipped", skipped);
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => anyhow::bail!("directory walker thread panicked"),
    }

    Ok(files)
}

fn load_cache(config: &Config) -> HashCache {
    HashCache::load(&config.hashing.cache_file, config.hashing.flush_batch_size)
}

fn summarize_groups(groups: &[DuplicateGroup]) {
    if groups.is_empty() {
        print_success("No duplicates found");
        return;
    }

    let redundant: usize = groups.iter().map(|g| g.duplicates.len()).sum();
    let reclaimable: u64 = groups.iter().map(|g| g.reclaimable_bytes()).sum();
    print_info(&format!(
        "{} groups, {} redundant files, {} reclaimable",
        groups.len(),
        redundant,
        format_bytes(reclaimable)
    ));

    for group in groups.iter().take(10) {
        print_info(&format!(
            "keep {} <- {} duplicate(s)",
            group.original.path.display(),
            group.duplicates.len()
        ));
    }
    if groups.len() > 10 {
        print_info(&format!("... and {} more groups (see the report)", groups.len() - 10));
    }
}

/// Handle the `config` subcommand
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let config = Config::default();
        let path = get_config_path().context("could not determine the config directory")?;
        config.save(&path)?;
        print_success(&format!("Config reset to defaults: {}", path.display()));
        return Ok(());
    }

    let path = init_config()?;
    if show_path {
        println!("{}", path.display());
    } else {
        print_info(&format!("Config file: {}", path.display()));
        print_info("Edit it with your editor of choice, or pass --reset for defaults");
    }
    Ok(())
}

/// Print the active configuration
pub fn show_config(config: &Config) {
    print_header("Current Configuration");

    println!("  [directories]");
    println!("    source_dir = {}", config.directories.source_dir.display());
    println!("    target_dir = {}", config.directories.target_dir.display());
    println!("    data_dir   = {}", config.directories.data_dir.display());
    println!();
    println!("  [matching]");
    println!("    content_threshold = {}", config.matching.content_threshold);
    println!();
    println!("  [hashing]");
    println!("    cache_file       = {}", config.hashing.cache_file.display());
    println!("    flush_batch_size = {}", config.hashing.flush_batch_size);
    println!();
    println!("  [duplicates]");
    println!("    similarity_threshold = {}", config.duplicates.similarity_threshold);
    println!();
    println!("  [writer]");
    println!("    exiftool           = {}", config.writer.exiftool);
    println!("    preserve_originals = {}", config.writer.preserve_originals);
    println!();
    println!("  [logging]");
    println!("    level       = {}", config.logging.level);
    println!("    log_to_file = {}", config.logging.log_to_file);
    println!("    log_file    = {}", config.logging.log_file.display());

    let active = Config::get_active_config_path();
    println!();
    print_info(&format!("Loaded from: {}", active.display()));
}

/// One-line unmatched summary for console output
fn describe_unmatched(records: &[MetadataRecord]) -> String {
    match records.len() {
        0 => "all records matched".to_string(),
        1 => format!("1 unmatched record: {}", records[0].canonical_title),
        n => format!("{} unmatched records (see unmatched_report.csv)", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_unmatched() {
        assert_eq!(describe_unmatched(&[]), "all records matched");
    }
}
