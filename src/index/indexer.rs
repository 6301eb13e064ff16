//! Directory walking and media index construction
//!
//! The index carries two lookup keys per file:
//!
//! 1. the **normalized** base name - lower-cased, with a trailing edit
//!    suffix like `" (1)"` stripped - used by the name matcher, and
//! 2. the **raw** lower-cased base name with the suffix retained, so that
//!    true numbered duplicates (`vacation.jpg` / `vacation (1).jpg`) remain
//!    individually discoverable.

use crate::core::error::{Result, SyncError};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Supported image extensions (perceptual hashing applies to these)
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif", "heic", "heif",
];

/// Supported video extensions (byte-sample signatures only)
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "3gp", "wmv", "webm",
];

/// Check whether a lower-cased extension belongs to an image format
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

/// Check whether a lower-cased extension belongs to any supported media format
pub fn is_media_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext) || VIDEO_EXTENSIONS.contains(&ext)
}

/// Strip a trailing edit suffix like `" (1)"` or `"(2)"` from a base name.
///
/// Exporters append these when a collection contains several files with the
/// same stem. Returns the input unchanged when no suffix is present.
pub fn strip_edit_suffix(base: &str) -> &str {
    let trimmed = base.trim_end();
    if !trimmed.ends_with(')') {
        return base;
    }
    if let Some(open) = trimmed.rfind('(') {
        let inner = &trimmed[open + 1..trimmed.len() - 1];
        if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
            return trimmed[..open].trim_end();
        }
    }
    base
}

/// Normalize a base name for lookup: lower-case, edit suffix stripped
pub fn normalize_base_name(base: &str) -> String {
    strip_edit_suffix(base).to_lowercase()
}

/// One media file as seen during an index pass.
///
/// Immutable once indexed; re-derived on each full scan.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Filename minus extension, minus any `" (N)"` edit suffix
    pub base_name: String,
    /// Lower-cased extension without the dot
    pub extension: String,
    /// Size in bytes
    pub size: u64,
    /// Last-modified time
    pub modified: SystemTime,
}

impl MediaFile {
    /// Build a `MediaFile` from a path, reading its metadata
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            base_name: strip_edit_suffix(&stem).to_string(),
            extension,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }

    /// Whether this file is an image (candidate for perceptual hashing)
    pub fn is_image(&self) -> bool {
        is_image_extension(&self.extension)
    }
}

/// Lookup structures for one media collection
#[derive(Debug, Default)]
pub struct MediaIndex {
    /// All indexed media files
    files: Vec<MediaFile>,

    /// Normalized base name (suffix stripped) -> file indices
    by_normalized: HashMap<String, Vec<usize>>,

    /// Raw lower-cased base name (suffix retained) -> file indices
    by_raw: HashMap<String, Vec<usize>>,

    /// Directory entries skipped due to read errors during the walk
    pub skipped_entries: usize,
}

impl MediaIndex {
    fn add(&mut self, file: MediaFile, raw_stem: &str) {
        let idx = self.files.len();
        self.by_normalized
            .entry(normalize_base_name(raw_stem))
            .or_default()
            .push(idx);
        self.by_raw
            .entry(raw_stem.to_lowercase())
            .or_default()
            .push(idx);
        self.files.push(file);
    }

    /// All indexed files
    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    /// Number of indexed files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the index holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up files by normalized base name (suffix-stripped key)
    pub fn get_normalized(&self, key: &str) -> impl Iterator<Item = &MediaFile> {
        self.by_normalized
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&i| &self.files[i])
    }

    /// Look up files by raw lower-cased base name (suffix retained)
    pub fn get_raw(&self, key: &str) -> impl Iterator<Item = &MediaFile> {
        self.by_raw
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&i| &self.files[i])
    }

    /// Iterate over all normalized keys and their files
    pub fn iter_normalized(&self) -> impl Iterator<Item = (&str, impl Iterator<Item = &MediaFile>)> {
        self.by_normalized.iter().map(move |(k, indices)| {
            (k.as_str(), indices.iter().map(move |&i| &self.files[i]))
        })
    }
}

/// Walks a directory tree and builds a [`MediaIndex`]
pub struct FileIndexer;

impl FileIndexer {
    /// Index all media files under `root`.
    ///
    /// Hidden files, sidecar `.json` files, and non-media extensions are
    /// excluded. Fails only when `root` itself cannot be opened.
    pub fn index(root: &Path) -> Result<MediaIndex> {
        if !root.is_dir() {
            return Err(SyncError::RootNotFound(root.to_path_buf()));
        }

        let mut index = MediaIndex::default();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    index.skipped_entries += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_hidden(path) {
                continue;
            }

            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_lowercase(),
                None => continue,
            };
            if !is_media_extension(&ext) {
                debug!("Skipping non-media file: {}", path.display());
                continue;
            }

            let raw_stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            match MediaFile::from_path(path) {
                Ok(file) => index.add(file, &raw_stem),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    index.skipped_entries += 1;
                }
            }
        }

        info!(
            "Indexed {} media files under {} ({} entries skipped)",
            index.len(),
            root.display(),
            index.skipped_entries
        );

        Ok(index)
    }

    /// Walk `root` and send discovered media files down a channel.
    ///
    /// Used to overlap the I/O-bound directory walk with signature
    /// computation on the receiving side. Returns the number of entries
    /// skipped due to read errors.
    pub fn stream(root: &Path, tx: crossbeam_channel::Sender<MediaFile>) -> Result<usize> {
        if !root.is_dir() {
            return Err(SyncError::RootNotFound(root.to_path_buf()));
        }

        let mut skipped = 0usize;

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() || is_hidden(entry.path()) {
                continue;
            }

            let ext = match entry.path().extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_lowercase(),
                None => continue,
            };
            if !is_media_extension(&ext) {
                continue;
            }

            match MediaFile::from_path(entry.path()) {
                Ok(file) => {
                    // Receiver gone means the consumer stopped early; not an error
                    if tx.send(file).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    skipped += 1;
                }
            }
        }

        Ok(skipped)
    }

    /// Discover sidecar metadata files under `root`.
    ///
    /// Recognizes `*.supplemental-metadata.json`, `*.supplemental-meta.json`,
    /// and plain `<media>.<ext>.json` companions.
    pub fn find_sidecars(root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(SyncError::RootNotFound(root.to_path_buf()));
        }

        let mut sidecars = Vec::new();

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if is_hidden(path) {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if name.ends_with(".json") && looks_like_sidecar(name) {
                sidecars.push(path.to_path_buf());
            }
        }

        info!("Found {} sidecar files under {}", sidecars.len(), root.display());
        Ok(sidecars)
    }
}

/// A sidecar names the media file it describes: `IMG_0001.jpg.json` or
/// `IMG_0001.jpg.supplemental-metadata.json`. Anything else with a .json
/// extension (album manifests, print-order files) is not a sidecar.
fn looks_like_sidecar(name: &str) -> bool {
    if name.contains(".supplemental-metadata.json") || name.contains(".supplemental-meta.json") {
        return true;
    }
    let stem = name.trim_end_matches(".json");
    stem.rsplit('.')
        .next()
        .map(|ext| is_media_extension(&ext.to_lowercase()))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
