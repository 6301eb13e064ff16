//! Media file indexing
//!
//! Walks a directory tree, classifies files as media vs. non-media, and
//! builds lookup structures keyed by normalized basename. Indexing is a pure
//! read: it never mutates the file system, and unreadable directories are
//! skipped with a warning rather than aborting the walk.

pub mod indexer;

pub use indexer::{
    is_image_extension, is_media_extension, normalize_base_name, strip_edit_suffix, FileIndexer,
    MediaFile, MediaIndex,
};
