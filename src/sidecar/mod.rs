//! Sidecar metadata loading
//!
//! Export tools drop one JSON sidecar next to each media file, carrying the
//! original filename, capture time, and GPS position. This module parses
//! those sidecars into [`MetadataRecord`]s. Fields the pairing engine does
//! not interpret are kept verbatim in `raw_fields` so downstream consumers
//! (the metadata writer, reports) can still see them.
//!
//! Malformed sidecars are skipped with a warning and a counter bump; they
//! never abort a run.

use crate::core::error::{Result, SyncError};
use crate::core::stats::RunStats;
use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar filename suffixes, longest first so stripping is unambiguous
const SIDECAR_SUFFIXES: &[&str] = &[
    ".supplemental-metadata.json",
    ".supplemental-meta.json",
    ".json",
];

/// Parsed metadata for one source media item.
///
/// Read-only after creation.
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    /// The sidecar file this record came from
    pub source_path: PathBuf,
    /// Original filename as recorded by the exporter
    pub canonical_title: String,
    /// Capture timestamp, when the sidecar carries one
    pub captured_at: Option<DateTime<Utc>>,
    /// GPS position; absent when the exporter wrote the 0,0 placeholder
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Free-form description
    pub description: Option<String>,
    /// Every sidecar field, untouched, for collaborator use
    pub raw_fields: serde_json::Map<String, Value>,
}

impl MetadataRecord {
    /// Parse one sidecar file
    pub fn from_sidecar(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::SidecarError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let value: Value =
            serde_json::from_str(&content).map_err(|e| SyncError::SidecarError {
                path: path.to_path_buf(),
                message: format!("invalid JSON: {}", e),
            })?;

        let fields = match value {
            Value::Object(map) => map,
            _ => {
                return Err(SyncError::SidecarError {
                    path: path.to_path_buf(),
                    message: "top-level value is not an object".to_string(),
                })
            }
        };

        let canonical_title = fields
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::SidecarError {
                path: path.to_path_buf(),
                message: "missing title".to_string(),
            })?;

        // photoTakenTime is the capture moment; creationTime is only the
        // upload moment and is used as a fallback
        let captured_at = parse_timestamp(&fields, "photoTakenTime")
            .or_else(|| parse_timestamp(&fields, "creationTime"));

        let (latitude, longitude) = parse_geo(&fields);

        let description = fields
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|d| !d.is_empty());

        Ok(Self {
            source_path: path.to_path_buf(),
            canonical_title,
            captured_at,
            latitude,
            longitude,
            description,
            raw_fields: fields,
        })
    }

    /// Path of the media file this sidecar describes, derived from the
    /// sidecar's own name. The file may or may not exist.
    pub fn media_path(&self) -> Option<PathBuf> {
        let name = self.source_path.file_name()?.to_str()?;
        for suffix in SIDECAR_SUFFIXES {
            if let Some(stem) = name.strip_suffix(suffix) {
                if !stem.is_empty() {
                    return Some(self.source_path.with_file_name(stem));
                }
            }
        }
        None
    }

    /// Whether the record carries a usable GPS position
    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Parse `{"<key>": {"timestamp": "1621512345"}}`; the exporter writes the
/// epoch value as a string
fn parse_timestamp(fields: &serde_json::Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = fields.get(key)?.get("timestamp")?;
    let secs = match raw {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

/// Extract `geoData.latitude/longitude`. The exporter writes `0.0, 0.0`
/// when no position was recorded, so that pair reads as absent.
fn parse_geo(fields: &serde_json::Map<String, Value>) -> (Option<f64>, Option<f64>) {
    let geo = match fields.get("geoData") {
        Some(g) => g,
        None => return (None, None),
    };
    let lat = geo.get("latitude").and_then(Value::as_f64);
    let lon = geo.get("longitude").and_then(Value::as_f64);
    match (lat, lon) {
        (Some(la), Some(lo)) if la != 0.0 || lo != 0.0 => (Some(la), Some(lo)),
        _ => (None, None),
    }
}

/// Load all records from a list of sidecar paths.
///
/// Malformed sidecars are skipped and counted; the returned order follows
/// the input order.
pub fn load_records(paths: &[PathBuf], stats: &mut RunStats) -> Vec<MetadataRecord> {
    let mut records = Vec::with_capacity(paths.len());

    for path in paths {
        match MetadataRecord::from_sidecar(path) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping sidecar: {}", e);
                stats.skipped_sidecars += 1;
            }
        }
    }

    info!(
        "Loaded {} metadata records ({} sidecars skipped)",
        records.len(),
        stats.skipped_sidecars
    );
    records
}
