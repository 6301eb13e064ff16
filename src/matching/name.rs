//! Fuzzy filename matcher
//!
//! Given a candidate base name (from a sidecar's recorded title) and a
//! target index, returns the best filename-based match using an ordered
//! sequence of strategies. The first strategy that fires wins; each
//! strategy tries all candidates before giving up, and there is no
//! backtracking across strategies.
//!
//! Strategy ladder and confidences:
//!
//! 1. Exact match on the raw base name (1.0); a hit that needs the
//!    edit-suffix-stripped key reports 0.95
//! 2. Prefix-stripped match - `IMG_`, `VID_`, `image_`, `video_` (0.95)
//! 3. Edited-variant match - exporter `E`-infix copies (0.9)
//! 4. Containment match with a minimum length floor (0.6)
//! 5. Numeric-sequence match on a shared >=4-digit run (0.5)
//! 6. Approximate match - character-overlap ratio >= 0.7 (0.4)
//!
//! Strategies 4-6 never run on cleaned strings shorter than 3 characters;
//! short stems produce too many false positives to be worth it.

use crate::index::{normalize_base_name, MediaFile, MediaIndex};

/// Exporter prefixes tried by the prefix-stripped strategy
const STRIP_PREFIXES: &[&str] = &["IMG_", "VID_", "image_", "video_"];

/// Minimum cleaned-string length for the fuzzy strategies (4-6)
const MIN_FUZZY_LEN: usize = 3;

/// Minimum substring length for a containment match
const MIN_CONTAINMENT_LEN: usize = 5;

/// Minimum shared digit-run length for the numeric-sequence strategy
const MIN_DIGIT_RUN: usize = 4;

/// Character-overlap ratio required by the approximate strategy
const MIN_OVERLAP_RATIO: f64 = 0.7;

/// A successful filename match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameMatch<'a> {
    /// The matched target file
    pub file: &'a MediaFile,
    /// Confidence of the strategy that fired, in [0, 1]
    pub confidence: f64,
}

/// Match a candidate base name against a target index.
///
/// Returns `None` when no strategy fires. Deterministic for a given index:
/// within a strategy, ties are broken by lexicographically smaller path.
pub fn match_name<'a>(candidate: &str, index: &'a MediaIndex) -> Option<NameMatch<'a>> {
    let normalized = normalize_base_name(candidate);
    if normalized.is_empty() {
        return None;
    }

    // 1. Exact match. The raw suffix-retained key is consulted first so a
    //    title that itself carries an edit suffix lands on the right copy.
    //    A hit that exists only under the normalized key means an edit
    //    suffix had to be stripped on one side, so it is not quite exact.
    if let Some(file) = first_by_path(index.get_raw(&candidate.to_lowercase())) {
        return Some(NameMatch { file, confidence: 1.0 });
    }
    if let Some(file) = first_by_path(index.get_normalized(&normalized)) {
        return Some(NameMatch { file, confidence: 0.95 });
    }

    // 2. Prefix-stripped retry of the exact match
    for prefix in STRIP_PREFIXES {
        if let Some(stripped) = strip_prefix_ci(&normalized, prefix) {
            if stripped.is_empty() {
                continue;
            }
            if let Some(file) = first_by_path(index.get_normalized(stripped)) {
                return Some(NameMatch { file, confidence: 0.95 });
            }
        }
    }

    // 3. Edited-variant match: IMG_1234 <-> IMG_E1234
    for variant in edited_variants(&normalized) {
        if let Some(file) = first_by_path(index.get_normalized(&variant)) {
            return Some(NameMatch { file, confidence: 0.9 });
        }
    }

    let cleaned = clean(&normalized);
    if cleaned.len() < MIN_FUZZY_LEN {
        return None;
    }

    // 4. Containment: candidate inside an indexed name or vice versa
    if normalized.len() >= MIN_CONTAINMENT_LEN {
        let mut best: Option<&MediaFile> = None;
        for (key, files) in index.iter_normalized() {
            if key.len() < MIN_CONTAINMENT_LEN {
                continue;
            }
            if key.contains(&normalized) || normalized.contains(key) {
                for file in files {
                    best = smaller_path(best, file);
                }
            }
        }
        if let Some(file) = best {
            return Some(NameMatch { file, confidence: 0.6 });
        }
    }

    // 5. Numeric-sequence: exporter renames that keep an internal photo id
    if let Some(run) = digit_run(&normalized) {
        let mut best: Option<&MediaFile> = None;
        for (key, files) in index.iter_normalized() {
            if digit_run(key) == Some(run) {
                for file in files {
                    best = smaller_path(best, file);
                }
            }
        }
        if let Some(file) = best {
            return Some(NameMatch { file, confidence: 0.5 });
        }
    }

    // 6. Approximate: character overlap between cleaned strings
    let mut best: Option<(&MediaFile, f64)> = None;
    for (key, files) in index.iter_normalized() {
        let key_cleaned = clean(key);
        if key_cleaned.len() < MIN_FUZZY_LEN || !similar_length(&cleaned, &key_cleaned) {
            continue;
        }
        let ratio = overlap_ratio(&cleaned, &key_cleaned);
        if ratio >= MIN_OVERLAP_RATIO {
            for file in files {
                let replace = match best {
                    None => true,
                    Some((current, best_ratio)) => {
                        ratio > best_ratio || (ratio == best_ratio && file.path < current.path)
                    }
                };
                if replace {
                    best = Some((file, ratio));
                }
            }
        }
    }
    best.map(|(file, _)| NameMatch { file, confidence: 0.4 })
}

/// Pick the lexicographically-smallest path out of an iterator
fn first_by_path<'a>(files: impl Iterator<Item = &'a MediaFile>) -> Option<&'a MediaFile> {
    files.min_by(|a, b| a.path.cmp(&b.path))
}

fn smaller_path<'a>(current: Option<&'a MediaFile>, other: &'a MediaFile) -> Option<&'a MediaFile> {
    match current {
        Some(c) if c.path <= other.path => Some(c),
        _ => Some(other),
    }
}

/// Case-insensitive prefix strip; input is already lower-cased
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.strip_prefix(&prefix.to_lowercase())
}

/// Candidate keys for the edited-copy naming convention.
///
/// Apple-style edited exports infix an `E` after the `IMG_` prefix
/// (`IMG_1234` -> `IMG_E1234`); both directions are tried.
fn edited_variants(normalized: &str) -> Vec<String> {
    let mut variants = Vec::new();
    if let Some(rest) = normalized.strip_prefix("img_") {
        if let Some(unedited) = rest.strip_prefix('e') {
            variants.push(format!("img_{}", unedited));
        } else {
            variants.push(format!("img_e{}", rest));
        }
    }
    variants
}

/// Keep only alphanumeric characters
fn clean(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Longest run of consecutive ASCII digits, if at least `MIN_DIGIT_RUN` long
fn digit_run(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut start = None;

    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start.get_or_insert(i);
        } else if let Some(s0) = start.take() {
            if best.map_or(true, |(b0, b1)| i - s0 > b1 - b0) {
                best = Some((s0, i));
            }
        }
    }
    if let Some(s0) = start {
        if best.map_or(true, |(b0, b1)| bytes.len() - s0 > b1 - b0) {
            best = Some((s0, bytes.len()));
        }
    }

    best.filter(|(s0, s1)| s1 - s0 >= MIN_DIGIT_RUN)
        .map(|(s0, s1)| &s[s0..s1])
}

/// Lengths within a factor of two of each other
fn similar_length(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long.len() <= short.len() * 2
}

/// Fraction of the shorter string's characters present in the longer one,
/// consuming each match so repeats are not double-counted
fn overlap_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let mut pool: Vec<char> = long.chars().collect();
    let mut hits = 0usize;
    for c in short.chars() {
        if let Some(pos) = pool.iter().position(|&p| p == c) {
            pool.swap_remove(pos);
            hits += 1;
        }
    }
    hits as f64 / short.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FileIndexer;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn index_of(names: &[&str]) -> (TempDir, crate::index::MediaIndex) {
        let dir = TempDir::new().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let index = FileIndexer::index(dir.path()).unwrap();
        (dir, index)
    }

    #[test]
    fn test_exact_match() {
        let (_dir, index) = index_of(&["vacation.jpg", "other.jpg"]);
        let m = match_name("Vacation", &index).unwrap();
        assert_eq!(m.confidence, 1.0);
        assert!(m.file.path.ends_with("vacation.jpg"));
    }

    #[test]
    fn test_suffixed_target_matches_below_exact_tier() {
        // The exporter title "vacation" must still find "vacation (1).jpg",
        // but stripping the edit suffix costs the exact-match confidence
        let (_dir, index) = index_of(&["vacation (1).jpg"]);
        let m = match_name("vacation", &index).unwrap();
        assert_eq!(m.confidence, 0.95);
        assert!(m.file.path.ends_with("vacation (1).jpg"));
    }

    #[test]
    fn test_suffixed_title_matches_plain_target_below_exact_tier() {
        let (_dir, index) = index_of(&["vacation.jpg"]);
        let m = match_name("vacation (1)", &index).unwrap();
        assert_eq!(m.confidence, 0.95);
    }

    #[test]
    fn test_suffixed_title_prefers_its_own_copy() {
        let (_dir, index) = index_of(&["vacation.jpg", "vacation (1).jpg"]);
        let m = match_name("vacation (1)", &index).unwrap();
        assert_eq!(m.confidence, 1.0);
        assert!(m.file.path.ends_with("vacation (1).jpg"));
    }

    #[test]
    fn test_prefix_stripped_match() {
        let (_dir, index) = index_of(&["20210301_120000.jpg"]);
        let m = match_name("IMG_20210301_120000", &index).unwrap();
        assert_eq!(m.confidence, 0.95);
    }

    #[test]
    fn test_edited_variant_match() {
        let (_dir, index) = index_of(&["IMG_E1234.jpg"]);
        let m = match_name("IMG_1234", &index).unwrap();
        assert_eq!(m.confidence, 0.9);

        let (_dir2, index2) = index_of(&["IMG_5678.jpg"]);
        let m2 = match_name("IMG_E5678", &index2).unwrap();
        assert_eq!(m2.confidence, 0.9);
    }

    #[test]
    fn test_containment_match() {
        let (_dir, index) = index_of(&["beach-sunset-2021.jpg"]);
        let m = match_name("sunset-2021", &index);
        // "sunset-2021" is contained in the indexed name
        let m = m.unwrap();
        assert_eq!(m.confidence, 0.6);
    }

    #[test]
    fn test_numeric_sequence_match() {
        let (_dir, index) = index_of(&["photo-export-38291-final.jpg"]);
        let m = match_name("DSC_38291", &index).unwrap();
        assert_eq!(m.confidence, 0.5);
    }

    #[test]
    fn test_short_digit_run_does_not_fire() {
        let (_dir, index) = index_of(&["pic-123-a.jpg"]);
        // Shared 3-digit run is below the floor; approximate match is also
        // out of reach, so the lookup fails
        assert!(match_name("zzz123", &index).is_none());
    }

    #[test]
    fn test_approximate_match() {
        let (_dir, index) = index_of(&["holiday2021.jpg"]);
        let m = match_name("holiday-202", &index).unwrap();
        assert_eq!(m.confidence, 0.4);
    }

    #[test]
    fn test_short_candidates_never_fuzzy_match() {
        let (_dir, index) = index_of(&["ab.jpg", "abc.jpg"]);
        assert!(match_name("zz", &index).is_none());
    }

    #[test]
    fn test_no_match() {
        let (_dir, index) = index_of(&["vacation.jpg"]);
        assert!(match_name("zzz_no_such_file", &index).is_none());
    }

    #[test]
    fn test_deterministic_tie_break() {
        let (_dir, index) = index_of(&["dup.jpg", "dup.png"]);
        let m = match_name("dup", &index).unwrap();
        // Lexicographically smaller path wins
        assert_eq!(
            m.file.path.file_name().unwrap(),
            Path::new("dup.jpg").file_name().unwrap()
        );
    }

    #[test]
    fn test_digit_run_helper() {
        assert_eq!(digit_run("img_20210301"), Some("20210301"));
        assert_eq!(digit_run("a123b45678c"), Some("45678"));
        assert_eq!(digit_run("abc"), None);
        assert_eq!(digit_run("a123b"), None);
    }

    #[test]
    fn test_overlap_ratio_helper() {
        assert_eq!(overlap_ratio("abc", "abc"), 1.0);
        assert_eq!(overlap_ratio("abc", "xyz"), 0.0);
        assert!(overlap_ratio("holiday202", "holiday2021") > 0.9);
    }
}
