//! Signature computation and comparison
//!
//! Perceptual signatures are an 8x8 average hash: decode, convert to
//! grayscale, shrink to an 8x8 grid, then emit one bit per cell marking
//! whether it is brighter than the grid mean. Two re-encodes of the same
//! photo differ by only a few bits, compared via Hamming distance.
//!
//! Byte-sample signatures hash the file size together with the first 1 KiB
//! of content. They carry no similarity notion - equal or not.

use image::imageops::FilterType;
use log::debug;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Perceptual hash grid edge; the hash is HASH_SIZE * HASH_SIZE bits
const HASH_SIZE: u32 = 8;

/// Bytes sampled from the head of the file for byte-sample signatures
const SAMPLE_BYTES: usize = 1024;

/// How a signature was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// 8x8 average hash over a grayscale decode; similarity via Hamming distance
    Perceptual,
    /// SHA-256 over (file size, first 1 KiB); exact match only
    ByteSample,
}

impl SignatureAlgorithm {
    /// Stable tag used in the cache file format
    pub fn as_tag(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Perceptual => "perceptual",
            SignatureAlgorithm::ByteSample => "byte-sample",
        }
    }

    /// Parse a cache-file tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "perceptual" => Some(SignatureAlgorithm::Perceptual),
            "byte-sample" => Some(SignatureAlgorithm::ByteSample),
            _ => None,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A content-similarity signature for one file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentSignature {
    /// Algorithm that produced the value
    pub algorithm: SignatureAlgorithm,
    /// Hex encoding of the hash value
    pub value: String,
}

impl ContentSignature {
    /// Build a perceptual signature from a raw 64-bit hash
    pub fn perceptual(bits: u64) -> Self {
        Self {
            algorithm: SignatureAlgorithm::Perceptual,
            value: format!("{:016x}", bits),
        }
    }

    /// Build a byte-sample signature from a digest
    fn byte_sample(digest: &[u8]) -> Self {
        Self {
            algorithm: SignatureAlgorithm::ByteSample,
            value: digest.iter().map(|b| format!("{:02x}", b)).collect(),
        }
    }
}

/// Outcome of a signature computation
#[derive(Debug)]
pub struct SignatureResult {
    pub signature: ContentSignature,
    /// True when an image failed to decode and fell back to byte-sampling
    pub decode_fallback: bool,
}

/// Compute the similarity signature for a file.
///
/// `is_image` selects the perceptual path; a decode failure there degrades
/// to the byte-sample signature instead of failing the caller.
pub fn compute_signature(path: &Path, is_image: bool) -> std::io::Result<SignatureResult> {
    if is_image {
        match perceptual_hash(path) {
            Ok(bits) => {
                return Ok(SignatureResult {
                    signature: ContentSignature::perceptual(bits),
                    decode_fallback: false,
                })
            }
            Err(e) => {
                debug!("Could not decode {} ({}); using byte sample", path.display(), e);
                return byte_sample_signature(path).map(|signature| SignatureResult {
                    signature,
                    decode_fallback: true,
                });
            }
        }
    }
    byte_sample_signature(path).map(|signature| SignatureResult {
        signature,
        decode_fallback: false,
    })
}

/// Similarity between two signatures, in [0, 1].
///
/// Perceptual pairs use `1 - hamming/64`; byte-sample pairs are binary;
/// mixed algorithms never compare and always yield 0.0.
pub fn similarity(a: &ContentSignature, b: &ContentSignature) -> f64 {
    match (a.algorithm, b.algorithm) {
        (SignatureAlgorithm::Perceptual, SignatureAlgorithm::Perceptual) => {
            let (Ok(ha), Ok(hb)) = (
                u64::from_str_radix(&a.value, 16),
                u64::from_str_radix(&b.value, 16),
            ) else {
                return 0.0;
            };
            let max_distance = (HASH_SIZE * HASH_SIZE) as f64;
            1.0 - (ha ^ hb).count_ones() as f64 / max_distance
        }
        (SignatureAlgorithm::ByteSample, SignatureAlgorithm::ByteSample) => {
            if a.value == b.value {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// 8x8 average hash of an image file
fn perceptual_hash(path: &Path) -> image::ImageResult<u64> {
    let img = image::open(path)?;
    let gray = img
        .resize_exact(HASH_SIZE, HASH_SIZE, FilterType::Triangle)
        .to_luma8();

    let total: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let mean = total / (HASH_SIZE * HASH_SIZE) as u64;

    let mut bits = 0u64;
    for (i, pixel) in gray.pixels().enumerate() {
        if pixel.0[0] as u64 > mean {
            bits |= 1 << i;
        }
    }
    Ok(bits)
}

/// SHA-256 over (size, first 1 KiB of content)
fn byte_sample_signature(path: &Path) -> std::io::Result<ContentSignature> {
    let size = std::fs::metadata(path)?.len();
    let mut file = File::open(path)?;
    let mut buffer = [0u8; SAMPLE_BYTES];
    let mut read = 0usize;
    // A short read before EOF is possible on some platforms; fill as much
    // of the sample window as the file allows
    loop {
        let n = file.read(&mut buffer[read..])?;
        if n == 0 {
            break;
        }
        read += n;
        if read == SAMPLE_BYTES {
            break;
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(size.to_le_bytes());
    hasher.update(&buffer[..read]);
    Ok(ContentSignature::byte_sample(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Luma};
    use std::fs;
    use tempfile::TempDir;

    /// Write a grayscale gradient as a real image file
    fn write_gradient(dir: &Path, name: &str) -> std::path::PathBuf {
        let buf: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_fn(64, 64, |x, y| Luma([((x * 2 + y * 2) % 256) as u8]));
        let path = dir.join(name);
        DynamicImage::ImageLuma8(buf).save(&path).unwrap();
        path
    }

    fn write_checkerboard(dir: &Path, name: &str) -> std::path::PathBuf {
        let buf: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_fn(64, 64, |x, y| {
                if (x / 8 + y / 8) % 2 == 0 {
                    Luma([255u8])
                } else {
                    Luma([0u8])
                }
            });
        let path = dir.join(name);
        DynamicImage::ImageLuma8(buf).save(&path).unwrap();
        path
    }

    #[test]
    fn test_similarity_reflexive_and_symmetric() {
        let a = ContentSignature::perceptual(0xdeadbeefdeadbeef);
        let b = ContentSignature::perceptual(0xdeadbeefdeadbeee);
        assert_eq!(similarity(&a, &a), 1.0);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));

        let c = ContentSignature {
            algorithm: SignatureAlgorithm::ByteSample,
            value: "ff00".to_string(),
        };
        assert_eq!(similarity(&c, &c), 1.0);
    }

    #[test]
    fn test_similarity_across_algorithms_is_zero() {
        let a = ContentSignature::perceptual(0);
        let b = ContentSignature {
            algorithm: SignatureAlgorithm::ByteSample,
            value: "0000000000000000".to_string(),
        };
        assert_eq!(similarity(&a, &b), 0.0);
        assert_eq!(similarity(&b, &a), 0.0);
    }

    #[test]
    fn test_similarity_hamming() {
        // One differing bit out of 64
        let a = ContentSignature::perceptual(0b0);
        let b = ContentSignature::perceptual(0b1);
        let sim = similarity(&a, &b);
        assert!((sim - (1.0 - 1.0 / 64.0)).abs() < 1e-9);
    }

    #[test]
    fn test_reencoded_image_keeps_signature() {
        let dir = TempDir::new().unwrap();
        let png = write_gradient(dir.path(), "a.png");

        // Re-encode the same pixels as JPEG
        let jpg = dir.path().join("b.jpg");
        image::open(&png).unwrap().to_luma8().save(&jpg).unwrap();

        let sa = compute_signature(&png, true).unwrap().signature;
        let sb = compute_signature(&jpg, true).unwrap().signature;
        assert_eq!(sa.algorithm, SignatureAlgorithm::Perceptual);
        assert!(similarity(&sa, &sb) >= 0.98);
    }

    #[test]
    fn test_different_images_differ() {
        let dir = TempDir::new().unwrap();
        let a = write_gradient(dir.path(), "a.png");
        let b = write_checkerboard(dir.path(), "b.png");

        let sa = compute_signature(&a, true).unwrap().signature;
        let sb = compute_signature(&b, true).unwrap().signature;
        assert!(similarity(&sa, &sb) < 0.9);
    }

    #[test]
    fn test_undecodable_image_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = compute_signature(&path, true).unwrap();
        assert!(result.decode_fallback);
        assert_eq!(result.signature.algorithm, SignatureAlgorithm::ByteSample);
    }

    #[test]
    fn test_byte_sample_exact_match_only() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        let c = dir.path().join("c.mp4");
        fs::write(&a, b"identical video bytes").unwrap();
        fs::write(&b, b"identical video bytes").unwrap();
        fs::write(&c, b"different video bytes").unwrap();

        let sa = compute_signature(&a, false).unwrap().signature;
        let sb = compute_signature(&b, false).unwrap().signature;
        let sc = compute_signature(&c, false).unwrap().signature;
        assert_eq!(similarity(&sa, &sb), 1.0);
        assert_eq!(similarity(&sa, &sc), 0.0);
    }

    #[test]
    fn test_byte_sample_size_matters() {
        // Same first KiB, different length
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut long = vec![7u8; 2048];
        fs::write(&a, &long).unwrap();
        long.push(9);
        fs::write(&b, &long).unwrap();

        let sa = compute_signature(&a, false).unwrap().signature;
        let sb = compute_signature(&b, false).unwrap().signature;
        assert_ne!(sa.value, sb.value);
    }

    #[test]
    fn test_algorithm_tags_roundtrip() {
        for alg in [SignatureAlgorithm::Perceptual, SignatureAlgorithm::ByteSample] {
            assert_eq!(SignatureAlgorithm::from_tag(alg.as_tag()), Some(alg));
        }
        assert_eq!(SignatureAlgorithm::from_tag("md5"), None);
    }
}
