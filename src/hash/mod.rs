//! Content-similarity signatures and the persistent signature cache
//!
//! Images get a perceptual signature that survives the re-encoding and
//! re-compression exporters routinely perform; everything else (and any
//! image that fails to decode) gets a cheap byte-sample signature that is
//! exact-match only. Signatures are expensive enough to be worth caching
//! across runs - see [`cache::HashCache`].

pub mod batch;
pub mod cache;
pub mod signature;

pub use batch::compute_batch;
pub use cache::HashCache;
pub use signature::{compute_signature, similarity, ContentSignature, SignatureAlgorithm};
