//! Deterministic hash-derived fallback vectors.
//!
//! The vector is SHA-256 of the text, each byte scaled to `[0, 1]`, tiled
//! until `dims` values exist. Identical texts map to identical vectors and
//! different texts almost surely differ, but the geometry carries no
//! meaning: ranking over these vectors is effectively random.

use sha2::{Digest, Sha256};

pub const DEFAULT_FALLBACK_DIMENSIONS: usize = 128;

pub fn fallback_embedding(text: &str, dims: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .cycle()
        .take(dims)
        .map(|b| f32::from(*b) / 255.0)
        .collect()
}
