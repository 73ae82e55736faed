//! Task fingerprints (cache keys).

use sha2::{Digest, Sha256};

use crate::types::{RegionFilter, TaskCategory};

/// Lower-case `fragment` and collapse every whitespace run to one space.
pub fn normalize_fragment(fragment: &str) -> String {
    fragment
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable hex SHA-256 over category, normalized fragment and region filter.
///
/// An empty filter hashes the same as no filter.
pub fn fingerprint(
    category: TaskCategory,
    fragment: &str,
    regions: Option<&RegionFilter>,
) -> String {
    let regions = regions.map(ToString::to_string).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(normalize_fragment(fragment).as_bytes());
    hasher.update(b"|");
    hasher.update(regions.as_bytes());
    hex::encode(hasher.finalize())
}
