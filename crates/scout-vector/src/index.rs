//! Exact (brute-force) similarity index.
//!
//! Entity counts per research session are small, so an exhaustive scan is
//! both fast enough and exact. The dimension is fixed by the first vector
//! inserted.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};

/// A single match returned by [`FlatIndex::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Identifier the vector was stored under.
    pub id: String,
    /// Similarity score (higher = closer).
    pub score: f32,
}

/// Thread-safe exact similarity index keyed by string ids.
#[derive(Debug)]
pub struct FlatIndex {
    metric: DistanceMetric,
    dimensions: RwLock<Option<usize>>,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl Default for FlatIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

impl FlatIndex {
    /// Create an empty index using the given metric.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimensions: RwLock::new(None),
            vectors: RwLock::new(HashMap::new()),
        }
    }

    /// Metric used for scoring.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Dimension fixed by the first insert, if any.
    pub fn dimensions(&self) -> Option<usize> {
        *self.dimensions.read()
    }

    /// Insert or replace the vector stored under `id`.
    pub fn upsert(&self, id: &str, vector: Vec<f32>) -> Result<()> {
        validate(&vector)?;

        {
            let mut dims = self.dimensions.write();
            match *dims {
                Some(expected) if expected != vector.len() => {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => *dims = Some(vector.len()),
            }
        }

        self.vectors.write().insert(id.to_string(), vector);
        Ok(())
    }

    /// Remove a vector. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.vectors.write().remove(id).is_some()
    }

    /// Fetch a stored vector.
    pub fn get(&self, id: &str) -> Option<Vec<f32>> {
        self.vectors.read().get(id).cloned()
    }

    /// Return the `k` nearest vectors to `query`, best first.
    ///
    /// Ties are broken by id so results are reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        validate(query)?;
        if let Some(expected) = self.dimensions() {
            if expected != query.len() {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vectors = self.vectors.read();
        let mut results: Vec<SearchResult> = vectors
            .iter()
            .map(|(id, v)| SearchResult {
                id: id.clone(),
                score: self.metric.similarity(query, v),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);

        tracing::trace!(k, returned = results.len(), "flat index search");
        Ok(results)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    /// Copy out every `(id, vector)` pair, sorted by id.
    pub fn entries(&self) -> Vec<(String, Vec<f32>)> {
        let mut entries: Vec<_> = self
            .vectors
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn validate(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::InvalidVector("vector is empty".to_string()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidVector(
            "vector contains NaN or infinite components".to_string(),
        ));
    }
    Ok(())
}
