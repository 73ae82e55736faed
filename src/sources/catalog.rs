use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::{RawCandidate, SourceCollaborator};
use crate::executors::scoring::tokenize;
use crate::types::{AppError, RegionFilter, Result};

/// Fixed candidate list, usually loaded from a JSON file.
///
/// A candidate is returned when it shares at least one search token with
/// the fragment. Region filtering is left to the executor.
pub struct CatalogSource {
    name: String,
    candidates: Vec<RawCandidate>,
}

impl CatalogSource {
    pub fn new(name: impl Into<String>, candidates: Vec<RawCandidate>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }

    /// Load a JSON array of candidates.
    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let candidates: Vec<RawCandidate> = serde_json::from_str(&json).map_err(|e| {
            AppError::Configuration(format!("invalid catalog {}: {}", path.display(), e))
        })?;
        let name = name.into();
        debug!(source = %name, path = %path.display(), candidates = candidates.len(), "Catalog loaded");
        Ok(Self::new(name, candidates))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[async_trait]
impl SourceCollaborator for CatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        fragment: &str,
        _regions: Option<&RegionFilter>,
    ) -> Result<Vec<RawCandidate>> {
        let wanted: BTreeSet<String> = tokenize(fragment).into_iter().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .candidates
            .iter()
            .filter(|c| {
                tokenize(&c.search_text())
                    .iter()
                    .any(|token| wanted.contains(token))
            })
            .cloned()
            .collect())
    }
}
