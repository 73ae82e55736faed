//! Source collaborators
//!
//! A source collaborator turns a normalized query fragment into raw
//! candidates for one category. Parsing of real literature indexes, patent
//! offices or distributor catalogs happens behind this boundary; executors
//! only see [`RawCandidate`]s and the transient/non-transient error split.
//!
//! Two generic collaborators ship with the crate:
//! - [`CatalogSource`]: a JSON file of candidates filtered lexically
//! - [`HttpSource`]: a JSON-over-POST endpoint (feature `http-sources`)

/// Offline JSON catalogs.
pub mod catalog;
/// HTTP collaborators.
#[cfg(feature = "http-sources")]
pub mod http;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Region, RegionFilter, Result, TaskCategory};
use crate::utils::toml_config::SourceConfig;

pub use catalog::CatalogSource;
#[cfg(feature = "http-sources")]
pub use http::HttpSource;

/// External capability that supplies raw candidates for one category.
///
/// Implementations return `SourceUnavailable` for failures worth retrying
/// and `MalformedTask` for everything else.
#[async_trait]
pub trait SourceCollaborator: Send + Sync {
    /// Name recorded as `source` on every record built from this collaborator.
    fn name(&self) -> &str;

    /// Candidates matching `fragment`. The region filter is a hint; the
    /// executor enforces it regardless.
    async fn fetch(
        &self,
        fragment: &str,
        regions: Option<&RegionFilter>,
    ) -> Result<Vec<RawCandidate>>;
}

/// Unnormalized hit as delivered by a collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    /// DOI, patent number or part number, if the source knows it.
    #[serde(default, alias = "key", skip_serializing_if = "Option::is_none")]
    pub natural_key: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    /// Category-specific structured fields (lifecycle, stock, status, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl RawCandidate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.natural_key = Some(key.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Title, summary, key, manufacturer and string fields joined for
    /// lexical matching.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        parts.extend(self.summary.as_deref());
        parts.extend(self.natural_key.as_deref());
        parts.extend(self.manufacturer.as_deref());
        parts.extend(self.fields.values().filter_map(Value::as_str));
        parts.join(" ")
    }
}

/// Build the collaborator configured for `category`.
pub fn build_source(
    category: TaskCategory,
    config: &SourceConfig,
) -> Result<Arc<dyn SourceCollaborator>> {
    match config {
        SourceConfig::Catalog { path } => Ok(Arc::new(CatalogSource::from_file(
            format!("catalog:{}", category),
            path,
        )?)),
        #[cfg(feature = "http-sources")]
        SourceConfig::Http {
            endpoint,
            timeout_secs,
        } => Ok(Arc::new(HttpSource::new(
            format!("http:{}", category),
            endpoint.clone(),
            std::time::Duration::from_secs(*timeout_secs),
        )?)),
        #[cfg(not(feature = "http-sources"))]
        SourceConfig::Http { .. } => Err(crate::types::AppError::Configuration(format!(
            "source '{}' needs the http-sources feature",
            category
        ))),
    }
}
