//! Mock source collaborators for integration tests.
//!
//! Every mock counts its `fetch` calls so tests can assert on cache hits
//! and retry behaviour without reaching into the engine.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use scout::sources::{RawCandidate, SourceCollaborator};
use scout::types::{AppError, RegionFilter, Result};

/// Collaborator returning a fixed candidate list.
///
/// # Examples
///
/// ```ignore
/// let source = MockSource::new("components", vec![RawCandidate::new("GaN FET")]);
/// let slow = MockSource::new("papers", vec![]).with_latency(Duration::from_secs(5));
/// let down = MockSource::unavailable("patents");
/// assert_eq!(source.calls(), 0);
/// ```
#[derive(Clone)]
pub struct MockSource {
    name: String,
    candidates: Vec<RawCandidate>,
    latency: Option<Duration>,
    error: Option<AppError>,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(name: &str, candidates: Vec<RawCandidate>) -> Self {
        Self {
            name: name.to_string(),
            candidates,
            latency: None,
            error: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always reports itself unavailable (retried).
    pub fn unavailable(name: &str) -> Self {
        Self {
            error: Some(AppError::SourceUnavailable(format!("{} is down", name))),
            ..Self::new(name, vec![])
        }
    }

    /// A source that always rejects the request (not retried).
    pub fn rejecting(name: &str) -> Self {
        Self {
            error: Some(AppError::MalformedTask(format!("{} rejected the query", name))),
            ..Self::new(name, vec![])
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `fetch` calls so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn SourceCollaborator> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl SourceCollaborator for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _fragment: &str,
        _regions: Option<&RegionFilter>,
    ) -> Result<Vec<RawCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.candidates.clone()),
        }
    }
}
