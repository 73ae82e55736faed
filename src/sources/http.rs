use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{RawCandidate, SourceCollaborator};
use crate::types::{AppError, RegionFilter, Result};

/// Collaborator backed by a JSON endpoint.
///
/// Request: `POST {endpoint}` with `{"fragment": ..., "regions": [...]}`.
/// Response: a JSON array of candidates, or an object with a `results` array.
pub struct HttpSource {
    name: String,
    endpoint: String,
    client: Client,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    fragment: &'a str,
    regions: Vec<&'static str>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FetchResponse {
    Bare(Vec<RawCandidate>),
    Wrapped { results: Vec<RawCandidate> },
}

impl HttpSource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl SourceCollaborator for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        fragment: &str,
        regions: Option<&RegionFilter>,
    ) -> Result<Vec<RawCandidate>> {
        let request = FetchRequest {
            fragment,
            regions: regions
                .map(|f| f.regions().map(|r| r.as_str()).collect())
                .unwrap_or_default(),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::SourceUnavailable(format!("{} timed out", self.endpoint))
                } else {
                    AppError::SourceUnavailable(format!("{}: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{} returned {}: {}", self.endpoint, status, body);
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    AppError::SourceUnavailable(message)
                } else {
                    AppError::MalformedTask(message)
                },
            );
        }

        let parsed: FetchResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                AppError::MalformedTask(format!(
                    "unparseable response from {}: {}",
                    self.endpoint, e
                ))
            } else {
                AppError::SourceUnavailable(format!(
                    "response body from {} interrupted: {}",
                    self.endpoint, e
                ))
            }
        })?;

        tracing::debug!(
            source = %self.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Source responded"
        );

        Ok(match parsed {
            FetchResponse::Bare(candidates) => candidates,
            FetchResponse::Wrapped { results } => results,
        })
    }
}
