//! HTTP source collaborator against a wiremock endpoint.
#![cfg(feature = "http-sources")]

use std::sync::Arc;
use std::time::Duration;

use scout::sources::{HttpSource, SourceCollaborator};
use scout::types::{AppError, Region, RegionFilter, ResearchRequest};
use scout::{InMemoryKnowledgeStore, KnowledgeStore, ResearchEngine, ScoutConfig, ScoutConfigManager};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer) -> HttpSource {
    HttpSource::new(
        "distributor-api",
        format!("{}/search", server.uri()),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn candidate() -> serde_json::Value {
    json!({
        "key": "TPS54620",
        "title": "TPS54620 6A synchronous buck converter",
        "manufacturer": "Texas Instruments",
        "fields": { "lifecycle": "active" }
    })
}

#[tokio::test]
async fn test_wrapped_and_bare_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "fragment": "wrapped" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [candidate()] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "fragment": "bare" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([candidate(), candidate()])))
        .mount(&server)
        .await;

    let source = source(&server);
    let wrapped = source.fetch("wrapped", None).await.unwrap();
    assert_eq!(wrapped.len(), 1);
    assert_eq!(wrapped[0].natural_key.as_deref(), Some("TPS54620"));
    assert_eq!(wrapped[0].manufacturer.as_deref(), Some("Texas Instruments"));

    assert_eq!(source.fetch("bare", None).await.unwrap().len(), 2);
    assert_eq!(source.name(), "distributor-api");
}

#[tokio::test]
async fn test_region_hint_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "fragment": "gan", "regions": ["EU"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = RegionFilter::new([Region::Eu]);
    let hits = source(&server).fetch("gan", Some(&filter)).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_error_statuses_map_to_error_kinds() {
    let server = MockServer::start().await;
    for (fragment, status) in [("busy", 429), ("broken", 503), ("bad", 400)] {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "fragment": fragment })))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "fragment": "garbled" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let source = source(&server);
    let busy = source.fetch("busy", None).await.unwrap_err();
    assert!(matches!(busy, AppError::SourceUnavailable(_)));
    assert!(busy.is_transient());

    let broken = source.fetch("broken", None).await.unwrap_err();
    assert!(matches!(broken, AppError::SourceUnavailable(_)));

    let bad = source.fetch("bad", None).await.unwrap_err();
    assert!(matches!(bad, AppError::MalformedTask(_)));
    assert!(!bad.is_transient());

    let garbled = source.fetch("garbled", None).await.unwrap_err();
    assert!(matches!(garbled, AppError::MalformedTask(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transient() {
    let source = HttpSource::new(
        "offline",
        "http://127.0.0.1:1/search",
        Duration::from_millis(500),
    )
    .unwrap();
    let err = source.fetch("gan", None).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_truncated_body_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        // Headers plus the JSON body, which ends with a closing brace
        while !(request.windows(4).any(|w| w == b"\r\n\r\n") && request.ends_with(b"}")) {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"results\": [",
            )
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let source = HttpSource::new(
        "flaky",
        format!("http://{}/search", addr),
        Duration::from_secs(2),
    )
    .unwrap();
    let err = source.fetch("gan", None).await.unwrap_err();
    assert!(matches!(err, AppError::SourceUnavailable(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_engine_retries_flaky_http_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [candidate()] })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ScoutConfig::parse(&format!(
        "[sources.component]\ntype = \"http\"\nendpoint = \"{}/search\"\ntimeout_secs = 2\n",
        server.uri()
    ))
    .unwrap();
    let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::default());
    let engine =
        ResearchEngine::from_config(Arc::new(ScoutConfigManager::from_config(config)), store)
            .unwrap();

    let result = engine.research(ResearchRequest::new("TPS54620")).await.unwrap();

    assert!(!result.degraded, "failures: {:?}", result.failures);
    assert_eq!(result.ranked[0].natural_key, "component:TPS54620");
}
