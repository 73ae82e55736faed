//! Shared fixtures for integration tests.
#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use scout::classifier::ReadinessClassifier;
use scout::sources::RawCandidate;
use scout::types::TaskCategory;
use scout::{
    ExecutorRegistry, InMemoryKnowledgeStore, KnowledgeStore, ResearchEngine, ScoutConfig,
    ScoutConfigManager,
};

use mocks::MockSource;

pub const GAN_QUERY: &str = "GaN power ICs, 48V automotive, EU";

/// One mock per leaf category.
#[derive(Clone)]
pub struct Sources {
    pub literature: MockSource,
    pub patent: MockSource,
    pub datasheet: MockSource,
    pub supply_chain: MockSource,
    pub component: MockSource,
}

impl Sources {
    /// GaN power IC fixtures: one EU vendor, one US vendor and one vendor
    /// of unknown origin, plus a paper citing a granted patent. The pending
    /// patent matches the query as well as the EU component does.
    pub fn gan() -> Self {
        Self {
            literature: MockSource::new(
                "papers",
                vec![RawCandidate {
                    summary: Some(
                        "Prototype demonstrated in a relevant environment; cites US11355410B2."
                            .into(),
                    ),
                    published: NaiveDate::from_ymd_opt(2023, 5, 10),
                    ..RawCandidate::new("Monolithic GaN power ICs for 48V automotive converters")
                        .with_field("doi", json!("10.1109/TPEL.2023.3271001"))
                }],
            ),
            patent: MockSource::new(
                "patents",
                vec![
                    RawCandidate::new("GaN half-bridge with integrated gate driver")
                        .with_field("patent_number", json!("US11355410B2"))
                        .with_field("status", json!("granted")),
                    RawCandidate::new("GaN power switch for automotive traction")
                        .with_field("patent_number", json!("US20240128416A1"))
                        .with_field("status", json!("pending")),
                ],
            ),
            datasheet: MockSource::new(
                "datasheets",
                vec![RawCandidate {
                    manufacturer: Some("Infineon".into()),
                    ..RawCandidate::new("CoolGaN 600V e-mode power transistor")
                        .with_key("IGT60R070D1")
                        .with_field("lifecycle", json!("active"))
                }],
            ),
            supply_chain: MockSource::new(
                "distributors",
                vec![RawCandidate {
                    manufacturer: Some("Infineon".into()),
                    ..RawCandidate::new("IGT60R070D1 GaN power transistor availability")
                        .with_key("IGT60R070D1")
                        .with_field("stock", json!(2400))
                }],
            ),
            component: MockSource::new(
                "components",
                vec![
                    RawCandidate {
                        manufacturer: Some("Infineon".into()),
                        ..RawCandidate::new(
                            "CoolGaN IGT60R070D1 power ICs for industrial and automotive",
                        )
                        .with_key("IGT60R070D1")
                    },
                    RawCandidate {
                        manufacturer: Some("Texas Instruments".into()),
                        ..RawCandidate::new("LMG3422R030 GaN FET for automotive 48V power")
                            .with_key("LMG3422R030")
                    },
                    RawCandidate {
                        manufacturer: Some("Acme Semi".into()),
                        ..RawCandidate::new("GS-065-011 GaN E-HEMT").with_key("GS-065-011")
                    },
                ],
            ),
        }
    }

    pub fn all(&self) -> [(TaskCategory, &MockSource); 5] {
        [
            (TaskCategory::Literature, &self.literature),
            (TaskCategory::Patent, &self.patent),
            (TaskCategory::Datasheet, &self.datasheet),
            (TaskCategory::SupplyChain, &self.supply_chain),
            (TaskCategory::Component, &self.component),
        ]
    }

    pub fn total_calls(&self) -> usize {
        self.all().iter().map(|(_, source)| source.calls()).sum()
    }
}

/// Engine over a fresh in-memory store with `sources` registered.
pub fn engine(sources: &Sources, config: ScoutConfig) -> (ResearchEngine, Arc<InMemoryKnowledgeStore>) {
    let store = Arc::new(InMemoryKnowledgeStore::default());
    let shared: Arc<dyn KnowledgeStore> = store.clone();
    let executors = ExecutorRegistry::from_sources(
        sources
            .all()
            .into_iter()
            .map(|(category, source)| (category, source.shared())),
        shared.clone(),
        ReadinessClassifier::new(config.classifier.clone()),
        config.cache.ttl(),
    );
    let engine = ResearchEngine::new(
        Arc::new(ScoutConfigManager::from_config(config)),
        shared,
        executors,
    );
    (engine, store)
}

/// Config with retries off, for tests that expect failures.
pub fn no_retry_config() -> ScoutConfig {
    let mut config = ScoutConfig::default();
    config.orchestrator.max_retries = 0;
    config
}
