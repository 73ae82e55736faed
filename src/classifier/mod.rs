//! Readiness (TRL) Classifier
//!
//! Deterministic, rule-based scoring of how mature an entity is, from the
//! result records that mention it.
//!
//! Each record is first assessed on its own and lands in one band:
//!
//! | Band | TRL | Typical evidence |
//! |------|-----|------------------|
//! | production | 8-9 | active lifecycle, stock at several distributors |
//! | pilot | 6-7 | standards qualification, pilot or pre-production |
//! | experimental | 3-5 | measured results, lab or field validation, patents |
//! | theoretical | 1-2 | concepts, simulation, theory |
//!
//! The entity then gets the highest band backed by at least
//! `min_evidence` records. Its TRL is the highest level inside that band,
//! and its confidence is the share of evidence that sits in that band.
//! Adding evidence can therefore only keep or raise the result.
//!
//! No evidence is not an error: the result is TRL 1 with zero confidence.

/// Keyword tables and TRL definitions.
pub mod indicators;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntityType, ResultRecord, TaskCategory, TrlBand, TrlClassification};

pub use indicators::{definition, TRL_DEFINITIONS};

/// Classifier settings (`[classifier]` in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Corroborating records a band needs before it can be chosen.
    #[serde(default = "default_min_evidence")]
    pub min_evidence: usize,
}

fn default_min_evidence() -> usize {
    1
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_evidence: default_min_evidence(),
        }
    }
}

/// Readiness judgement for a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordAssessment {
    pub level: u8,
    pub band: TrlBand,
    pub reasons: Vec<String>,
}

/// Stateless rule engine; cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct ReadinessClassifier {
    config: ClassifierConfig,
}

impl ReadinessClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify an entity from its evidence records.
    pub fn classify(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        evidence: &[ResultRecord],
    ) -> TrlClassification {
        let mut classification = TrlClassification {
            entity_type,
            entity_id: entity_id.to_string(),
            trl: 1,
            confidence: 0.0,
            evidence: Vec::new(),
            justification: String::new(),
            version: 0,
            classified_at: Utc::now(),
        };

        if evidence.is_empty() {
            classification.justification = format!(
                "TRL 1 ({}): no evidence available, defaulting to the most conservative level",
                definition(1)
            );
            return classification;
        }

        let assessed: Vec<(&ResultRecord, RecordAssessment)> =
            evidence.iter().map(|r| (r, assess(r))).collect();
        let threshold = self.config.min_evidence.max(1);

        let chosen = TrlBand::ALL.iter().rev().copied().find(|band| {
            assessed.iter().filter(|(_, a)| a.band == *band).count() >= threshold
        });

        let Some(band) = chosen else {
            classification.justification = format!(
                "TRL 1 ({}): {} evidence record(s), but no band reaches the minimum of {}",
                definition(1),
                evidence.len(),
                threshold
            );
            return classification;
        };

        let mut in_band: Vec<&(&ResultRecord, RecordAssessment)> =
            assessed.iter().filter(|(_, a)| a.band == band).collect();
        in_band.sort_by(|(ra, a), (rb, b)| {
            b.level
                .cmp(&a.level)
                .then_with(|| rb.relevance_score.total_cmp(&ra.relevance_score))
                .then_with(|| ra.record_id.cmp(&rb.record_id))
        });

        let trl = in_band.first().map(|(_, a)| a.level).unwrap_or(1);
        let mut reasons: Vec<&str> = Vec::new();
        for (_, assessment) in &in_band {
            for reason in &assessment.reasons {
                if !reasons.contains(&reason.as_str()) && reasons.len() < 5 {
                    reasons.push(reason);
                }
            }
        }

        classification.trl = trl;
        classification.confidence = in_band.len() as f64 / evidence.len() as f64;
        classification.evidence = in_band.iter().map(|(r, _)| r.record_id.clone()).collect();
        classification.justification = format!(
            "TRL {} ({}): {} of {} evidence record(s) support the {} band; {}",
            trl,
            definition(trl),
            in_band.len(),
            evidence.len(),
            band.as_str(),
            reasons.join("; ")
        );
        classification
    }

    /// Derived copy of `record` annotated with its own provisional level.
    pub fn annotate(&self, record: &ResultRecord) -> ResultRecord {
        record.with_trl(assess(record).level)
    }
}

/// Assess a single record.
pub fn assess(record: &ResultRecord) -> RecordAssessment {
    let text = record.text();
    let mut level = 1u8;
    let mut reasons: Vec<String> = Vec::new();
    let mut raise = |candidate: u8, reason: String, level: &mut u8| {
        if candidate > *level {
            *level = candidate;
            reasons.push(reason);
        }
    };

    let default = category_default(record);
    raise(
        default,
        format!("{} evidence", record.source_category),
        &mut level,
    );

    if let Some((indicator, phrase)) = indicators::highest_indicator(&text) {
        raise(indicator, format!("mentions \"{}\"", phrase), &mut level);
    }

    if let Some(marker) = indicators::standards_marker(&text) {
        raise(7, format!("standards evidence ({})", marker), &mut level);
    }

    let distributors = distributor_count(record);
    let stock = total_stock(record);
    if stock > 1000 && distributors >= 2 {
        raise(
            9,
            format!("{} units in stock across {} distributors", stock, distributors),
            &mut level,
        );
    } else if stock > 100 {
        raise(8, format!("{} units in stock", stock), &mut level);
    }

    if let Some(lifecycle) = record.payload_str("lifecycle") {
        if let Some(lifecycle_level) = lifecycle_level(lifecycle, distributors) {
            raise(
                lifecycle_level,
                format!("lifecycle {}", lifecycle.to_lowercase()),
                &mut level,
            );
        }
    }

    let capped = level.min(category_ceiling(record.source_category)).max(1);
    RecordAssessment {
        level: capped,
        band: TrlBand::of(capped),
        reasons,
    }
}

fn category_default(record: &ResultRecord) -> u8 {
    match record.source_category {
        TaskCategory::Literature => 2,
        TaskCategory::Patent => {
            let granted = record
                .payload_str("status")
                .is_some_and(|s| s.eq_ignore_ascii_case("granted"));
            if granted {
                5
            } else {
                4
            }
        }
        TaskCategory::Datasheet => 7,
        TaskCategory::SupplyChain => 6,
        TaskCategory::Component => {
            if has_datasheet(record) {
                7
            } else {
                5
            }
        }
        TaskCategory::Composite => 1,
    }
}

fn has_datasheet(record: &ResultRecord) -> bool {
    ["datasheet", "datasheet_url"]
        .iter()
        .any(|field| record.payload.get(*field).is_some_and(|v| !v.is_null()))
}

/// Papers never claim more than validation; patents never more than
/// demonstration.
fn category_ceiling(category: TaskCategory) -> u8 {
    match category {
        TaskCategory::Literature => 5,
        TaskCategory::Patent => 6,
        _ => 9,
    }
}

fn lifecycle_level(lifecycle: &str, distributors: usize) -> Option<u8> {
    match lifecycle.trim().to_lowercase().as_str() {
        "active" | "production" | "in production" | "mass production" => {
            Some(if distributors >= 2 { 9 } else { 8 })
        }
        "nrnd" | "not recommended for new designs" => Some(8),
        "obsolete" | "eol" | "end of life" | "last time buy" => Some(9),
        "preview" | "sampling" | "pre-production" | "engineering samples" => Some(7),
        _ => None,
    }
}

fn distributor_count(record: &ResultRecord) -> usize {
    match record.payload.get("distributors") {
        Some(Value::Array(items)) => items.len(),
        _ => record
            .payload_f64("distributor_count")
            .map(|n| n.max(0.0) as usize)
            .unwrap_or(0),
    }
}

fn total_stock(record: &ResultRecord) -> u64 {
    if let Some(stock) = record.payload_f64("stock") {
        return stock.max(0.0) as u64;
    }
    match record.payload.get("distributors") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|d| d.get("stock").and_then(Value::as_f64))
            .map(|s| s.max(0.0) as u64)
            .sum(),
        _ => 0,
    }
}
