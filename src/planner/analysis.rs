//! Keyword-level query analysis.
//!
//! This is deliberately shallow: token tables and a handful of intent
//! phrases. Everything here is a pure function of the query text.

use std::collections::BTreeSet;

use crate::executors::normalize_fragment;
use crate::executors::scoring::{is_identifier, STOP_WORDS};
use crate::types::{Region, Strategy, TaskCategory};

/// Words that switch the planner to the maturity strategy.
pub const MATURITY_KEYWORDS: &[&str] = &[
    "maturity",
    "trl",
    "readiness",
    "production-ready",
    "commercial",
    "available",
    "proven",
    "mature",
    "deployment",
    "operational",
    "qualified",
];

const DOMAINS: &[(&str, &[&str])] = &[
    ("embedded", &["mcu", "microcontroller", "embedded", "rtos", "firmware"]),
    (
        "power_management",
        &["pmic", "power", "converter", "regulator", "gan", "sic", "buck", "boost"],
    ),
    ("emc_emi", &["emc", "emi", "shielding", "noise"]),
    ("analog", &["adc", "dac", "opamp", "op-amp", "analog"]),
    ("rf_wireless", &["rf", "wireless", "ble", "lora", "antenna"]),
];

const APPLICATIONS: &[(&str, &[&str])] = &[
    ("automotive", &["automotive", "vehicle", "ev", "car"]),
    ("industrial", &["industrial", "factory", "plc"]),
    ("consumer", &["consumer", "wearable", "smartphone"]),
    ("aerospace", &["aerospace", "avionics", "satellite"]),
    ("medical", &["medical", "implantable"]),
    ("telecom", &["telecom", "5g", "base-station"]),
    ("data center", &["datacenter", "server"]),
    ("renewable", &["renewable", "solar", "photovoltaic", "wind"]),
];

const STANDARD_BODIES: &[&str] = &["iso", "iec", "ieee", "cispr", "jedec", "ul"];

const INTENTS: &[(&str, TaskCategory)] = &[
    ("datasheet", TaskCategory::Datasheet),
    ("datasheets", TaskCategory::Datasheet),
    ("specifications", TaskCategory::Datasheet),
    ("specs", TaskCategory::Datasheet),
    ("pinout", TaskCategory::Datasheet),
    ("price", TaskCategory::SupplyChain),
    ("pricing", TaskCategory::SupplyChain),
    ("availability", TaskCategory::SupplyChain),
    ("stock", TaskCategory::SupplyChain),
    ("distributor", TaskCategory::SupplyChain),
    ("distributors", TaskCategory::SupplyChain),
    ("patent", TaskCategory::Patent),
    ("patents", TaskCategory::Patent),
    ("paper", TaskCategory::Literature),
    ("papers", TaskCategory::Literature),
    ("publications", TaskCategory::Literature),
];

/// What the planner learned about a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    /// Whitespace-collapsed query, original casing.
    pub normalized: String,
    /// Query minus stop words, region, application and strategy words.
    pub topic: String,
    /// Part-number-like tokens, upper case.
    pub identifiers: Vec<String>,
    /// Standards references such as `AEC-Q100` or `ISO 26262`.
    pub standards: Vec<String>,
    pub domain: Option<&'static str>,
    pub applications: Vec<String>,
    pub regions: BTreeSet<Region>,
    /// Single-category intents found in the query.
    pub intents: BTreeSet<TaskCategory>,
    pub strategy: Strategy,
}

impl QueryAnalysis {
    /// Exactly one concrete subject and at most one intent.
    pub fn is_atomic(&self) -> bool {
        self.identifiers.len() + self.standards.len() == 1 && self.intents.len() <= 1
    }

    /// Category a query goes to when it cannot be decomposed.
    pub fn best_category(&self) -> TaskCategory {
        if let Some(intent) = self.intents.iter().next() {
            return *intent;
        }
        if self.identifiers.is_empty() && !self.standards.is_empty() {
            return TaskCategory::Literature;
        }
        TaskCategory::Component
    }
}

/// Analyze a query. Never fails; an empty query yields an empty analysis.
pub fn analyze(query: &str) -> QueryAnalysis {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = normalize_fragment(query);

    let words: Vec<&str> = normalized
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '?' || c == '!')
        .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-')))
        .filter(|w| !w.is_empty())
        .collect();

    let mut identifiers = Vec::new();
    let mut standards = Vec::new();
    let mut applications: Vec<String> = Vec::new();
    let mut regions = BTreeSet::new();
    let mut intents = BTreeSet::new();
    let mut topic_words: Vec<&str> = Vec::new();
    let mut skip_next = false;

    for (i, word) in words.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let lw = word.to_lowercase();

        if lw.starts_with("aec-q") {
            standards.push(word.to_uppercase());
            continue;
        }
        if STANDARD_BODIES.contains(&lw.as_str()) {
            if let Some(next) = words.get(i + 1) {
                if next.starts_with(|c: char| c.is_ascii_digit()) {
                    standards.push(format!("{} {}", word.to_uppercase(), next));
                    skip_next = true;
                    continue;
                }
            }
        }
        if let Some(region) = region_token(word) {
            regions.insert(region);
            continue;
        }
        if let Some((app, _)) = APPLICATIONS
            .iter()
            .find(|(_, aliases)| aliases.contains(&lw.as_str()))
        {
            if !applications.iter().any(|a| a == app) {
                applications.push(app.to_string());
            }
            continue;
        }
        if let Some((_, category)) = INTENTS.iter().find(|(kw, _)| *kw == lw) {
            intents.insert(*category);
            continue;
        }
        if STOP_WORDS.contains(&lw.as_str()) || MATURITY_KEYWORDS.contains(&lw.as_str()) {
            continue;
        }
        if is_identifier(&lw) {
            let id = word.to_uppercase();
            if !identifiers.contains(&id) {
                identifiers.push(id);
            }
        }
        topic_words.push(*word);
    }

    // Multi-word intent phrases.
    if lower.contains("lead time") {
        intents.insert(TaskCategory::SupplyChain);
    }
    if lower.contains("data center") && !applications.iter().any(|a| a == "data center") {
        applications.push("data center".to_string());
        topic_words.retain(|w| !matches!(w.to_lowercase().as_str(), "data" | "center"));
    }

    let strategy = if MATURITY_KEYWORDS.iter().any(|kw| contains_word(&lower, kw)) {
        Strategy::Maturity
    } else {
        Strategy::General
    };

    let domain = DOMAINS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_word(&lower, kw)))
        .map(|(name, _)| *name);

    let topic = if topic_words.is_empty() {
        normalized.clone()
    } else {
        topic_words.join(" ")
    };

    QueryAnalysis {
        normalized,
        topic,
        identifiers,
        standards,
        domain,
        applications,
        regions,
        intents,
        strategy,
    }
}

/// Region named by a query word. `US` only counts in upper case so the
/// pronoun does not trigger it.
fn region_token(word: &str) -> Option<Region> {
    match word.to_lowercase().as_str() {
        "eu" | "europe" | "european" | "emea" => Some(Region::Eu),
        "asia" | "asian" | "apac" => Some(Region::Asia),
        "usa" | "americas" => Some(Region::Us),
        "us" if word == "US" => Some(Region::Us),
        _ => None,
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .any(|t| t == word)
}
