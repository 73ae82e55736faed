//! Relationship inference over a merged result set.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::classifier::indicators::contains_phrase;
use crate::executors::keys::compact_upper;
use crate::types::{Entity, EntityType, Relationship, RelationshipType, ResearchThread, ResultRecord};

fn is_technology_thread(thread: &ResearchThread) -> bool {
    matches!(
        thread,
        ResearchThread::TechnologyTrend
            | ResearchThread::AcademicResearch
            | ResearchThread::PatentLandscape
    )
}

fn is_component_thread(thread: &ResearchThread) -> bool {
    matches!(
        thread,
        ResearchThread::ComponentSearch | ResearchThread::CommercialProducts
    )
}

/// Identifier part of a natural key, lower-cased (`component:TPS54620` ->
/// `tps54620`).
fn local_id(natural_key: &str) -> String {
    natural_key
        .split_once(':')
        .map(|(_, id)| id.to_lowercase())
        .unwrap_or_default()
}

fn mentions(text: &str, id: &str) -> bool {
    id.len() >= 4 && contains_phrase(text, id)
}

/// Key of the anchor entity for an application tag.
pub fn application_key(tag: &str) -> String {
    format!("application:{}", slug(tag))
}

/// Key of the anchor entity for the query topic.
pub fn technology_key(topic: &str) -> String {
    format!("technology:{}", slug(topic))
}

fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Edges implied by the records, plus the application anchors they need.
///
/// `technology` is the key of the topic anchor, which the caller has
/// already inserted into `entities`.
pub(crate) fn infer(
    records: &[ResultRecord],
    entities: &BTreeMap<String, Entity>,
    technology: Option<&str>,
    applications: &[String],
) -> (Vec<Relationship>, Vec<Entity>) {
    let texts: Vec<(&ResultRecord, String)> = records.iter().map(|r| (r, r.text())).collect();
    let mut edges: BTreeSet<(String, String, RelationshipType)> = BTreeSet::new();
    let mut anchors: BTreeMap<String, Entity> = BTreeMap::new();

    let components = entities
        .values()
        .filter(|e| e.entity_type == EntityType::Component);

    for component in components {
        let key = component.natural_key.as_str();
        let part = local_id(key);
        let own_texts: Vec<&str> = texts
            .iter()
            .filter(|(r, _)| r.entity_id == key)
            .map(|(_, t)| t.as_str())
            .collect();

        // Found under a technology thread (directly or mentioned by a paper
        // or patent there) and under a component thread.
        if let Some(technology) = technology {
            let in_component_thread = component.threads.iter().any(is_component_thread);
            let in_technology_thread = component.threads.iter().any(is_technology_thread)
                || texts.iter().any(|(r, text)| {
                    r.entity_id != key
                        && r.thread.as_ref().is_some_and(is_technology_thread)
                        && mentions(text, &part)
                });
            if in_component_thread && in_technology_thread {
                edges.insert((key.to_string(), technology.to_string(), RelationshipType::Implements));
            }
        }

        for alternative in alternatives(component) {
            let other = format!("component:{}", compact_upper(&alternative));
            if other != key && entities.contains_key(&other) {
                edges.insert((key.to_string(), other, RelationshipType::AlternativeTo));
            }
        }

        for tag in applications {
            let tag_lower = tag.to_lowercase();
            if own_texts.iter().any(|t| contains_phrase(t, &tag_lower)) {
                let app_key = application_key(tag);
                anchors
                    .entry(app_key.clone())
                    .or_insert_with(|| Entity::anchor(app_key.clone(), EntityType::Application, tag));
                edges.insert((key.to_string(), app_key, RelationshipType::SuitableFor));
            }
        }
    }

    let patents: Vec<(&str, String)> = entities
        .values()
        .filter(|e| e.entity_type == EntityType::Patent)
        .map(|e| (e.natural_key.as_str(), local_id(&e.natural_key)))
        .collect();
    for (record, text) in &texts {
        if record.entity_type != EntityType::Paper {
            continue;
        }
        for (patent_key, number) in &patents {
            if mentions(text, number) {
                edges.insert((
                    record.entity_id.clone(),
                    patent_key.to_string(),
                    RelationshipType::Cites,
                ));
            }
        }
    }

    let relationships = edges
        .into_iter()
        .map(|(from, to, kind)| Relationship::new(from, to, kind))
        .collect();
    (relationships, anchors.into_values().collect())
}

fn alternatives(entity: &Entity) -> Vec<String> {
    match entity.fields.get("alternatives") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_slugged() {
        assert_eq!(technology_key("GaN power  ICs"), "technology:gan-power-ics");
        assert_eq!(application_key("data center"), "application:data-center");
    }

    #[test]
    fn test_local_id() {
        assert_eq!(local_id("patent:US11355410B2"), "us11355410b2");
        assert_eq!(local_id("nokey"), "");
    }
}
