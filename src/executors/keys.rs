//! Natural keys for entities.
//!
//! Keys are namespaced by entity type so a part number can never collide
//! with a patent number: `component:TPS54620`, `patent:US11355410B2`,
//! `paper:10.1109/tpel.2021.3058743`.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::fingerprint::normalize_fragment;
use crate::sources::RawCandidate;
use crate::types::TaskCategory;

/// Key of the entity a candidate describes, or `None` when the candidate
/// has neither an identifier nor a title.
pub fn natural_key(category: TaskCategory, candidate: &RawCandidate) -> Option<String> {
    let field = |name: &str| candidate.fields.get(name).and_then(Value::as_str);
    let raw = match category {
        TaskCategory::Literature => candidate.natural_key.as_deref().or(field("doi")),
        TaskCategory::Patent => candidate.natural_key.as_deref().or(field("patent_number")),
        _ => candidate.natural_key.as_deref().or(field("part_number")),
    };

    let id = raw
        .map(|id| match category {
            TaskCategory::Literature => normalize_doi(id),
            _ => compact_upper(id),
        })
        .filter(|id| !id.is_empty())
        .or_else(|| title_hash(&candidate.title))?;

    Some(format!("{}:{}", category.entity_type(), id))
}

/// Upper case with all whitespace removed (`tps 54620` -> `TPS54620`).
pub fn compact_upper(id: &str) -> String {
    id.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn normalize_doi(doi: &str) -> String {
    let doi = doi.trim().to_lowercase();
    ["https://doi.org/", "http://doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| doi.strip_prefix(prefix))
        .unwrap_or(&doi)
        .trim()
        .to_string()
}

/// First 16 hex chars of the SHA-256 of the normalized title.
fn title_hash(title: &str) -> Option<String> {
    let normalized = normalize_fragment(title);
    if normalized.is_empty() {
        return None;
    }
    let digest = Sha256::digest(normalized.as_bytes());
    Some(hex::encode(digest)[..16].to_string())
}
