//! Entity registry and typed relationship graph.
//!
//! Entities are keyed by natural key, edges by `(from, to, kind)`. Edges are
//! additive: observing an existing edge again bumps its occurrence counter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{AppError, Entity, Relationship, RelationshipType, Result};

type EdgeKey = (String, String, RelationshipType);

/// Entities plus the edges between them.
#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: BTreeMap<String, Entity>,
    edges: BTreeMap<EdgeKey, Relationship>,
    /// natural key -> edges touching it (either direction)
    incident: HashMap<String, BTreeSet<EdgeKey>>,
}

/// A connected slice of the graph returned by [`EntityGraph::neighborhood`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge an entity, returning the stored result.
    pub fn upsert_entity(&mut self, entity: &Entity) -> Entity {
        match self.entities.get_mut(&entity.natural_key) {
            Some(existing) => {
                existing.absorb_entity(entity);
                existing.clone()
            }
            None => {
                self.entities
                    .insert(entity.natural_key.clone(), entity.clone());
                entity.clone()
            }
        }
    }

    pub fn get(&self, natural_key: &str) -> Option<&Entity> {
        self.entities.get(natural_key)
    }

    pub fn contains(&self, natural_key: &str) -> bool {
        self.entities.contains_key(natural_key)
    }

    /// Add an edge between two stored entities or bump its occurrence count.
    pub fn upsert_relationship(
        &mut self,
        from: &str,
        to: &str,
        kind: RelationshipType,
    ) -> Result<Relationship> {
        for key in [from, to] {
            if !self.contains(key) {
                return Err(AppError::NotFound(format!(
                    "cannot link {} -[{}]-> {}: entity '{}' is not stored",
                    from, kind, to, key
                )));
            }
        }

        let edge_key = (from.to_string(), to.to_string(), kind);
        let edge = self
            .edges
            .entry(edge_key.clone())
            .and_modify(|edge| edge.occurrences += 1)
            .or_insert_with(|| Relationship::new(from, to, kind))
            .clone();

        for key in [from, to] {
            self.incident
                .entry(key.to_string())
                .or_default()
                .insert(edge_key.clone());
        }

        Ok(edge)
    }

    /// Edges touching `natural_key`, in key order.
    pub fn relationships_of(&self, natural_key: &str) -> Vec<Relationship> {
        self.incident
            .get(natural_key)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| self.edges.get(k).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entities reachable from `natural_key` within `hops` edges (either
    /// direction) and the edges among them.
    pub fn neighborhood(&self, natural_key: &str, hops: usize) -> GraphView {
        if !self.contains(natural_key) {
            return GraphView::default();
        }

        let mut seen: BTreeSet<String> = BTreeSet::from([natural_key.to_string()]);
        let mut frontier = vec![natural_key.to_string()];
        let mut edges: BTreeSet<EdgeKey> = BTreeSet::new();

        for _ in 0..hops {
            let mut next = Vec::new();
            for key in &frontier {
                for edge_key in self.incident.get(key).into_iter().flatten() {
                    edges.insert(edge_key.clone());
                    let other = if &edge_key.0 == key {
                        &edge_key.1
                    } else {
                        &edge_key.0
                    };
                    if seen.insert(other.clone()) {
                        next.push(other.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        GraphView {
            entities: seen
                .iter()
                .filter_map(|k| self.entities.get(k).cloned())
                .collect(),
            relationships: edges
                .iter()
                .filter_map(|k| self.edges.get(k).cloned())
                .collect(),
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.edges.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.edges.len()
    }

    /// Re-insert a relationship with its stored occurrence count (snapshot
    /// restore). Endpoints must already exist.
    pub fn restore_relationship(&mut self, relationship: Relationship) -> Result<()> {
        let edge = self.upsert_relationship(&relationship.from, &relationship.to, relationship.kind)?;
        let key = (edge.from, edge.to, edge.kind);
        if let Some(stored) = self.edges.get_mut(&key) {
            stored.occurrences = relationship.occurrences.max(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;

    fn entity(key: &str) -> Entity {
        Entity::anchor(key.to_string(), EntityType::Component, key)
    }

    #[test]
    fn test_relationship_requires_both_endpoints() {
        let mut graph = EntityGraph::new();
        graph.upsert_entity(&entity("component:A"));

        let err = graph
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(graph.relationship_count(), 0);
    }

    #[test]
    fn test_repeated_edge_increments_occurrences() {
        let mut graph = EntityGraph::new();
        graph.upsert_entity(&entity("component:A"));
        graph.upsert_entity(&entity("technology:gan"));

        graph
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .unwrap();
        let edge = graph
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .unwrap();

        assert_eq!(edge.occurrences, 2);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_neighborhood_respects_hops() {
        let mut graph = EntityGraph::new();
        for key in ["paper:1", "patent:US1", "component:A", "technology:gan"] {
            graph.upsert_entity(&entity(key));
        }
        graph
            .upsert_relationship("paper:1", "patent:US1", RelationshipType::Cites)
            .unwrap();
        graph
            .upsert_relationship("component:A", "technology:gan", RelationshipType::Implements)
            .unwrap();
        graph
            .upsert_relationship("component:A", "paper:1", RelationshipType::AlternativeTo)
            .unwrap();

        let one_hop = graph.neighborhood("component:A", 1);
        let keys: Vec<_> = one_hop.entities.iter().map(|e| e.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["component:A", "paper:1", "technology:gan"]);
        assert_eq!(one_hop.relationships.len(), 2);

        let two_hops = graph.neighborhood("component:A", 2);
        assert_eq!(two_hops.entities.len(), 4);
        assert_eq!(two_hops.relationships.len(), 3);
    }

    #[test]
    fn test_neighborhood_of_unknown_entity_is_empty() {
        let graph = EntityGraph::new();
        assert_eq!(graph.neighborhood("component:missing", 2), GraphView::default());
    }
}
