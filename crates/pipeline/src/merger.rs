use extract::schema::{Entity, KnowledgeGraph, Relationship};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Collapse duplicate entities discovered in different windows and restore
/// referential integrity over the surviving ids. Runs once, after every
/// window has been processed and globally id-allocated.
///
/// Identity key is `(type, name)`; the first entity seen in chunk order is
/// canonical. Relationship endpoints are rewritten onto canonical ids, then
/// relationships with a missing endpoint are dropped and the remainder is
/// deduplicated on `(from, to, type)`: first occurrence wins, later
/// duplicates' properties are discarded.
pub fn merge(entities: Vec<Entity>, relationships: Vec<Relationship>) -> KnowledgeGraph {
    let mut canonical: Vec<Entity> = Vec::new();
    let mut canonical_index: HashMap<(String, String), usize> = HashMap::new();
    let mut id_map: HashMap<String, String> = HashMap::new();

    for entity in entities {
        let key = (entity.entity_type.clone(), entity.name.clone());
        match canonical_index.get(&key) {
            Some(&i) => {
                id_map.insert(entity.id, canonical[i].id.clone());
            }
            None => {
                id_map.insert(entity.id.clone(), entity.id.clone());
                canonical_index.insert(key, canonical.len());
                canonical.push(entity);
            }
        }
    }

    let surviving: HashSet<&str> = canonical.iter().map(|e| e.id.as_str()).collect();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut merged: Vec<Relationship> = Vec::new();

    for mut rel in relationships {
        if let Some(from) = id_map.get(&rel.from) {
            rel.from = from.clone();
        }
        if let Some(to) = id_map.get(&rel.to) {
            rel.to = to.clone();
        }

        // An endpoint that never resolved to a surviving entity: routine
        // filtering, not an error.
        if !surviving.contains(rel.from.as_str()) || !surviving.contains(rel.to.as_str()) {
            continue;
        }

        let key = (rel.from.clone(), rel.to.clone(), rel.rel_type.clone());
        if seen.insert(key) {
            merged.push(rel);
        }
    }

    info!(
        entities = canonical.len(),
        relationships = merged.len(),
        "chunk results merged and deduplicated"
    );

    KnowledgeGraph {
        entities: canonical,
        relationships: merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::schema::Properties;

    fn entity(id: &str, entity_type: &str, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            properties: Properties::new(),
        }
    }

    fn rel(from: &str, to: &str, rel_type: &str) -> Relationship {
        Relationship {
            from: from.to_string(),
            to: to.to_string(),
            rel_type: rel_type.to_string(),
            properties: Properties::new(),
        }
    }

    #[test]
    fn test_identity_key_dedup_keeps_first_seen() {
        let kg = merge(
            vec![
                entity("d1", "Disease", "心脏骤停"),
                entity("d2", "Disease", "心脏骤停"),
                entity("t1", "Treatment", "心脏骤停"),
            ],
            vec![],
        );

        // Same name under a different type is a different identity
        assert_eq!(kg.entities.len(), 2);
        assert_eq!(kg.entities[0].id, "d1");
        for (i, a) in kg.entities.iter().enumerate() {
            for b in &kg.entities[i + 1..] {
                assert!(a.entity_type != b.entity_type || a.name != b.name);
            }
        }
    }

    #[test]
    fn test_endpoints_rewritten_onto_canonical_ids() {
        let kg = merge(
            vec![
                entity("d1", "Disease", "心脏骤停"),
                entity("t1", "Treatment", "心肺复苏"),
                entity("d2", "Disease", "心脏骤停"),
                entity("t2", "Treatment", "心肺复苏"),
            ],
            vec![
                rel("d1", "t1", "REQUIRES_TREATMENT"),
                rel("d2", "t2", "REQUIRES_TREATMENT"),
            ],
        );

        // The overlapping-windows scenario: one disease, one treatment,
        // exactly one edge between their canonical ids
        assert_eq!(kg.entities.len(), 2);
        assert_eq!(kg.relationships.len(), 1);
        assert_eq!(kg.relationships[0].from, "d1");
        assert_eq!(kg.relationships[0].to, "t1");
    }

    #[test]
    fn test_unresolved_endpoint_drops_relationship() {
        let kg = merge(
            vec![entity("d1", "Disease", "心脏骤停")],
            vec![rel("d1", "t9", "REQUIRES_TREATMENT")],
        );
        assert!(kg.relationships.is_empty());
    }

    #[test]
    fn test_relationship_dedup_first_wins() {
        let mut first = rel("d1", "t1", "REQUIRES_TREATMENT");
        first
            .properties
            .insert("时机".to_string(), serde_json::json!("立即"));
        let mut second = rel("d1", "t1", "REQUIRES_TREATMENT");
        second
            .properties
            .insert("时机".to_string(), serde_json::json!("择期"));

        let kg = merge(
            vec![entity("d1", "Disease", "心脏骤停"), entity("t1", "Treatment", "心肺复苏")],
            vec![first, second, rel("d1", "t1", "USES_MEDICATION")],
        );

        // Same endpoints under a different type survive; duplicate keeps the
        // first occurrence's properties
        assert_eq!(kg.relationships.len(), 2);
        assert_eq!(kg.relationships[0].properties["时机"], "立即");
    }

    #[test]
    fn test_referential_integrity() {
        let kg = merge(
            vec![
                entity("d1", "Disease", "心脏骤停"),
                entity("d2", "Disease", "心脏骤停"),
                entity("t1", "Treatment", "心肺复苏"),
            ],
            vec![
                rel("d2", "t1", "REQUIRES_TREATMENT"),
                rel("t1", "x1", "BELONGS_TO_DEPARTMENT"),
            ],
        );

        let ids: HashSet<&str> = kg.entities.iter().map(|e| e.id.as_str()).collect();
        for rel in &kg.relationships {
            assert!(ids.contains(rel.from.as_str()));
            assert!(ids.contains(rel.to.as_str()));
        }
        assert_eq!(kg.relationships.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let kg = merge(
            vec![
                entity("d1", "Disease", "心脏骤停"),
                entity("d2", "Disease", "心脏骤停"),
                entity("t1", "Treatment", "心肺复苏"),
            ],
            vec![
                rel("d1", "t1", "REQUIRES_TREATMENT"),
                rel("d2", "t1", "REQUIRES_TREATMENT"),
            ],
        );

        let again = merge(kg.entities.clone(), kg.relationships.clone());
        assert_eq!(
            serde_json::to_string(&kg).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }
}
