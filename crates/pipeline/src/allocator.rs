use extract::schema::ChunkResult;
use std::collections::HashMap;

/// Rewrites chunk-local entity ids into run-global ids. One counter per
/// type prefix, shared across the whole run, never reset per chunk, so ids
/// allocated for different chunks cannot collide even when their local ids
/// did.
pub struct IdAllocator {
    counters: HashMap<&'static str, u64>,
}

fn prefix_for(entity_type: &str) -> &'static str {
    match entity_type {
        "Disease" => "d",
        "Treatment" => "t",
        "Examination" => "e",
        "Medication" => "m",
        "Department" => "dept",
        "VitalSign" => "v",
        "Complication" => "c",
        _ => "n",
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    /// Assign a fresh global id to every entity in the chunk, then rewrite
    /// the chunk's relationship endpoints through the old-to-new mapping.
    /// Endpoints that never appeared as an entity id in this chunk are left
    /// untouched; the merger drops them if they stay unresolved.
    pub fn allocate(&mut self, mut result: ChunkResult) -> ChunkResult {
        let mut mapping: HashMap<String, String> = HashMap::new();

        for entity in &mut result.entities {
            let prefix = prefix_for(&entity.entity_type);
            let counter = self.counters.entry(prefix).or_insert(0);
            *counter += 1;
            let new_id = format!("{prefix}{counter}");

            let old_id = std::mem::replace(&mut entity.id, new_id.clone());
            mapping.insert(old_id, new_id);
        }

        for rel in &mut result.relationships {
            if let Some(new_from) = mapping.get(&rel.from) {
                rel.from = new_from.clone();
            }
            if let Some(new_to) = mapping.get(&rel.to) {
                rel.to = new_to.clone();
            }
        }

        result
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::schema::{Entity, Properties, Relationship};
    use std::collections::HashSet;

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
    fn test_ids_from_colliding_chunks_never_collide() {
        let mut allocator = IdAllocator::new();

        // Both windows reused the same local ids
        let first = allocator.allocate(ChunkResult {
            entities: vec![entity("d1", "Disease", "心脏骤停"), entity("t1", "Treatment", "心肺复苏")],
            relationships: vec![rel("d1", "t1", "REQUIRES_TREATMENT")],
        });
        let second = allocator.allocate(ChunkResult {
            entities: vec![entity("d1", "Disease", "休克"), entity("t1", "Treatment", "补液")],
            relationships: vec![rel("d1", "t1", "REQUIRES_TREATMENT")],
        });

        let mut seen = HashSet::new();
        for e in first.entities.iter().chain(second.entities.iter()) {
            assert!(seen.insert(e.id.clone()), "duplicate id {}", e.id);
        }

        assert_eq!(first.entities[0].id, "d1");
        assert_eq!(second.entities[0].id, "d2");
        assert_eq!(second.relationships[0].from, "d2");
        assert_eq!(second.relationships[0].to, "t2");
    }

    #[test]
    fn test_prefixes_follow_entity_type() {
        let mut allocator = IdAllocator::new();
        let result = allocator.allocate(ChunkResult {
            entities: vec![
                entity("x1", "Department", "急诊科"),
                entity("x2", "VitalSign", "血压"),
                entity("x3", "Unheard0fType", "未知"),
            ],
            relationships: vec![],
        });

        assert_eq!(result.entities[0].id, "dept1");
        assert_eq!(result.entities[1].id, "v1");
        assert_eq!(result.entities[2].id, "n1");
    }

    #[test]
    fn test_unmapped_endpoints_left_untouched() {
        let mut allocator = IdAllocator::new();
        let result = allocator.allocate(ChunkResult {
            entities: vec![entity("d1", "Disease", "心脏骤停")],
            relationships: vec![rel("d1", "ghost", "REQUIRES_TREATMENT")],
        });

        assert_eq!(result.relationships[0].from, "d1");
        assert_eq!(result.relationships[0].to, "ghost");
    }
}
