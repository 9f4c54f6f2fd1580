use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-to-scalar mapping carried by entities and relationships.
/// The schema varies by type and is decided by the extraction service, so
/// keys are only pinned down at the graph-writer boundary.
pub type Properties = Map<String, Value>;

/// Entity labels the prompts ask for. The graph store gets a uniqueness
/// constraint per label; anything outside this set still flows through the
/// pipeline under a generic id prefix.
pub const ENTITY_TYPES: [&str; 7] = [
    "Disease",
    "Treatment",
    "Examination",
    "Medication",
    "Department",
    "VitalSign",
    "Complication",
];

pub const RELATIONSHIP_TYPES: [&str; 6] = [
    "REQUIRES_TREATMENT",
    "REQUIRES_EXAMINATION",
    "USES_MEDICATION",
    "BELONGS_TO_DEPARTMENT",
    "MONITORS_SIGN",
    "CAUSES_COMPLICATION",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Candidate entities and relationships extracted from one window. Ids are
/// meaningful only within that window until the allocator rewrites them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ChunkResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Final merged output of a pipeline run. Serializes to UTF-8 JSON with
/// human text preserved, suitable as an audit artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_roundtrips_type_field() {
        let json = r#"{"id": "d1", "type": "Disease", "name": "心脏骤停", "properties": {"category": "循环系统"}}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();

        assert_eq!(entity.entity_type, "Disease");
        assert_eq!(entity.properties["category"], "循环系统");

        let out = serde_json::to_string(&entity).unwrap();
        assert!(out.contains(r#""type":"Disease""#));
    }

    #[test]
    fn test_missing_properties_defaults_to_empty() {
        let json = r#"{"id": "t1", "type": "Treatment", "name": "心肺复苏"}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert!(entity.properties.is_empty());
    }

    #[test]
    fn test_graph_serializes_human_readable_utf8() {
        let kg = KnowledgeGraph {
            entities: vec![Entity {
                id: "d1".to_string(),
                entity_type: "Disease".to_string(),
                name: "心脏骤停".to_string(),
                properties: Properties::new(),
            }],
            relationships: vec![],
        };

        let json = serde_json::to_string_pretty(&kg).unwrap();
        assert!(json.contains("心脏骤停"));
        assert!(!json.contains("\\u"));
    }
}
