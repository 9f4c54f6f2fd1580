use anyhow::{Context, Result};
use extract::schema::{ENTITY_TYPES, Entity, KnowledgeGraph, Relationship};
use neo4rs::{Graph, Query};
use serde_json::Value;
use tracing::{info, warn};

/// Idempotently materializes a merged knowledge graph into Neo4j. Every
/// upsert is safe to re-run over the same or overlapping data.
pub struct GraphWriter {
    graph: Graph,
}

#[derive(Debug, Default, serde::Serialize)]
pub struct WriteStats {
    pub entities_written: usize,
    pub entities_failed: usize,
    pub relationships_written: usize,
    pub relationships_failed: usize,
}

impl GraphWriter {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Ensure a uniqueness constraint on `id` exists for every entity label.
    /// Individual constraint failures are logged, not fatal.
    pub async fn init_constraints(&self) -> Result<()> {
        for label in ENTITY_TYPES {
            let cypher = format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{label}) REQUIRE n.id IS UNIQUE"
            );
            if let Err(e) = self.graph.run(Query::new(cypher)).await {
                warn!(label, error = %e, "constraint creation failed");
            }
        }
        Ok(())
    }

    /// Upsert the full entity and relationship set. A failure on one item is
    /// logged and skipped; it never aborts the remaining writes.
    pub async fn write_graph(&self, kg: &KnowledgeGraph) -> WriteStats {
        let mut stats = WriteStats::default();

        for entity in &kg.entities {
            if let Err(e) = self.write_entity(entity).await {
                warn!(id = %entity.id, error = %e, "entity write failed, retrying without properties");
                // Keep the node around so relationship wiring still finds it
                if let Err(e) = self.write_entity_minimal(entity).await {
                    warn!(id = %entity.id, error = %e, "minimal entity write failed, skipping");
                    stats.entities_failed += 1;
                    continue;
                }
            }
            stats.entities_written += 1;
        }

        for rel in &kg.relationships {
            if let Err(e) = self.write_relationship(rel).await {
                warn!(
                    from = %rel.from,
                    to = %rel.to,
                    rel_type = %rel.rel_type,
                    error = %e,
                    "relationship write failed, skipping"
                );
                stats.relationships_failed += 1;
                continue;
            }
            stats.relationships_written += 1;
        }

        info!(
            entities = stats.entities_written,
            relationships = stats.relationships_written,
            "knowledge graph written"
        );
        stats
    }

    async fn write_entity(&self, entity: &Entity) -> Result<()> {
        let label = sanitize_identifier(&entity.entity_type);
        if label.is_empty() {
            anyhow::bail!("entity type {:?} is not usable as a label", entity.entity_type);
        }

        let mut set_clauses = vec!["n.name = $name".to_string()];
        let mut bound = Vec::new();
        for (key, value) in &entity.properties {
            let key = sanitize_identifier(key);
            if key.is_empty() || key == "id" || key == "name" {
                continue;
            }
            if matches!(value, Value::Null) {
                continue;
            }
            set_clauses.push(format!("n.{key} = ${key}"));
            bound.push((key, value));
        }

        let cypher = format!(
            "MERGE (n:{label} {{id: $id}}) SET {}",
            set_clauses.join(", ")
        );
        let mut query = Query::new(cypher)
            .param("id", entity.id.clone())
            .param("name", entity.name.clone());
        for (key, value) in bound {
            query = bind_scalar(query, &key, value);
        }

        self.graph
            .run(query)
            .await
            .context("Failed to upsert entity")?;
        Ok(())
    }

    /// Fallback write with `id` and `name` only.
    async fn write_entity_minimal(&self, entity: &Entity) -> Result<()> {
        let label = sanitize_identifier(&entity.entity_type);
        if label.is_empty() {
            anyhow::bail!("entity type {:?} is not usable as a label", entity.entity_type);
        }

        let cypher = format!("MERGE (n:{label} {{id: $id}}) SET n.name = $name");
        let query = Query::new(cypher)
            .param("id", entity.id.clone())
            .param("name", entity.name.clone());

        self.graph
            .run(query)
            .await
            .context("Failed to upsert minimal entity")?;
        Ok(())
    }

    async fn write_relationship(&self, rel: &Relationship) -> Result<()> {
        let rel_type = sanitize_identifier(&rel.rel_type);
        if rel_type.is_empty() {
            anyhow::bail!(
                "relationship type {:?} is not usable as an edge type",
                rel.rel_type
            );
        }

        let mut set_clauses = Vec::new();
        let mut bound = Vec::new();
        for (key, value) in &rel.properties {
            let key = sanitize_identifier(key);
            if key.is_empty() || key == "from_id" || key == "to_id" {
                continue;
            }
            if matches!(value, Value::Null) {
                continue;
            }
            set_clauses.push(format!("r.{key} = ${key}"));
            bound.push((key, value));
        }

        let cypher = if set_clauses.is_empty() {
            format!(
                "MATCH (a {{id: $from_id}}), (b {{id: $to_id}}) MERGE (a)-[r:{rel_type}]->(b)"
            )
        } else {
            format!(
                "MATCH (a {{id: $from_id}}), (b {{id: $to_id}}) MERGE (a)-[r:{rel_type}]->(b) SET {}",
                set_clauses.join(", ")
            )
        };

        let mut query = Query::new(cypher)
            .param("from_id", rel.from.clone())
            .param("to_id", rel.to.clone());
        for (key, value) in bound {
            query = bind_scalar(query, &key, value);
        }

        self.graph
            .run(query)
            .await
            .context("Failed to upsert relationship")?;
        Ok(())
    }
}

/// Property keys and labels come from the extraction service, so they pass
/// through this filter before being spliced into a query. Values always go
/// through bind parameters.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .take(120)
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out.chars().all(|c| c == '_') {
        return String::new();
    }
    out
}

fn bind_scalar(query: Query, key: &str, value: &Value) -> Query {
    match value {
        Value::String(s) => query.param(key, s.clone()),
        Value::Bool(b) => query.param(key, *b),
        Value::Number(n) if n.is_i64() => query.param(key, n.as_i64().unwrap_or_default()),
        Value::Number(n) => query.param(key, n.as_f64().unwrap_or_default()),
        // Nested structures are stored as their JSON text
        other => query.param(key, other.to_string()),
    }
}
