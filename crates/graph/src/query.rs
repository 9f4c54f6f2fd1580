use anyhow::Result;
use extract::schema::ENTITY_TYPES;
use neo4rs::{Graph, Query};
use serde::Serialize;

/// Read-side queries over the materialized graph: statistics, free-text
/// search, and a whole-graph export for visualization.
pub struct GraphReader {
    graph: Graph,
}

#[derive(Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub by_label: Vec<LabelCount>,
    pub total_nodes: i64,
    pub total_relationships: i64,
}

#[derive(Debug, Serialize)]
pub struct NodeHit {
    pub id: String,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub name: String,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ExportLink {
    pub source: String,
    pub target: String,
    pub rel_type: String,
}

#[derive(Debug, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
}

impl GraphReader {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        let mut by_label = Vec::new();
        for label in ENTITY_TYPES {
            let count = self
                .count(&format!("MATCH (n:{label}) RETURN count(n) as count"))
                .await?;
            by_label.push(LabelCount {
                label: label.to_string(),
                count,
            });
        }

        let total_nodes = self.count("MATCH (n) RETURN count(n) as count").await?;
        let total_relationships = self
            .count("MATCH ()-[r]->() RETURN count(r) as count")
            .await?;

        Ok(GraphStats {
            by_label,
            total_nodes,
            total_relationships,
        })
    }

    async fn count(&self, cypher: &str) -> Result<i64> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = match result.next().await? {
            Some(row) => row.get::<i64>("count").unwrap_or(0),
            None => 0,
        };
        Ok(count)
    }

    /// Case-insensitive containment search over `name` and the
    /// description-like properties the extraction prompts produce.
    pub async fn search(&self, term: &str) -> Result<Vec<NodeHit>> {
        let query = Query::new(
            "MATCH (n) \
             WHERE toLower(n.name) CONTAINS toLower($term) \
                OR toLower(coalesce(n.症状描述, '')) CONTAINS toLower($term) \
                OR toLower(coalesce(n.注意事项, '')) CONTAINS toLower($term) \
             RETURN n.id as id, n.name as name, labels(n)[0] as label \
             LIMIT 20"
                .to_string(),
        )
        .param("term", term.to_string());

        let mut result = self.graph.execute(query).await?;
        let mut hits = Vec::new();
        while let Some(row) = result.next().await? {
            hits.push(NodeHit {
                id: row.get::<String>("id").unwrap_or_default(),
                name: row.get::<String>("name").unwrap_or_default(),
                label: row.get::<String>("label").unwrap_or_default(),
            });
        }
        Ok(hits)
    }

    pub async fn export(&self) -> Result<GraphExport> {
        let mut result = self
            .graph
            .execute(Query::new(
                "MATCH (n) RETURN n.id as id, n.name as name, labels(n)[0] as label ORDER BY id"
                    .to_string(),
            ))
            .await?;
        let mut nodes = Vec::new();
        while let Some(row) = result.next().await? {
            nodes.push(ExportNode {
                id: row.get::<String>("id").unwrap_or_default(),
                name: row.get::<String>("name").unwrap_or_default(),
                label: row.get::<String>("label").unwrap_or_default(),
            });
        }

        let mut result = self
            .graph
            .execute(Query::new(
                "MATCH (a)-[r]->(b) \
                 RETURN a.id as source, b.id as target, type(r) as rel_type \
                 ORDER BY source"
                    .to_string(),
            ))
            .await?;
        let mut links = Vec::new();
        while let Some(row) = result.next().await? {
            links.push(ExportLink {
                source: row.get::<String>("source").unwrap_or_default(),
                target: row.get::<String>("target").unwrap_or_default(),
                rel_type: row.get::<String>("rel_type").unwrap_or_default(),
            });
        }

        Ok(GraphExport { nodes, links })
    }
}
