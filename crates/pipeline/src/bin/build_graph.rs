use anyhow::{Context, Result};
use extract::{ChatClient, Extractor};
use graph::{GraphReader, GraphWriter};
use ingest::{Chunker, ChunkerConfig, FileReader};
use std::path::Path;

/// One-shot pipeline run: read a plain-text clinical document, build the
/// knowledge graph, persist it to Neo4j and to a JSON audit artifact.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let document_path = std::env::args()
        .nth(1)
        .context("usage: build_graph <document.txt> [output.json]")?;
    let output_path = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "knowledge_graph.json".to_string());

    let document_text = FileReader::read_file(Path::new(&document_path)).await?;

    let neo4j_uri =
        std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
    let neo4j_user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
    let neo4j_password = std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "neo4j".to_string());

    // The only fatal failure: the graph store has to be reachable
    let neo4j = neo4rs::Graph::new(&neo4j_uri, &neo4j_user, &neo4j_password)
        .await
        .context("Failed to connect to Neo4j")?;

    let client = ChatClient::from_env()?;
    let builder = pipeline::GraphBuilder::new(
        Chunker::new(ChunkerConfig::default()),
        Extractor::new(client),
        GraphWriter::new(neo4j.clone()),
    );

    let (kg, write_stats) = builder.build(&document_text).await?;
    pipeline::save_json(&kg, Path::new(&output_path))?;

    println!(
        "Graph built: {} entities, {} relationships ({} entity writes failed, {} relationship writes failed)",
        kg.entities.len(),
        kg.relationships.len(),
        write_stats.entities_failed,
        write_stats.relationships_failed,
    );

    let reader = GraphReader::new(neo4j);
    let stats = reader.stats().await?;
    println!("Store totals: {} nodes, {} relationships", stats.total_nodes, stats.total_relationships);
    for label_count in &stats.by_label {
        println!("  {}: {}", label_count.label, label_count.count);
    }

    Ok(())
}
