pub mod allocator;
pub mod merger;

pub use allocator::IdAllocator;
pub use merger::merge;

use anyhow::{Context, Result};
use extract::llm::ChatBackend;
use extract::schema::KnowledgeGraph;
use extract::Extractor;
use graph::{GraphWriter, WriteStats};
use ingest::Chunker;
use std::path::Path;
use tracing::info;

/// Chunk, extract, allocate, and merge: everything up to but not including
/// the graph store. Chunks are processed strictly in production order; id
/// allocation and first-seen-wins deduplication depend on it.
pub async fn extract_document<B: ChatBackend>(
    chunker: &Chunker,
    extractor: &Extractor<B>,
    document_text: &str,
) -> KnowledgeGraph {
    let chunks = chunker.split(document_text);
    info!(chunks = chunks.len(), "document split into extraction windows");

    let mut allocator = IdAllocator::new();
    let mut entities = Vec::new();
    let mut relationships = Vec::new();

    for chunk in &chunks {
        let result = extractor.extract_chunk(&chunk.chunk_id, &chunk.text).await;
        let result = allocator.allocate(result);

        info!(
            chunk = chunk.index,
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "window processed"
        );

        entities.extend(result.entities);
        relationships.extend(result.relationships);
    }

    merger::merge(entities, relationships)
}

/// Drives the full document-to-graph pipeline: extraction, merge, then
/// idempotent materialization into the graph store.
pub struct GraphBuilder<B> {
    chunker: Chunker,
    extractor: Extractor<B>,
    writer: GraphWriter,
}

impl<B: ChatBackend> GraphBuilder<B> {
    pub fn new(chunker: Chunker, extractor: Extractor<B>, writer: GraphWriter) -> Self {
        Self {
            chunker,
            extractor,
            writer,
        }
    }

    pub async fn build(&self, document_text: &str) -> Result<(KnowledgeGraph, WriteStats)> {
        let kg = extract_document(&self.chunker, &self.extractor, document_text).await;

        self.writer.init_constraints().await?;
        let stats = self.writer.write_graph(&kg).await;

        Ok((kg, stats))
    }
}

/// Persist the merged graph as a UTF-8 JSON audit artifact, independent of
/// the graph store.
pub fn save_json(kg: &KnowledgeGraph, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(kg).context("Failed to serialize knowledge graph")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "knowledge graph artifact saved");
    Ok(())
}
