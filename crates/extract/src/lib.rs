pub mod cache;
pub mod llm;
pub mod prompt;
pub mod retry;
pub mod sanitizer;
pub mod schema;

pub use cache::ResponseCache;
pub use llm::{ChatBackend, ChatClient};
pub use retry::RetryPolicy;
pub use schema::{ChunkResult, Entity, KnowledgeGraph, Properties, Relationship};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Candidate caps per window, bounding extraction-service output.
    pub max_entities_per_type: usize,
    pub max_entities_total: usize,
    pub cache_enabled: bool,
    pub cache_entries: usize,
    /// Unparseable responses (raw + repaired) are written here for offline
    /// inspection. No artifact is kept when unset.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_entities_per_type: 5,
            max_entities_total: 30,
            cache_enabled: true,
            cache_entries: 1024,
            diagnostics_dir: None,
        }
    }
}

/// Two-phase extraction over one text window: entity candidates first, then
/// relationships restricted to the ids of those candidates.
pub struct Extractor<B> {
    backend: B,
    config: ExtractorConfig,
    retry: RetryPolicy,
    cache: Option<ResponseCache>,
}

impl<B: ChatBackend> Extractor<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ExtractorConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(backend: B, config: ExtractorConfig, retry: RetryPolicy) -> Self {
        let cache = config
            .cache_enabled
            .then(|| ResponseCache::new(config.cache_entries));

        Self {
            backend,
            config,
            retry,
            cache,
        }
    }

    /// Extract candidates from one window. Never fails: any transport or
    /// parse problem degrades this window to an empty result and the run
    /// continues with the next one.
    pub async fn extract_chunk(&self, chunk_id: &str, text: &str) -> ChunkResult {
        let entities = match self.extract_entities(chunk_id, text).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(chunk_id, error = %e, "entity extraction failed, window degraded to empty");
                return ChunkResult::default();
            }
        };

        if entities.is_empty() {
            return ChunkResult::default();
        }

        let relationships = match self.extract_relationships(chunk_id, text, &entities).await {
            Ok(relationships) => relationships,
            Err(e) => {
                warn!(chunk_id, error = %e, "relationship extraction failed, keeping entities only");
                Vec::new()
            }
        };

        ChunkResult {
            entities,
            relationships,
        }
    }

    async fn extract_entities(&self, chunk_id: &str, text: &str) -> Result<Vec<Entity>> {
        let user_prompt = prompt::entity_prompt(text);
        let raw = self.call("entity_extraction", &user_prompt).await?;

        let payload = match sanitizer::sanitize(&raw) {
            Some(payload) => payload,
            None => {
                self.dump_diagnostics(chunk_id, "entities", &raw);
                anyhow::bail!("entity response unparseable after repair");
            }
        };

        let entities = parse_entities(&payload)?;
        Ok(enforce_caps(
            entities,
            self.config.max_entities_per_type,
            self.config.max_entities_total,
        ))
    }

    async fn extract_relationships(
        &self,
        chunk_id: &str,
        text: &str,
        entities: &[Entity],
    ) -> Result<Vec<Relationship>> {
        let user_prompt = prompt::relationship_prompt(text, entities);
        let raw = self.call("relationship_extraction", &user_prompt).await?;

        let payload = match sanitizer::sanitize(&raw) {
            Some(payload) => payload,
            None => {
                self.dump_diagnostics(chunk_id, "relationships", &raw);
                anyhow::bail!("relationship response unparseable after repair");
            }
        };

        let relationships = parse_relationships(&payload)?;

        // The service was only told about this window's local ids; anything
        // else can never resolve to an entity.
        let eligible: HashSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        Ok(relationships
            .into_iter()
            .filter(|r| eligible.contains(r.from.as_str()) && eligible.contains(r.to.as_str()))
            .collect())
    }

    async fn call(&self, operation: &str, user_prompt: &str) -> Result<String> {
        if let Some(cache) = &self.cache {
            if let Some(response) = cache.get(user_prompt) {
                debug!(operation, "extraction response served from cache");
                return Ok(response);
            }
        }

        let response = self
            .retry
            .run(operation, || {
                self.backend.complete(prompt::SYSTEM_PROMPT, user_prompt)
            })
            .await?;

        if let Some(cache) = &self.cache {
            cache.set(user_prompt, response.clone());
        }
        Ok(response)
    }

    fn dump_diagnostics(&self, chunk_id: &str, phase: &str, raw: &str) {
        let Some(dir) = &self.config.diagnostics_dir else {
            return;
        };

        let repaired = sanitizer::apply_heuristics(raw);
        let body = format!("--- raw ---\n{raw}\n--- repaired ---\n{repaired}\n");
        let path = dir.join(format!("{chunk_id}_{phase}.txt"));

        if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, body)) {
            warn!(error = %e, "failed to write diagnostics artifact");
        } else {
            debug!(path = %path.display(), "unparseable response retained for inspection");
        }
    }
}

/// Accept `{"entities": [...]}` or a bare array. Individually malformed
/// array elements are skipped rather than failing the window.
pub fn parse_entities(payload: &str) -> Result<Vec<Entity>> {
    let value: Value = serde_json::from_str(payload).context("entity payload is not JSON")?;
    let items = payload_array(value, "entities")
        .context("entity payload is neither an object with `entities` nor an array")?;

    let mut entities = Vec::new();
    for item in items {
        match serde_json::from_value::<Entity>(item) {
            Ok(entity) if !entity.id.is_empty() && !entity.name.is_empty() => {
                entities.push(entity)
            }
            Ok(_) => debug!("entity candidate with empty id or name skipped"),
            Err(e) => debug!(error = %e, "malformed entity candidate skipped"),
        }
    }
    Ok(entities)
}

/// Accept `{"relationships": [...]}` or a bare array.
pub fn parse_relationships(payload: &str) -> Result<Vec<Relationship>> {
    let value: Value = serde_json::from_str(payload).context("relationship payload is not JSON")?;
    let items = payload_array(value, "relationships")
        .context("relationship payload is neither an object with `relationships` nor an array")?;

    let mut relationships = Vec::new();
    for item in items {
        match serde_json::from_value::<Relationship>(item) {
            Ok(rel) => relationships.push(rel),
            Err(e) => debug!(error = %e, "malformed relationship candidate skipped"),
        }
    }
    Ok(relationships)
}

fn payload_array(value: Value, key: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Some(items),
            // A well-formed object that simply found nothing
            None => Some(Vec::new()),
            Some(_) => None,
        },
        _ => None,
    }
}

fn enforce_caps(entities: Vec<Entity>, per_type: usize, total: usize) -> Vec<Entity> {
    let mut per_type_seen: HashMap<String, usize> = HashMap::new();
    let mut capped = Vec::new();

    for entity in entities {
        if capped.len() >= total {
            break;
        }
        let seen = per_type_seen.entry(entity.entity_type.clone()).or_insert(0);
        if *seen >= per_type {
            continue;
        }
        *seen += 1;
        capped.push(entity);
    }

    capped
}
