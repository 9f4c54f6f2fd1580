use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Extraction responses keyed by prompt hash. Re-running an unchanged
/// document hits the cache instead of the extraction service.
pub struct ResponseCache {
    responses: DashMap<String, String>,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: DashMap::new(),
            max_entries,
        }
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        self.responses.get(&hash_prompt(prompt)).map(|r| r.value().clone())
    }

    pub fn set(&self, prompt: &str, response: String) {
        if self.responses.len() >= self.max_entries {
            // Simple eviction: drop a quarter of the entries when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take(self.max_entries / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(hash_prompt(prompt), response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

fn hash_prompt(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let cache = ResponseCache::new(16);
        assert_eq!(cache.get("prompt"), None);

        cache.set("prompt", "response".to_string());
        assert_eq!(cache.get("prompt").as_deref(), Some("response"));
        assert_eq!(cache.get("other prompt"), None);
    }

    #[test]
    fn test_eviction_keeps_cache_bounded() {
        let cache = ResponseCache::new(8);
        for i in 0..40 {
            cache.set(&format!("prompt {i}"), "r".to_string());
        }
        assert!(cache.len() <= 8);
    }
}
