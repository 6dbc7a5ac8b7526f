// LLM response cache keyed by (model_id, prompt_template_version, prompt).

use std::collections::HashMap;

/// Everything that determines a completion. Compared in full on lookup, so two
/// different prompts never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model_id: String,
    pub template_version: String,
    pub prompt: String,
}

impl CacheKey {
    pub fn new(model_id: &str, template_version: &str, prompt: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            template_version: template_version.to_string(),
            prompt: prompt.to_string(),
        }
    }
}

/// In-memory completion cache for one run.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, String>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: CacheKey, completion: String) {
        self.entries.insert(key, completion);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
