use std::sync::Arc;

use dashmap::DashMap;
use log::trace;

use crate::pattern::Pattern;
use crate::{frontend, Result};

/// Compiled patterns keyed by (language, text).
///
/// Owned by whoever loads rules and dropped with the scan; lookups are safe from any number of
/// threads. Compile errors are returned but not remembered.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: DashMap<(String, String), Arc<Pattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        PatternCache::default()
    }

    pub fn get_or_compile(&self, text: &str, language: &str) -> Result<Arc<Pattern>> {
        let frontend = frontend(language)?;
        let key = (frontend.language().to_owned(), text.to_owned());
        if let Some(hit) = self.patterns.get(&key) {
            trace!("pattern cache hit: {:?}", text);
            return Ok(Arc::clone(&hit));
        }
        // compiled outside the shard lock; a racing thread may compile the same text twice
        let compiled = Arc::new(frontend.compile_pattern(text)?);
        Ok(Arc::clone(self.patterns.entry(key).or_insert(compiled).value()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
