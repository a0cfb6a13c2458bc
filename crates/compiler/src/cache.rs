//! Content-addressed cache of compiled scripts.
//!
//! Keyed by the blake3 hash of the exact source text, so the same file
//! compiled on two machines (or twice on one) reuses the same parts.
//! Cached parts keep their opcode identities; callers clone them into
//! a program build, and the clone preserves every id.

use helmscript_common::CodePart;
use std::collections::HashMap;

/// Hash of a script's source text.
pub type SourceHash = [u8; 32];

#[derive(Debug, Default)]
pub struct CompileCache {
    entries: HashMap<SourceHash, Vec<CodePart>>,
}

impl CompileCache {
    pub fn new() -> CompileCache {
        CompileCache::default()
    }

    /// Hash source text the way the cache keys it.
    pub fn hash(text: &str) -> SourceHash {
        *blake3::hash(text.as_bytes()).as_bytes()
    }

    pub fn exists(&self, text: &str) -> bool {
        self.entries.contains_key(&Self::hash(text))
    }

    pub fn get(&self, text: &str) -> Option<&Vec<CodePart>> {
        self.entries.get(&Self::hash(text))
    }

    pub fn put(&mut self, text: &str, parts: Vec<CodePart>) {
        self.entries.insert(Self::hash(text), parts);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
