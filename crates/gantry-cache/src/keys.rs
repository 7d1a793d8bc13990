//! Cache key generation.
//!
//! A key is `<prefix>-<digest>` where the digest is a SHA-256 over the
//! sorted set of inputs, so the declaration order of inputs never changes
//! the key.

use gantry_core::cache::CacheKey;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;

const MISSING_FILE: &str = "<missing>";

/// Collects cache inputs and produces a [`CacheKey`].
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    prefix: String,
    inputs: BTreeSet<String>,
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inputs: BTreeSet::new(),
        }
    }

    /// Add a literal input such as a toolchain identifier.
    pub fn input(mut self, value: impl AsRef<str>) -> Self {
        self.inputs.insert(format!("input:{}", value.as_ref()));
        self
    }

    /// Add a named value, e.g. a matrix axis assignment.
    pub fn pair(mut self, name: &str, value: &str) -> Self {
        self.inputs.insert(format!("pair:{}={}", name, value));
        self
    }

    /// Add the digest of a file. Unreadable files contribute a fixed marker.
    pub fn file(mut self, root: &Path, relative: &str) -> Self {
        let digest = match std::fs::read(root.join(relative)) {
            Ok(contents) => hex::encode(Sha256::digest(&contents)),
            Err(_) => MISSING_FILE.to_string(),
        };
        self.inputs.insert(format!("file:{}:{}", relative, digest));
        self
    }

    pub fn build(&self) -> CacheKey {
        let mut hasher = Sha256::new();
        for input in &self.inputs {
            hasher.update(input.as_bytes());
            hasher.update([0u8]);
        }
        let hash = hasher.finalize();
        let hash_str = hex::encode(&hash[..16]);

        if self.prefix.is_empty() {
            CacheKey::new(hash_str)
        } else {
            CacheKey::new(format!("{}-{}", self.prefix, hash_str))
        }
    }
}

/// Sanitize a key for use in filenames.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}
