use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Message;

/// On-disk cache of completions keyed by model and conversation.
///
/// Layout: `<root>/completions/<model>/<sha256>.json`. Identical requests are
/// answered from disk instead of being resent.
#[derive(Debug, Clone)]
pub struct CompletionCache {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    model: String,
    messages: Vec<Message>,
    response: String,
}

impl CompletionCache {
    /// `cache_root` is the shared cache root; entries go under `completions/`.
    pub fn new(cache_root: impl AsRef<Path>) -> Self {
        Self {
            root: cache_root.as_ref().join("completions"),
        }
    }

    /// Look up a cached response for this exact conversation
    pub fn lookup(&self, model: &str, messages: &[Message]) -> Result<Option<String>> {
        let path = self.entry_path(model, messages)?;
        if !path.exists() {
            return Ok(None);
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read cache entry: {}", path.display()))?;
        let entry: CacheEntry = serde_json::from_str(&text)
            .with_context(|| format!("corrupt cache entry: {}", path.display()))?;

        debug!(path = %path.display(), "completion cache hit");
        Ok(Some(entry.response))
    }

    /// Store a response for this conversation, replacing any previous entry
    pub fn store(&self, model: &str, messages: &[Message], response: &str) -> Result<()> {
        let path = self.entry_path(model, messages)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let entry = CacheEntry {
            model: model.to_string(),
            messages: messages.to_vec(),
            response: response.to_string(),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write cache entry: {}", path.display()))?;

        debug!(path = %path.display(), "stored completion");
        Ok(())
    }

    fn entry_path(&self, model: &str, messages: &[Message]) -> Result<PathBuf> {
        let key = cache_key(model, messages)?;
        Ok(self
            .root
            .join(sanitize_model(model))
            .join(format!("{}.json", key)))
    }
}

/// SHA-256 over the model and the serialized conversation
pub fn cache_key(model: &str, messages: &[Message]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(messages)?);
    Ok(hex::encode(hasher.finalize()))
}

// Model ids like "openai/gpt-4o" or "org:model" must stay one path component
fn sanitize_model(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
