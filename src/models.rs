//! Client-facing model aliases and their Vertex AI model IDs.

use std::collections::BTreeMap;

use crate::config::ModelsConfig;
use crate::openai::{ModelInfo, ModelList};

/// Chat model prefixes forwarded to Vertex as-is.
const CHAT_PASSTHROUGH: &[&str] = &["gemini-"];

/// Embedding model prefixes forwarded to Vertex as-is.
const EMBEDDING_PASSTHROUGH: &[&str] = &[
    "text-embedding-0",
    "text-multilingual-embedding-",
    "gemini-embedding-",
];

/// Resolves OpenAI-style model names to Vertex model IDs.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    chat: BTreeMap<String, String>,
    default_chat: String,
    embeddings: BTreeMap<String, String>,
    default_embedding: String,
}

impl ModelCatalog {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            chat: config.chat.clone(),
            default_chat: config.default_chat.clone(),
            embeddings: config.embeddings.clone(),
            default_embedding: config.default_embedding.clone(),
        }
    }

    /// Vertex model for a chat alias.
    pub fn resolve_chat(&self, alias: &str) -> String {
        resolve(alias, &self.chat, CHAT_PASSTHROUGH, &self.default_chat)
    }

    /// Vertex model for an embedding alias.
    pub fn resolve_embedding(&self, alias: &str) -> String {
        resolve(
            alias,
            &self.embeddings,
            EMBEDDING_PASSTHROUGH,
            &self.default_embedding,
        )
    }

    /// Every configured alias, chat first, in name order.
    pub fn list(&self, created: u64) -> ModelList {
        let data = self
            .chat
            .keys()
            .chain(self.embeddings.keys())
            .map(|id| ModelInfo {
                id: id.clone(),
                object: "model".to_string(),
                created,
                owned_by: "vertex-ai".to_string(),
            })
            .collect();

        ModelList {
            object: "list".to_string(),
            data,
        }
    }
}

fn resolve(
    alias: &str,
    table: &BTreeMap<String, String>,
    passthrough: &[&str],
    default: &str,
) -> String {
    if let Some(model) = table.get(alias) {
        return model.clone();
    }
    if passthrough.iter().any(|p| alias.starts_with(p)) {
        return alias.to_string();
    }
    default.to_string()
}
