//! Retrieval capability: the narrow interface to the document index.
//!
//! The agent only needs `search(query, top_k)`; how documents get into the
//! index and how similarity is computed belong to the external service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// An opaque retrieved document, rendered into the prompt as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub text: String,
}

impl ContextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Name of this retriever (for logging).
    fn name(&self) -> &str;

    /// Return up to `top_k` documents relevant to `query`, best first.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextDocument>, RetrievalError>;
}
