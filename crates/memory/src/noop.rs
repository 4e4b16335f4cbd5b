//! No-op retriever: disables retrieval context entirely.

use async_trait::async_trait;
use ragent_core::error::RetrievalError;
use ragent_core::retrieval::{ContextDocument, Retriever};

/// A retriever that never finds anything.
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<ContextDocument>, RetrievalError> {
        Ok(Vec::new())
    }
}
