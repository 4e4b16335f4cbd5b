//! Retrieval over HTTP: delegates semantic search to an external service.
//!
//! The service receives `{"query": ..., "top_k": ...}` and answers with an
//! array of records carrying the document text as `text` or `pageContent`.

use std::time::Duration;

use async_trait::async_trait;
use ragent_core::{ContextDocument, RetrievalError, Retriever};
use serde::Deserialize;
use tracing::debug;

pub struct HttpRetriever {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(alias = "pageContent")]
    text: String,
}

impl HttpRetriever {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextDocument>, RetrievalError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::QueryFailed(format!(
                "search service returned HTTP {}",
                status.as_u16()
            )));
        }

        let records: Vec<Record> = response
            .json()
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("invalid search response: {e}")))?;

        debug!(hits = records.len(), "Retrieved documents");
        Ok(into_documents(records, top_k))
    }
}

fn into_documents(records: Vec<Record>, top_k: usize) -> Vec<ContextDocument> {
    records
        .into_iter()
        .take(top_k)
        .map(|r| ContextDocument::new(r.text))
        .collect()
}
