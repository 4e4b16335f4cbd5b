//! In-memory retriever: keyword scoring over documents held in process.
//!
//! Useful for tests, demos, and deployments without an external index.

use async_trait::async_trait;
use ragent_core::error::RetrievalError;
use ragent_core::retrieval::{ContextDocument, Retriever};
use std::sync::RwLock;

/// Query terms shorter than this are ignored.
const MIN_TERM_LEN: usize = 3;

pub struct InMemoryRetriever {
    documents: RwLock<Vec<String>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    pub fn with_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            documents: RwLock::new(documents.into_iter().map(Into::into).collect()),
        }
    }

    pub fn add(&self, text: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.into());
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

fn terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Term occurrences, damped by document length so long documents don't win
/// on volume alone.
fn score(document: &str, terms: &[String]) -> f32 {
    let lower = document.to_lowercase();
    let hits: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
    hits as f32 / (document.len() as f32 / 100.0).max(1.0)
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextDocument>, RetrievalError> {
        let terms = terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(f32, &String)> = documents
            .iter()
            .map(|doc| (score(doc, &terms), doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, doc)| ContextDocument::new(doc.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever() -> InMemoryRetriever {
        InMemoryRetriever::with_documents([
            "Rust is great for systems programming",
            "Python is great for scripting",
            "JavaScript runs in the browser",
            "Rust compiles to native code; Rust has no garbage collector",
        ])
    }

    #[tokio::test]
    async fn search_by_keyword() {
        let results = retriever().search("Tell me about Rust", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        // Two mentions beat one.
        assert!(results[0].text.contains("garbage collector"));
        assert!(results[1].text.contains("systems programming"));
    }

    #[tokio::test]
    async fn top_k_limits_results() {
        let results = retriever().search("great rust browser", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn short_terms_are_ignored() {
        let results = retriever().search("is to of", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn no_match_returns_empty() {
        let results = retriever().search("haskell", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn add_documents() {
        let r = InMemoryRetriever::new();
        assert!(r.is_empty());
        r.add("The office opens at nine");
        assert_eq!(r.len(), 1);
        let results = r.search("when does the office open?", 3).await.unwrap();
        assert_eq!(results[0].text, "The office opens at nine");
    }

    #[tokio::test]
    async fn noop_finds_nothing() {
        let results = crate::NoopRetriever.search("anything", 3).await.unwrap();
        assert!(results.is_empty());
    }
}
