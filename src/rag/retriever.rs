use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::embedder::Embedder;
use super::error::RetrievalError;
use super::index::{FlatIndex, VectorIndex};
use super::passage::RetrievedPassage;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrieverStatus {
    Loaded { passages: usize, dimension: usize },
    NotLoaded { reason: String },
}

/// Turn-facing retrieval. Retrieval enhances a reply but is never required
/// for one, so [`Retriever::retrieve`] swallows every failure.
#[derive(Clone)]
pub struct Retriever {
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Arc<dyn Embedder>,
    query_prefix: String,
    load_error: Option<String>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index: Some(index),
            embedder,
            query_prefix: String::new(),
            load_error: None,
        }
    }

    /// A retriever with no index; every query returns nothing.
    pub fn unavailable(embedder: Arc<dyn Embedder>, reason: impl Into<String>) -> Self {
        Self {
            index: None,
            embedder,
            query_prefix: String::new(),
            load_error: Some(reason.into()),
        }
    }

    /// Loads a [`FlatIndex`] from disk, degrading to [`Retriever::unavailable`]
    /// when the file is missing or unreadable.
    pub fn load_or_degrade(path: &Path, embedder: Arc<dyn Embedder>) -> Self {
        match FlatIndex::load(path) {
            Ok(index) => {
                tracing::info!(
                    "Loaded passage index {} ({} passages, dim {})",
                    path.display(),
                    index.len(),
                    index.dimension()
                );
                Self::new(Arc::new(index), embedder)
            }
            Err(err) => {
                tracing::warn!(
                    "Passage index {} could not be loaded, retrieval disabled: {}",
                    path.display(),
                    err
                );
                Self::unavailable(embedder, err.to_string())
            }
        }
    }

    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = prefix.into();
        self
    }

    pub fn status(&self) -> RetrieverStatus {
        match &self.index {
            Some(index) => RetrieverStatus::Loaded {
                passages: index.len(),
                dimension: index.dimension(),
            },
            None => RetrieverStatus::NotLoaded {
                reason: self
                    .load_error
                    .clone()
                    .unwrap_or_else(|| "index not configured".to_string()),
            },
        }
    }

    /// Passages for `query`, at most `k`, best first. Empty on any failure.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedPassage> {
        match self.try_retrieve(query, k).await {
            Ok(passages) => passages,
            Err(err) => {
                tracing::warn!("Retrieval failed, continuing without context: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn try_retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let index = self.index.clone().ok_or_else(|| {
            RetrievalError::IndexUnavailable(
                self.load_error
                    .clone()
                    .unwrap_or_else(|| "index not configured".to_string()),
            )
        })?;
        if k == 0 || index.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_text = format!("{}{}", self.query_prefix, query);
        let mut embeddings = self.embedder.embed(&[query_text]).await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("embedder returned no vector".to_string()))?;
        if query_embedding.len() != index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: index.dimension(),
                actual: query_embedding.len(),
            });
        }

        let hits = tokio::task::spawn_blocking(move || {
            let ranked = index.search(&query_embedding, k)?;
            let passages = ranked
                .into_iter()
                .filter_map(|(row, score)| index.passage(row).cloned().map(|p| (p, score)))
                .take(k)
                .enumerate()
                .map(|(i, (passage, score))| RetrievedPassage {
                    passage,
                    rank: i + 1,
                    score,
                })
                .collect::<Vec<_>>();
            Ok::<_, RetrievalError>(passages)
        })
        .await
        .map_err(|e| RetrievalError::IndexUnavailable(format!("search task failed: {}", e)))??;

        tracing::debug!("Retrieved {} passages", hits.len());
        Ok(hits)
    }
}
