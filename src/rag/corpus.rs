//! Offline corpus preparation: question/answer pairs to an index file.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use super::embedder::Embedder;
use super::error::RetrievalError;
use super::index::{IndexFile, IndexedPassage};
use super::passage::Passage;

/// One line of the source corpus (`{"input": ..., "output": ...}`).
#[derive(Debug, Clone, Deserialize)]
pub struct QaPair {
    pub input: String,
    pub output: String,
}

/// Reads a JSONL file of [`QaPair`]s. Blank lines are skipped; malformed lines
/// are logged and skipped.
pub fn load_qa_pairs(path: &Path) -> Result<Vec<QaPair>, RetrievalError> {
    let contents = fs::read_to_string(path)?;
    let mut pairs = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<QaPair>(line) {
            Ok(pair) => pairs.push(pair),
            Err(e) => tracing::warn!("Skipping malformed line {}: {}", line_no + 1, e),
        }
    }
    Ok(pairs)
}

/// Question and answer are kept together in one passage.
pub fn qa_passages(pairs: &[QaPair], source: &str) -> Vec<Passage> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            Passage::new(
                i.to_string(),
                format!("Q: {}\nA: {}", pair.input.trim(), pair.output.trim()),
            )
            .with_metadata(json!({ "source": source, "row": i }))
        })
        .collect()
}

/// Embeds `passages` in batches and assembles an [`IndexFile`].
pub async fn build_index(
    passages: Vec<Passage>,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<IndexFile, RetrievalError> {
    let batch_size = batch_size.max(1);
    let mut entries = Vec::with_capacity(passages.len());
    let mut dimension: Option<usize> = None;

    for batch in passages.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(RetrievalError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                embeddings.len()
            )));
        }

        for (passage, embedding) in batch.iter().zip(embeddings) {
            let expected = *dimension.get_or_insert(embedding.len());
            if embedding.len() != expected {
                return Err(RetrievalError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            entries.push(IndexedPassage {
                passage: passage.clone(),
                embedding,
            });
        }
        tracing::info!("Embedded {}/{} passages", entries.len(), passages.len());
    }

    let dimension = dimension
        .ok_or_else(|| RetrievalError::InvalidIndex("corpus has no passages".to_string()))?;

    Ok(IndexFile {
        dimension,
        model: Some(embedder.name().to_string()),
        passages: entries,
    })
}
