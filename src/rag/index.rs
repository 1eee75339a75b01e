use std::fs;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::RetrievalError;
use super::passage::Passage;
use super::vector_math::{l2_normalize, rank_rows_by_inner_product};

/// Nearest-neighbour search over a fixed set of embedded passages.
pub trait VectorIndex: Send + Sync {
    /// Up to `k` `(row, score)` pairs, best first.
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RetrievalError>;

    fn passage(&self, row: usize) -> Option<&Passage>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;
}

/// On-disk form of an index: passages with their embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub dimension: usize,
    #[serde(default)]
    pub model: Option<String>,
    pub passages: Vec<IndexedPassage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPassage {
    #[serde(flatten)]
    pub passage: Passage,
    pub embedding: Vec<f32>,
}

impl IndexFile {
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            RetrievalError::IndexUnavailable(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| RetrievalError::InvalidIndex(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), RetrievalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)
            .map_err(|e| RetrievalError::InvalidIndex(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Exhaustive inner-product index over L2-normalised rows, i.e. cosine
/// similarity. Rows are normalised once at load time.
pub struct FlatIndex {
    passages: Vec<Passage>,
    matrix: Array2<f32>,
}

impl FlatIndex {
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        Self::from_file(IndexFile::load(path)?)
    }

    pub fn from_file(file: IndexFile) -> Result<Self, RetrievalError> {
        let dimension = file.dimension;
        if dimension == 0 {
            return Err(RetrievalError::InvalidIndex("dimension must be positive".to_string()));
        }

        let mut passages = Vec::with_capacity(file.passages.len());
        let mut flat = Vec::with_capacity(file.passages.len() * dimension);
        for entry in file.passages {
            if entry.embedding.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
            let mut embedding = entry.embedding;
            l2_normalize(&mut embedding);
            flat.extend(embedding);
            passages.push(entry.passage);
        }

        let matrix = Array2::from_shape_vec((passages.len(), dimension), flat)
            .map_err(|e| RetrievalError::InvalidIndex(e.to_string()))?;
        Ok(Self { passages, matrix })
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RetrievalError> {
        if k == 0 || self.passages.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = query_embedding.to_vec();
        l2_normalize(&mut query);
        let mut ranked = rank_rows_by_inner_product(&self.matrix, &query)?;
        ranked.truncate(k);
        Ok(ranked)
    }

    fn passage(&self, row: usize) -> Option<&Passage> {
        self.passages.get(row)
    }

    fn len(&self) -> usize {
        self.passages.len()
    }

    fn dimension(&self) -> usize {
        self.matrix.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexedPassage {
        IndexedPassage {
            passage: Passage::new(id, format!("content {}", id)),
            embedding,
        }
    }

    fn sample_file() -> IndexFile {
        IndexFile {
            dimension: 2,
            model: Some("test".to_string()),
            passages: vec![
                entry("a", vec![1.0, 0.0]),
                entry("b", vec![0.0, 1.0]),
                entry("c", vec![10.0, 1.0]),
                entry("d", vec![-1.0, 0.0]),
            ],
        }
    }

    #[test]
    fn search_is_bounded_by_k_and_sorted() {
        let index = FlatIndex::from_file(sample_file()).expect("index");
        let results = index.search(&[1.0, 0.0], 2).expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(index.passage(results[0].0).map(|p| p.id.as_str()), Some("a"));
        assert_eq!(index.passage(results[1].0).map(|p| p.id.as_str()), Some("c"));
        assert!(results[0].1 >= results[1].1);

        let everything = index.search(&[1.0, 0.0], 100).expect("search");
        assert_eq!(everything.len(), 4);
        assert!(everything.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn query_scale_does_not_change_ranking() {
        let index = FlatIndex::from_file(sample_file()).expect("index");
        let small = index.search(&[0.1, 0.05], 4).expect("search");
        let large = index.search(&[100.0, 50.0], 4).expect("search");
        let small_ids: Vec<_> = small.iter().map(|r| r.0).collect();
        let large_ids: Vec<_> = large.iter().map(|r| r.0).collect();
        assert_eq!(small_ids, large_ids);
    }

    #[test]
    fn rejects_inconsistent_dimensions() {
        let mut file = sample_file();
        file.passages.push(entry("bad", vec![1.0, 2.0, 3.0]));
        assert!(matches!(
            FlatIndex::from_file(file),
            Err(RetrievalError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn wrong_query_dimension_is_an_error() {
        let index = FlatIndex::from_file(sample_file()).expect("index");
        assert!(index.search(&[1.0, 0.0, 0.0], 2).is_err());
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("index.json");
        sample_file().save(&path).expect("save");

        let index = FlatIndex::load(&path).expect("load");
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimension(), 2);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = FlatIndex::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(RetrievalError::IndexUnavailable(_))));
    }
}
