//! Retrieval over a fixed, pre-embedded passage corpus.
//!
//! - `Embedder`: text to vectors (same model offline and online)
//! - `VectorIndex` / `FlatIndex`: nearest-neighbour search over passages
//! - `Retriever`: the turn-facing wrapper that never fails a turn
//! - `corpus`: builds index files from question/answer pairs

pub mod corpus;
mod embedder;
mod error;
mod index;
mod passage;
mod retriever;
pub mod vector_math;

pub use embedder::{Embedder, HttpEmbedder};
pub use error::RetrievalError;
pub use index::{FlatIndex, IndexFile, IndexedPassage, VectorIndex};
pub use passage::{Passage, RetrievedPassage};
pub use retriever::{Retriever, RetrieverStatus};
