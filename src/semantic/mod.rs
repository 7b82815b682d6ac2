//! Embedding, training and similarity search for the project catalog.
//!
//! # Architecture
//!
//! - `preprocess`: text normalization shared by corpus building and queries
//! - `embeddings`: `SentenceEmbedder` capability and the fastembed backend
//! - `word_vectors`: averaged fastText word vectors
//! - `trainer`: `EmbeddingTrainer` capability and the `fasttext` CLI trainer
//! - `scorer`: per-project mean cosine similarity and ranking
//! - `service`: artifact loading and the query path

pub mod embeddings;
pub mod preprocess;
pub mod scorer;
pub mod service;
pub mod trainer;
pub mod word_vectors;

#[cfg(feature = "fastembed")]
pub use embeddings::FastEmbedModel;
pub use embeddings::{EmbeddingError, SentenceEmbedder};
pub use scorer::{score, ScoredProject};
pub use service::{load_embedder, SearchService};
pub use trainer::{EmbeddingTrainer, FastTextTrainer, TrainParams, TrainingError};
pub use word_vectors::WordVectorModel;
