//! Mean cosine similarity of each project's sentences to the query.
//!
//! Every query rescans every labelled sentence; there is no index structure.

use std::cmp::Ordering;

use serde::Serialize;

use super::embeddings::{EmbeddingError, SentenceEmbedder};
use super::preprocess::normalize;
use crate::corpus::LabelledTextIndex;
use crate::errors::{PipelineError, PipelineResult};

/// A project and its mean similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProject {
    pub name: String,
    pub score: f32,
}

/// Rank the projects of `labelled` against `query` and keep the best `top_k`.
///
/// The result is sorted by score, highest first; equal scores keep index
/// order. A project without sentences fails the whole query.
pub fn score(
    query: &str,
    top_k: usize,
    labelled: &LabelledTextIndex,
    embedder: &dyn SentenceEmbedder,
) -> PipelineResult<Vec<ScoredProject>> {
    let query_vector = embed_checked(embedder, &normalize(query))?;

    let mut scored = Vec::with_capacity(labelled.len());
    for (name, sentences) in labelled.iter() {
        if sentences.is_empty() {
            return Err(PipelineError::EmptyCorpus(name.to_string()));
        }

        let mut total = 0f32;
        for sentence in sentences {
            let vector = embed_checked(embedder, sentence)?;
            total += cosine_similarity(&vector, &query_vector);
        }

        scored.push(ScoredProject {
            name: name.to_string(),
            score: total / sentences.len() as f32,
        });
    }

    // sort_by is stable
    scored.sort_by(|a, b| descending(a.score, b.score));
    scored.truncate(top_k);

    log::debug!(
        "scored {} projects for {query:?}, best {:?}",
        labelled.len(),
        scored.first().map(|s| (&s.name, s.score))
    );

    Ok(scored)
}

fn embed_checked(embedder: &dyn SentenceEmbedder, sentence: &str) -> Result<Vec<f32>, EmbeddingError> {
    let vector = embedder.embed(sentence)?;
    if vector.len() != embedder.dimensions() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: embedder.dimensions(),
            got: vector.len(),
        });
    }
    Ok(vector)
}

/// Highest score first, NaN last. Total, unlike a bare `partial_cmp`, and
/// still treats `-0.0` and `0.0` as a tie.
fn descending(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// `dot(a, b) / (|a| * |b|)`, or 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot_product / (norm_a * norm_b)
}
