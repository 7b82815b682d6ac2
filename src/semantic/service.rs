//! Query path over the persisted artifacts.
//!
//! Loads the labelled-text index, metadata and project names once, then
//! answers any number of queries with the injected embedder. Artifacts are
//! never rebuilt here; a missing one is reported with its path.

use std::time::Instant;

use serde::Serialize;

use crate::config::{ArtifactPaths, EmbeddingBackend, EmbeddingConfig};
use crate::corpus::{LabelledTextIndex, MetadataIndex, ProjectNames};
use crate::errors::PipelineResult;
use crate::format::{self, Table};
use crate::semantic::{score, ScoredProject, SentenceEmbedder, WordVectorModel};

/// Result of one query: raw scores plus both display tables.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Empty once scores are hidden
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scored: Vec<ScoredProject>,
    pub ranked: Table,
    pub metadata: Table,
}

impl SearchOutcome {
    /// Drop every score, from the raw list and from the ranked table.
    pub fn hide_scores(&mut self) {
        self.ranked = format::to_table(&self.scored, false);
        self.scored.clear();
    }
}

pub struct SearchService {
    labelled: LabelledTextIndex,
    metadata: MetadataIndex,
    embedder: Box<dyn SentenceEmbedder>,
}

impl SearchService {
    /// Load the published artifacts under `paths`.
    ///
    /// Only projects listed in the project-name file are searchable.
    pub fn open(paths: &ArtifactPaths, embedder: Box<dyn SentenceEmbedder>) -> PipelineResult<Self> {
        let now = Instant::now();

        let names = ProjectNames::load(&paths.project_names)?;
        let mut labelled = LabelledTextIndex::load(&paths.labelled_text)?;
        let metadata = MetadataIndex::load(&paths.metadata)?;

        let allowed = names.to_set();
        let before = labelled.len();
        labelled.retain(|name| allowed.contains(name));
        if labelled.is_empty() {
            log::warn!("no searchable projects in {}", paths.labelled_text.display());
        }
        if labelled.len() != before {
            log::warn!(
                "{} labelled projects are not in {} and were skipped",
                before - labelled.len(),
                paths.project_names.display()
            );
        }

        log::debug!(
            "took {}ms to open {} searchable projects",
            now.elapsed().as_micros() as f64 / 1000.0,
            labelled.len()
        );

        Ok(Self::from_parts(labelled, metadata, embedder))
    }

    pub fn from_parts(
        labelled: LabelledTextIndex,
        metadata: MetadataIndex,
        embedder: Box<dyn SentenceEmbedder>,
    ) -> Self {
        Self {
            labelled,
            metadata,
            embedder,
        }
    }

    pub fn project_count(&self) -> usize {
        self.labelled.len()
    }

    pub fn search(&self, query: &str, top_k: usize) -> PipelineResult<SearchOutcome> {
        let scored = score(query, top_k, &self.labelled, self.embedder.as_ref())?;
        let ranked = format::to_table(&scored, true);

        let names: Vec<&str> = scored.iter().map(|s| s.name.as_str()).collect();
        let metadata = format::to_metadata_table(&names, &self.metadata)?;

        Ok(SearchOutcome {
            scored,
            ranked,
            metadata,
        })
    }
}

/// Embedder of the configured backend.
pub fn load_embedder(
    config: &EmbeddingConfig,
    paths: &ArtifactPaths,
) -> PipelineResult<Box<dyn SentenceEmbedder>> {
    match config.backend {
        EmbeddingBackend::WordVectors => Ok(Box::new(WordVectorModel::load(&paths.model_vectors())?)),
        EmbeddingBackend::Fastembed => load_fastembed(config, paths),
    }
}

#[cfg(feature = "fastembed")]
fn load_fastembed(
    config: &EmbeddingConfig,
    paths: &ArtifactPaths,
) -> PipelineResult<Box<dyn SentenceEmbedder>> {
    let model = crate::semantic::FastEmbedModel::new(
        &config.model,
        paths.root.clone(),
        std::time::Duration::from_secs(config.download_timeout_secs),
    )?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "fastembed"))]
fn load_fastembed(
    _config: &EmbeddingConfig,
    _paths: &ArtifactPaths,
) -> PipelineResult<Box<dyn SentenceEmbedder>> {
    Err(crate::semantic::EmbeddingError::Unavailable("fastembed".to_string()).into())
}
