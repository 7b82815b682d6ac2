//! Retrain pipeline and single build steps.
//!
//! A retrain builds every artifact into a staging directory under the base
//! path and renames them over the published ones only after the whole build,
//! training included, succeeded. Files are published one rename at a time;
//! a failed rename restores the files already replaced.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ArtifactPaths, DatasetSchema};
use crate::corpus::{
    self, build_labelled_text_index, build_metadata, save_project_names, CorpusStats,
};
use crate::dataset::Dataset;
use crate::errors::{PipelineError, PipelineResult};
use crate::semantic::{EmbeddingTrainer, TrainParams};
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrainOptions {
    pub include_confidential: bool,
    pub boosting_percentage: f64,
    pub params: TrainParams,
}

#[derive(Debug, Clone)]
pub struct RetrainReport {
    pub projects: usize,
    pub sentences: usize,
    pub corpus: CorpusStats,
    pub manifest: Option<ModelManifest>,
    pub published: Vec<PathBuf>,
}

/// Provenance of a trained model, stored next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub backend: String,
    pub epochs: u32,
    pub dimensions: u32,
    pub corpus_lines: usize,
    pub corpus_sha256: String,
    pub trained_at: String,
}

impl ModelManifest {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = storage::read_artifact(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        storage::write_atomic(path, &serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

pub fn sha256_file(path: &Path) -> PipelineResult<String> {
    let mut file = File::open(path).map_err(|e| PipelineError::from_io_at(e, path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Rebuild every artifact from `dataset_path` and, with a trainer, the model.
///
/// Without a trainer (pretrained embedding backend) the training step is
/// skipped and the published model is left alone. Nothing is published
/// unless every step succeeded.
pub fn retrain(
    dataset_path: &Path,
    schema: &DatasetSchema,
    paths: &ArtifactPaths,
    options: &RetrainOptions,
    trainer: Option<&dyn EmbeddingTrainer>,
) -> PipelineResult<RetrainReport> {
    let _span = tracing::info_span!("retrain", dataset = %dataset_path.display()).entered();
    let now = Instant::now();

    let dataset = Dataset::load(dataset_path, schema)?;
    if !paths.base_corpus.exists() {
        return Err(PipelineError::MissingArtifact(paths.base_corpus.clone()));
    }

    std::fs::create_dir_all(&paths.root)?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(&paths.root)?;
    let staged = paths.staged_in(staging.path());
    log::debug!("staging build in {}", staging.path().display());

    let sentences = corpus::extract_sentences(&dataset, options.include_confidential);
    let stats = corpus::append_to_corpus(&sentences, options.boosting_percentage, &staged)?;
    build_metadata(&dataset, &staged.metadata, false)?;
    let names = save_project_names(&dataset, options.include_confidential, &staged.project_names)?;
    build_labelled_text_index(&dataset, options.include_confidential, &staged.labelled_text)?;

    let manifest = match trainer {
        Some(trainer) => {
            trainer.train(&staged.cleaned_corpus, &staged.model, options.params)?;
            let manifest = ModelManifest {
                backend: "word-vectors".to_string(),
                epochs: options.params.epochs,
                dimensions: options.params.dimensions,
                corpus_lines: stats.cleaned_lines,
                corpus_sha256: sha256_file(&staged.cleaned_corpus)?,
                trained_at: chrono::Utc::now().to_rfc3339(),
            };
            manifest.save(&staged.manifest)?;
            Some(manifest)
        }
        None => {
            log::info!("Pretrained embedding backend, skipping training");
            None
        }
    };

    let mut pairs = vec![
        (staged.model_vectors(), paths.model_vectors()),
        (staged.model_binary(), paths.model_binary()),
        (staged.manifest.clone(), paths.manifest.clone()),
    ];
    pairs.extend(
        staged
            .outputs()
            .into_iter()
            .zip(paths.outputs())
            .map(|(from, to)| (from.to_path_buf(), to.to_path_buf())),
    );

    // a model trained without a `.bin` must not sit next to an older one
    let retired = match &manifest {
        Some(_) if !staged.model_binary().exists() => vec![paths.model_binary()],
        _ => vec![],
    };
    let published = publish_release(&pairs, &retired, &staging.path().join(".previous"))?;

    log::info!(
        "Retrained on {} projects in {:.1}s, published {} artifacts",
        names.len(),
        now.elapsed().as_millis() as f64 / 1000.0,
        published.len()
    );

    Ok(RetrainReport {
        projects: names.len(),
        sentences: sentences.len(),
        corpus: stats,
        manifest,
        published,
    })
}

/// Rename every staged file over its published path and remove `retired`.
///
/// Publishing is still one rename per file. Files being replaced are first
/// moved into `backup_dir` and put back if a later rename fails, so an error
/// leaves the previous release in place; a crash midway does not.
fn publish_release(
    pairs: &[(PathBuf, PathBuf)],
    retired: &[PathBuf],
    backup_dir: &Path,
) -> PipelineResult<Vec<PathBuf>> {
    std::fs::create_dir_all(backup_dir)?;
    let mut backups: Vec<(PathBuf, PathBuf)> = vec![];
    let mut published: Vec<PathBuf> = vec![];

    let result = (|| -> std::io::Result<()> {
        let replaced = pairs
            .iter()
            .filter(|(from, _)| from.exists())
            .map(|(_, to)| to)
            .chain(retired);
        for (idx, target) in replaced.enumerate() {
            if target.exists() {
                let backup = backup_dir.join(idx.to_string());
                std::fs::rename(target, &backup)?;
                backups.push((backup, target.clone()));
            }
        }

        for (from, to) in pairs {
            if from.exists() {
                storage::publish(from, to)?;
                published.push(to.clone());
            }
        }
        Ok(())
    })();

    if let Err(err) = result {
        log::warn!("publishing failed, restoring the previous release: {err}");
        for path in &published {
            if let Err(e) = std::fs::remove_file(path) {
                log::error!("failed to remove {}: {e}", path.display());
            }
        }
        for (backup, original) in backups.iter().rev() {
            if let Err(e) = storage::publish(backup, original) {
                log::error!("failed to restore {}: {e}", original.display());
            }
        }
        return Err(err.into());
    }

    for path in retired {
        if backups.iter().any(|(_, original)| original == path) {
            log::info!("removed stale {}", path.display());
        }
    }
    Ok(published)
}

/// One Corpus Builder step run against the published paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Corpus,
    Metadata { append: bool },
    Names,
    Labels,
}

pub fn build_step(
    step: BuildStep,
    dataset_path: &Path,
    schema: &DatasetSchema,
    paths: &ArtifactPaths,
    include_confidential: bool,
    boosting_percentage: f64,
) -> PipelineResult<String> {
    let dataset = Dataset::load(dataset_path, schema)?;

    let summary = match step {
        BuildStep::Corpus => {
            let sentences = corpus::extract_sentences(&dataset, include_confidential);
            let stats = corpus::append_to_corpus(&sentences, boosting_percentage, paths)?;
            format!(
                "{} -> {} lines ({} cleaned)",
                stats.base_lines, stats.boosted_lines, stats.cleaned_lines
            )
        }
        BuildStep::Metadata { append } => {
            let index = build_metadata(&dataset, &paths.metadata, append)?;
            format!("{} projects in {}", index.len(), paths.metadata.display())
        }
        BuildStep::Names => {
            let names = save_project_names(&dataset, include_confidential, &paths.project_names)?;
            format!("{} names in {}", names.len(), paths.project_names.display())
        }
        BuildStep::Labels => {
            let index =
                build_labelled_text_index(&dataset, include_confidential, &paths.labelled_text)?;
            format!("{} projects in {}", index.len(), paths.labelled_text.display())
        }
    };

    Ok(summary)
}
