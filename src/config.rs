use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

/// Default boosting percentage (share of the base corpus line count)
const DEFAULT_BOOSTING_PERCENTAGE: f64 = 0.05;
const DEFAULT_EPOCHS: u32 = 50;
const DEFAULT_DIMENSIONS: u32 = 50;
/// Default pretrained model when the fastembed backend is selected
const DEFAULT_FASTEMBED_MODEL: &str = "bge-small-en-v1.5";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TOP_K: usize = 3;

/// Relative locations of every persisted artifact, resolved against the base path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_base_corpus")]
    pub base_corpus: String,
    #[serde(default = "default_boosted_corpus")]
    pub boosted_corpus: String,
    #[serde(default = "default_cleaned_corpus")]
    pub cleaned_corpus: String,
    #[serde(default = "default_labelled_text")]
    pub labelled_text: String,
    #[serde(default = "default_metadata")]
    pub metadata: String,
    #[serde(default = "default_project_names")]
    pub project_names: String,
    /// Model path without extension; `.vec`/`.bin` are appended by the trainer
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_scrape_dir")]
    pub scrape_dir: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_corpus: default_base_corpus(),
            boosted_corpus: default_boosted_corpus(),
            cleaned_corpus: default_cleaned_corpus(),
            labelled_text: default_labelled_text(),
            metadata: default_metadata(),
            project_names: default_project_names(),
            model: default_model(),
            manifest: default_manifest(),
            scrape_dir: default_scrape_dir(),
        }
    }
}

fn default_base_corpus() -> String {
    "corpus/corpus-without-project-data.txt".to_string()
}
fn default_boosted_corpus() -> String {
    "corpus/corpus-merged.txt".to_string()
}
fn default_cleaned_corpus() -> String {
    "corpus/corpus-merged-cleaned.txt".to_string()
}
fn default_labelled_text() -> String {
    "corpus/labelled-text.json".to_string()
}
fn default_metadata() -> String {
    "corpus/metadata.json".to_string()
}
fn default_project_names() -> String {
    "corpus/project_names.txt".to_string()
}
fn default_model() -> String {
    "embeddings/word-vectors".to_string()
}
fn default_manifest() -> String {
    "embeddings/model.json".to_string()
}
fn default_scrape_dir() -> String {
    "scrape".to_string()
}

impl ArtifactsConfig {
    pub fn resolve(&self, root: &Path) -> ArtifactPaths {
        ArtifactPaths {
            root: root.to_path_buf(),
            base_corpus: root.join(&self.base_corpus),
            boosted_corpus: root.join(&self.boosted_corpus),
            cleaned_corpus: root.join(&self.cleaned_corpus),
            labelled_text: root.join(&self.labelled_text),
            metadata: root.join(&self.metadata),
            project_names: root.join(&self.project_names),
            model: root.join(&self.model),
            manifest: root.join(&self.manifest),
            scrape_dir: root.join(&self.scrape_dir),
        }
    }
}

/// Absolute artifact locations handed to every pipeline component.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub base_corpus: PathBuf,
    pub boosted_corpus: PathBuf,
    pub cleaned_corpus: PathBuf,
    pub labelled_text: PathBuf,
    pub metadata: PathBuf,
    pub project_names: PathBuf,
    pub model: PathBuf,
    pub manifest: PathBuf,
    pub scrape_dir: PathBuf,
}

impl ArtifactPaths {
    /// Default layout under `root`.
    #[cfg(test)]
    pub fn under(root: &Path) -> Self {
        ArtifactsConfig::default().resolve(root)
    }

    pub fn model_vectors(&self) -> PathBuf {
        with_suffix(&self.model, "vec")
    }

    pub fn model_binary(&self) -> PathBuf {
        with_suffix(&self.model, "bin")
    }

    /// Same layout with every build output moved under `dir`; the base corpus
    /// and scrape directory stay where they are.
    pub fn staged_in(&self, dir: &Path) -> Self {
        let rebase = |p: &Path| match p.strip_prefix(&self.root) {
            Ok(relative) => dir.join(relative),
            Err(_) => dir.join(p.file_name().unwrap_or(p.as_os_str())),
        };

        Self {
            root: dir.to_path_buf(),
            base_corpus: self.base_corpus.clone(),
            boosted_corpus: rebase(&self.boosted_corpus),
            cleaned_corpus: rebase(&self.cleaned_corpus),
            labelled_text: rebase(&self.labelled_text),
            metadata: rebase(&self.metadata),
            project_names: rebase(&self.project_names),
            model: rebase(&self.model),
            manifest: rebase(&self.manifest),
            scrape_dir: self.scrape_dir.clone(),
        }
    }

    /// Every artifact a build produces, base corpus and scrape batches excluded.
    pub fn outputs(&self) -> Vec<&Path> {
        vec![
            &self.boosted_corpus,
            &self.cleaned_corpus,
            &self.labelled_text,
            &self.metadata,
            &self.project_names,
        ]
    }
}

/// `word-vectors` + `vec` -> `word-vectors.vec`, keeping dots already in the name.
fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Positional layout of the project dataset (0-based column indices).
///
/// The confidentiality marker is always the last column.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DatasetSchema {
    #[serde(default = "default_name_column")]
    pub name_column: usize,
    #[serde(default = "default_description_column")]
    pub description_column: usize,
    #[serde(default = "default_technologies_column")]
    pub technologies_column: usize,
    #[serde(default = "default_corpus_columns")]
    pub corpus_columns: Vec<usize>,
    #[serde(default = "default_metadata_columns")]
    pub metadata_columns: Vec<usize>,
    /// Marker value of a confidential row
    #[serde(default = "default_confidential_marker")]
    pub confidential_marker: String,
    /// Marker value of a public row
    #[serde(default = "default_public_marker")]
    pub public_marker: String,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            name_column: default_name_column(),
            description_column: default_description_column(),
            technologies_column: default_technologies_column(),
            corpus_columns: default_corpus_columns(),
            metadata_columns: default_metadata_columns(),
            confidential_marker: default_confidential_marker(),
            public_marker: default_public_marker(),
        }
    }
}

fn default_name_column() -> usize {
    2
}
fn default_description_column() -> usize {
    3
}
fn default_technologies_column() -> usize {
    4
}
fn default_corpus_columns() -> Vec<usize> {
    vec![2, 3, 4]
}
fn default_metadata_columns() -> Vec<usize> {
    vec![4, 5, 6, 7, 8]
}
fn default_confidential_marker() -> String {
    "Yes".to_string()
}
fn default_public_marker() -> String {
    "No".to_string()
}

impl DatasetSchema {
    /// Highest column index referenced by the schema, marker excluded.
    pub fn max_column(&self) -> usize {
        [
            self.name_column,
            self.description_column,
            self.technologies_column,
        ]
        .into_iter()
        .chain(self.corpus_columns.iter().copied())
        .chain(self.metadata_columns.iter().copied())
        .max()
        .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn with_corpus_columns(mut self, columns: Vec<usize>) -> Self {
        self.corpus_columns = columns;
        self
    }

    #[cfg(test)]
    pub fn with_metadata_columns(mut self, columns: Vec<usize>) -> Self {
        self.metadata_columns = columns;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_boosting_percentage")]
    pub boosting_percentage: f64,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
    /// fastText executable used for unsupervised training
    #[serde(default = "default_fasttext_bin")]
    pub fasttext_bin: String,
    #[serde(default)]
    pub include_confidential: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            boosting_percentage: DEFAULT_BOOSTING_PERCENTAGE,
            epochs: DEFAULT_EPOCHS,
            dimensions: DEFAULT_DIMENSIONS,
            fasttext_bin: default_fasttext_bin(),
            include_confidential: false,
        }
    }
}

fn default_boosting_percentage() -> f64 {
    DEFAULT_BOOSTING_PERCENTAGE
}
fn default_epochs() -> u32 {
    DEFAULT_EPOCHS
}
fn default_dimensions() -> u32 {
    DEFAULT_DIMENSIONS
}
fn default_fasttext_bin() -> String {
    "fasttext".to_string()
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Word vectors trained on the cleaned corpus
    #[default]
    WordVectors,
    /// Pretrained fastembed sentence model; not retrainable
    Fastembed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Model name for the fastembed backend (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_fastembed_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_fastembed_model(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_fastembed_model() -> String {
    DEFAULT_FASTEMBED_MODEL.to_string()
}
fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_base_url")]
    pub base_url: String,
    #[serde(default = "default_pages_per_tag")]
    pub pages_per_tag: u32,
    #[serde(default = "default_batches")]
    pub batches: usize,
    /// Fixed pause before every request
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_summary_selector")]
    pub summary_selector: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    /// Generic tags appended after the dataset technologies
    #[serde(default = "default_extra_tags")]
    pub extra_tags: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_scrape_base_url(),
            pages_per_tag: default_pages_per_tag(),
            batches: default_batches(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            summary_selector: default_summary_selector(),
            link_selector: default_link_selector(),
            extra_tags: default_extra_tags(),
        }
    }
}

fn default_scrape_base_url() -> String {
    "https://stackoverflow.com".to_string()
}
fn default_pages_per_tag() -> u32 {
    3
}
fn default_batches() -> usize {
    10
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_summary_selector() -> String {
    ".question-summary".to_string()
}
fn default_link_selector() -> String {
    ".question-hyperlink".to_string()
}
fn default_extra_tags() -> Vec<String> {
    vec![
        "machine-learning".to_string(),
        "nlp".to_string(),
        "cv".to_string(),
    ]
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub dataset: DatasetSchema,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let training = &self.training;
        if !training.boosting_percentage.is_finite() || training.boosting_percentage < 0.0 {
            bail!(
                "training.boosting_percentage must be a finite number >= 0, got {}",
                training.boosting_percentage
            );
        }
        if training.epochs == 0 {
            bail!("training.epochs must be greater than 0");
        }
        if training.dimensions == 0 {
            bail!("training.dimensions must be greater than 0");
        }

        let schema = &self.dataset;
        if schema.corpus_columns.is_empty() {
            bail!("dataset.corpus_columns must not be empty");
        }
        if schema.metadata_columns.is_empty() {
            bail!("dataset.metadata_columns must not be empty");
        }
        if schema.confidential_marker == schema.public_marker {
            bail!("dataset.confidential_marker and dataset.public_marker must differ");
        }

        if self.scrape.batches == 0 {
            bail!("scrape.batches must be greater than 0");
        }
        if self.search.top_k == 0 {
            bail!("search.top_k must be greater than 0");
        }
        if self.embedding.download_timeout_secs == 0 {
            bail!("embedding.download_timeout_secs must be greater than 0");
        }

        let artifacts = self.paths();
        if artifacts.base_corpus == artifacts.boosted_corpus {
            bail!("artifacts.base_corpus and artifacts.boosted_corpus must differ");
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            log::info!("Writing default config to {}", base_path.join(CONFIG_FILE).display());
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn paths(&self) -> ArtifactPaths {
        self.artifacts.resolve(&self.base_path)
    }
}
