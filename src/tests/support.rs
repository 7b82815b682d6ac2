//! Fixtures shared by the cross-module tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::semantic::{EmbeddingError, EmbeddingTrainer, SentenceEmbedder, TrainParams, TrainingError};

pub const DATASET_HEADER: [&str; 10] = [
    "Id",
    "Area",
    "Project",
    "Description",
    "Technologies",
    "Client",
    "Sector",
    "Year",
    "Team",
    "Confidential",
];

/// Write `rows` under `DATASET_HEADER` to `dir/projects.csv`.
pub fn write_rows(dir: &Path, rows: &[[&str; 10]]) -> PathBuf {
    let path = dir.join("projects.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(DATASET_HEADER).unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Dataset of `(name, description, confidential marker)` rows with filler metadata.
pub fn write_dataset(dir: &Path, projects: &[(&str, &str, &str)]) -> PathBuf {
    let ids: Vec<String> = (1..=projects.len()).map(|i| i.to_string()).collect();
    let rows: Vec<[&str; 10]> = projects
        .iter()
        .zip(&ids)
        .map(|((name, description, marker), id)| {
            [
                id.as_str(),
                "Data Science",
                *name,
                *description,
                "Python, AWS",
                "Client X",
                "Public",
                "2021",
                "Team A",
                *marker,
            ]
        })
        .collect();
    write_rows(dir, &rows)
}

/// Bag of hashed lowercase words; sentences sharing words point the same way.
pub struct HashEmbedder;

impl HashEmbedder {
    pub const DIMENSIONS: usize = 1024;
}

impl SentenceEmbedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    fn embed(&self, sentence: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0f32; Self::DIMENSIONS];
        for token in sentence
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % Self::DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

/// Writes a fixed `.vec` file instead of training.
pub struct StubTrainer {
    pub vectors: String,
}

impl StubTrainer {
    pub fn new() -> Self {
        Self {
            vectors: "2 3\nsentiment 1 0 0\nfield 0 1 0\n".to_string(),
        }
    }
}

impl EmbeddingTrainer for StubTrainer {
    fn train(
        &self,
        corpus: &Path,
        output_prefix: &Path,
        _params: TrainParams,
    ) -> Result<PathBuf, TrainingError> {
        assert!(corpus.exists(), "corpus must be written before training");

        let vectors = crate::semantic::trainer::vectors_path(output_prefix);
        crate::storage::write_atomic(&vectors, self.vectors.as_bytes()).unwrap();
        Ok(vectors)
    }
}

pub struct FailingTrainer;

impl EmbeddingTrainer for FailingTrainer {
    fn train(&self, _: &Path, output_prefix: &Path, _: TrainParams) -> Result<PathBuf, TrainingError> {
        Err(TrainingError::MissingOutput(
            crate::semantic::trainer::vectors_path(output_prefix),
        ))
    }
}

pub fn train_params() -> TrainParams {
    TrainParams {
        epochs: 1,
        dimensions: 3,
    }
}
