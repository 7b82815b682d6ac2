use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::ordered::OrderedEntries;
use crate::dataset::Dataset;
use crate::errors::PipelineResult;
use crate::semantic::preprocess::{normalize, split_sentences};
use crate::storage;

/// Project name -> normalized description sentences, in dataset order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelledTextIndex {
    entries: OrderedEntries,
}

impl LabelledTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the sentences of `name`, keeping its first position.
    pub fn insert(&mut self, name: impl Into<String>, sentences: Vec<String>) {
        let name = name.into();
        match self.entries.0.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = sentences,
            None => self.entries.0.push((name, sentences)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, sentences)| sentences.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .0
            .iter()
            .map(|(key, sentences)| (key.as_str(), sentences.as_slice()))
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.0.is_empty()
    }

    /// Keep only the projects accepted by `keep`, order unchanged.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.0.retain(|(key, _)| keep(key));
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = storage::read_artifact(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        storage::write_atomic(path, &serde_json::to_vec(self)?)?;
        Ok(())
    }
}

/// Sentence-split and normalize (no stemming) every retained description.
///
/// Confidential rows are skipped one by one; rows after a confidential one are
/// still indexed.
pub fn build_labelled_text_index(
    dataset: &Dataset,
    include_confidential: bool,
    path: &Path,
) -> PipelineResult<LabelledTextIndex> {
    let mut index = LabelledTextIndex::new();

    for record in dataset.visible(include_confidential) {
        let sentences: Vec<String> = split_sentences(&record.description)
            .into_iter()
            .map(normalize)
            .filter(|sentence| !sentence.trim().is_empty())
            .collect();

        if sentences.is_empty() {
            log::warn!(
                "project {:?} has no usable description sentences; searches will fail until it is fixed",
                record.name
            );
        }

        index.insert(record.name.clone(), sentences);
    }

    index.save(path)?;
    log::info!("Saved labelled text for {} projects to {}", index.len(), path.display());

    Ok(index)
}
