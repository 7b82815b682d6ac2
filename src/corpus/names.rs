use std::collections::HashSet;
use std::path::Path;

use crate::dataset::Dataset;
use crate::errors::PipelineResult;
use crate::storage;

/// Confidentiality-filtered project names in dataset order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectNames {
    names: Vec<String>,
}

impl ProjectNames {
    pub fn from_dataset(dataset: &Dataset, include_confidential: bool) -> Self {
        Self {
            names: dataset
                .visible(include_confidential)
                .map(|record| record.name.clone())
                .collect(),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn to_set(&self) -> HashSet<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// One name per line.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = storage::read_artifact_string(path)?;
        Ok(Self {
            names: content
                .lines()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let mut content = String::new();
        for name in &self.names {
            content.push_str(name);
            content.push('\n');
        }
        storage::write_atomic(path, content.as_bytes())?;
        Ok(())
    }
}

/// Persist the identity of every retained row, one per line, in row order.
pub fn save_project_names(
    dataset: &Dataset,
    include_confidential: bool,
    path: &Path,
) -> PipelineResult<ProjectNames> {
    let names = ProjectNames::from_dataset(dataset, include_confidential);
    names.save(path)?;
    log::info!("Saved {} project names to {}", names.len(), path.display());
    Ok(names)
}
