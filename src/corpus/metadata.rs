use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::corpus::ordered::OrderedEntries;
use crate::dataset::{Dataset, RESERVED_NAME};
use crate::errors::{PipelineError, PipelineResult};
use crate::storage;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n").expect("Invalid line break regex pattern"));

/// Header plus project name -> field values aligned to the header.
///
/// Persisted as one JSON object: `"header"` holds the field names, every other
/// key is a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataIndex {
    header: Vec<String>,
    entries: Vec<(String, Vec<String>)>,
}

impl MetadataIndex {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            entries: vec![],
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a project's values; their count must match the header.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) -> PipelineResult<()> {
        let name = name.into();
        if name == RESERVED_NAME {
            return Err(PipelineError::InvalidInput(format!(
                "{RESERVED_NAME:?} cannot be used as a project name"
            )));
        }
        if values.len() != self.header.len() {
            return Err(PipelineError::InvalidInput(format!(
                "metadata for {name:?} has {} values, header has {}",
                values.len(),
                self.header.len()
            )));
        }

        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((name, values)),
        }
        Ok(())
    }

    /// Merge `other` into `self`; projects present in both take `other`'s values.
    pub fn merge(&mut self, other: MetadataIndex) -> PipelineResult<()> {
        if other.header != self.header {
            return Err(PipelineError::InvalidInput(format!(
                "metadata header mismatch: stored {:?}, new {:?}",
                self.header, other.header
            )));
        }
        for (name, values) in other.entries {
            self.insert(name, values)?;
        }
        Ok(())
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

impl Serialize for MetadataIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push((RESERVED_NAME.to_string(), self.header.clone()));
        entries.extend(self.entries.iter().cloned());
        OrderedEntries(entries).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetadataIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let OrderedEntries(entries) = OrderedEntries::deserialize(deserializer)?;
        let mut header = None;
        let mut projects = Vec::with_capacity(entries.len());
        for (key, values) in entries {
            if key == RESERVED_NAME {
                header = Some(values);
            } else {
                projects.push((key, values));
            }
        }

        let header = header.ok_or_else(|| D::Error::missing_field(RESERVED_NAME))?;
        if let Some((name, values)) = projects.iter().find(|(_, v)| v.len() != header.len()) {
            return Err(D::Error::custom(format!(
                "metadata for {name:?} has {} values, header has {}",
                values.len(),
                header.len()
            )));
        }

        Ok(MetadataIndex {
            header,
            entries: projects,
        })
    }
}

/// Metadata of every dataset row, line breaks in values replaced by spaces.
pub fn metadata_from_dataset(dataset: &Dataset) -> PipelineResult<MetadataIndex> {
    let mut index = MetadataIndex::new(dataset.metadata_header().to_vec());
    for record in dataset.records() {
        let values = record
            .metadata
            .iter()
            .map(|value| LINE_BREAK.replace_all(value, " ").into_owned())
            .collect();
        index.insert(record.name.clone(), values)?;
    }
    Ok(index)
}

/// Build the metadata index of `dataset` and persist it at `path`.
///
/// Without `append` the stored index is replaced. With `append` the stored
/// index is read, the new records merged in and the single document written
/// back; a missing store is created. Callers wanting a full rebuild pass
/// `append = false`.
pub fn build_metadata(dataset: &Dataset, path: &Path, append: bool) -> PipelineResult<MetadataIndex> {
    let fresh = metadata_from_dataset(dataset)?;

    let index = if append && path.exists() {
        let mut stored = MetadataIndex::load(path)?;
        stored.merge(fresh)?;
        stored
    } else {
        fresh
    };

    index.save(path)?;
    log::info!(
        "Saved metadata for {} projects to {}{}",
        index.len(),
        path.display(),
        if append { " (merged)" } else { "" }
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetadataIndex {
        let mut index = MetadataIndex::new(vec!["Client".into(), "Year".into()]);
        index
            .insert("Alpha", vec!["Acme".into(), "2020".into()])
            .unwrap();
        index
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"header":["Client","Year"],"Alpha":["Acme","2020"]}"#);

        let back: MetadataIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_insert_rejects_misaligned_values() {
        let mut index = sample();
        assert!(index.insert("Beta", vec!["only one".into()]).is_err());
        assert!(index.insert(RESERVED_NAME, vec!["a".into(), "b".into()]).is_err());
    }

    #[test]
    fn test_deserialize_requires_header_and_alignment() {
        assert!(serde_json::from_str::<MetadataIndex>(r#"{"Alpha":["a"]}"#).is_err());
        assert!(
            serde_json::from_str::<MetadataIndex>(r#"{"header":["x","y"],"Alpha":["a"]}"#)
                .is_err()
        );
    }

    #[test]
    fn test_merge_overrides_and_appends() {
        let mut stored = sample();
        let mut incoming = MetadataIndex::new(vec!["Client".into(), "Year".into()]);
        incoming
            .insert("Beta", vec!["Globex".into(), "2021".into()])
            .unwrap();
        incoming
            .insert("Alpha", vec!["Acme Corp".into(), "2020".into()])
            .unwrap();

        stored.merge(incoming).unwrap();
        let names: Vec<_> = stored.names().collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert_eq!(stored.get("Alpha").unwrap()[0], "Acme Corp");

        let other_header = MetadataIndex::new(vec!["Client".into()]);
        assert!(stored.merge(other_header).is_err());
    }
}
