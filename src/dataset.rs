use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use crate::config::DatasetSchema;
use crate::errors::{PipelineError, PipelineResult};

/// Key reserved for the header entry of the persisted metadata index.
pub const RESERVED_NAME: &str = "header";

/// One project row of the dataset, typed through the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub name: String,
    pub description: String,
    pub technologies: String,
    /// Values of the schema's corpus columns, in schema order
    pub corpus_fields: Vec<String>,
    /// Values of the schema's metadata columns, aligned to `Dataset::metadata_header`
    pub metadata: Vec<String>,
    pub confidential: bool,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    path: String,
    metadata_header: Vec<String>,
    records: Vec<ProjectRecord>,
}

impl Dataset {
    /// Read and validate a CSV project dataset.
    ///
    /// Columns are consumed positionally, so every row must have exactly as many
    /// fields as the header and the header must cover every schema column plus
    /// the trailing confidentiality marker. Anything else is a `DataFormat` error.
    pub fn load(path: &Path, schema: &DatasetSchema) -> PipelineResult<Self> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| PipelineError::from_io_at(e, path))?;

        let now = Instant::now();
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let required = schema.max_column() + 2;
        if columns.len() < required {
            return Err(PipelineError::data_format(
                &display,
                format!(
                    "header has {} columns, schema needs at least {required} (last one is the confidentiality marker)",
                    columns.len()
                ),
            ));
        }
        let marker_column = columns.len() - 1;

        let metadata_header = schema
            .metadata_columns
            .iter()
            .map(|&i| columns[i].clone())
            .collect();

        let mut seen = HashSet::new();
        let mut records = vec![];
        for (idx, record) in csv_reader.records().enumerate() {
            let row = idx + 1;
            let record = record?;

            if record.len() != columns.len() {
                return Err(PipelineError::data_format(
                    &display,
                    format!(
                        "row {row}: expected {} fields, found {}",
                        columns.len(),
                        record.len()
                    ),
                ));
            }

            let field = |i: usize| record.get(i).unwrap_or_default().to_string();

            let marker = field(marker_column);
            let confidential = if marker.trim() == schema.confidential_marker {
                true
            } else if marker.trim() == schema.public_marker {
                false
            } else {
                return Err(PipelineError::data_format(
                    &display,
                    format!(
                        "row {row}: confidentiality marker {marker:?} is neither {:?} nor {:?}",
                        schema.confidential_marker, schema.public_marker
                    ),
                ));
            };

            let name = field(schema.name_column).trim().to_string();
            if name.is_empty() {
                return Err(PipelineError::data_format(
                    &display,
                    format!("row {row}: project name is empty"),
                ));
            }
            if name.contains(['\n', '\r']) {
                return Err(PipelineError::data_format(
                    &display,
                    format!("row {row}: project name {name:?} spans several lines"),
                ));
            }
            if name == RESERVED_NAME {
                return Err(PipelineError::data_format(
                    &display,
                    format!("row {row}: project name {RESERVED_NAME:?} is reserved"),
                ));
            }
            if !seen.insert(name.clone()) {
                return Err(PipelineError::data_format(
                    &display,
                    format!("row {row}: duplicate project name {name:?}"),
                ));
            }

            records.push(ProjectRecord {
                name,
                description: field(schema.description_column),
                technologies: field(schema.technologies_column),
                corpus_fields: schema.corpus_columns.iter().map(|&i| field(i)).collect(),
                metadata: schema.metadata_columns.iter().map(|&i| field(i)).collect(),
                confidential,
            });
        }

        log::debug!(
            "took {}ms to read {} projects from {display}",
            now.elapsed().as_micros() as f64 / 1000.0,
            records.len()
        );

        Ok(Dataset {
            path: display,
            metadata_header,
            records,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata_header(&self) -> &[String] {
        &self.metadata_header
    }

    pub fn records(&self) -> &[ProjectRecord] {
        &self.records
    }

    /// Rows that may appear in public outputs.
    pub fn visible(&self, include_confidential: bool) -> impl Iterator<Item = &ProjectRecord> {
        self.records
            .iter()
            .filter(move |record| include_confidential || !record.confidential)
    }
}
