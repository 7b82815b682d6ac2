use std::fmt;

use serde::Serialize;

use crate::corpus::MetadataIndex;
use crate::errors::{PipelineError, PipelineResult};
use crate::semantic::ScoredProject;

pub const PROJECT_COLUMN: &str = "Project";
pub const SCORE_COLUMN: &str = "Similarity score";
pub const PROJECT_NAME_COLUMN: &str = "Project name";

/// Column names plus rows of cell strings, each row as wide as `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the named column, top to bottom.
    #[cfg(test)]
    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let write_row = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let line = cells
                .iter()
                .zip(widths.iter().copied())
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line.trim_end())
        };

        write_row(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(f, &rule)?;
        for row in &self.rows {
            write_row(f, row)?;
        }
        Ok(())
    }
}

/// Ranked projects as a table, with scores to four decimals when asked for.
pub fn to_table(scored: &[ScoredProject], include_scores: bool) -> Table {
    let mut columns = vec![PROJECT_COLUMN.to_string()];
    if include_scores {
        columns.push(SCORE_COLUMN.to_string());
    }

    let mut table = Table::new(columns);
    for project in scored {
        let mut row = vec![project.name.clone()];
        if include_scores {
            row.push(format!("{:.4}", project.score));
        }
        table.rows.push(row);
    }
    table
}

/// One row per name: metadata values in header order, then the name itself.
pub fn to_metadata_table<S: AsRef<str>>(names: &[S], metadata: &MetadataIndex) -> PipelineResult<Table> {
    let mut columns = metadata.header().to_vec();
    columns.push(PROJECT_NAME_COLUMN.to_string());

    let mut table = Table::new(columns);
    for name in names {
        let name = name.as_ref();
        let values = metadata
            .get(name)
            .ok_or_else(|| PipelineError::Lookup(name.to_string()))?;

        let mut row = values.to_vec();
        row.push(name.to_string());
        table.rows.push(row);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored() -> Vec<ScoredProject> {
        vec![
            ScoredProject {
                name: "Alpha".into(),
                score: 0.912345,
            },
            ScoredProject {
                name: "Gamma".into(),
                score: -0.1,
            },
        ]
    }

    fn metadata() -> MetadataIndex {
        let mut index = MetadataIndex::new(vec!["Client".into(), "Year".into()]);
        index.insert("Alpha", vec!["Acme".into(), "2020".into()]).unwrap();
        index.insert("Gamma", vec!["Globex".into(), "2022".into()]).unwrap();
        index
    }

    #[test]
    fn test_to_table_with_and_without_scores() {
        let table = to_table(&scored(), true);
        assert_eq!(table.columns, vec!["Project", "Similarity score"]);
        assert_eq!(table.rows[0], vec!["Alpha", "0.9123"]);
        assert_eq!(table.rows[1], vec!["Gamma", "-0.1000"]);

        let table = to_table(&scored(), false);
        assert_eq!(table.columns, vec!["Project"]);
        assert_eq!(table.column_values("Project").unwrap(), vec!["Alpha", "Gamma"]);
        assert!(table.column_values("Similarity score").is_none());
    }

    #[test]
    fn test_metadata_table_roundtrip() {
        let metadata = metadata();
        let ranked = to_table(&scored(), true);
        let names = ranked.column_values(PROJECT_COLUMN).unwrap();

        let table = to_metadata_table(&names, &metadata).unwrap();
        assert_eq!(table.columns.len(), metadata.header().len() + 1);
        assert_eq!(table.columns.last().unwrap(), PROJECT_NAME_COLUMN);
        assert_eq!(table.rows[1], vec!["Globex", "2022", "Gamma"]);
    }

    #[test]
    fn test_metadata_table_unknown_name() {
        assert!(matches!(
            to_metadata_table(&["Nope"], &metadata()),
            Err(PipelineError::Lookup(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_display_aligns_columns() {
        let rendered = to_table(&scored(), true).to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "Project  Similarity score");
        assert_eq!(lines[1], "-------  ----------------");
        assert_eq!(lines[2], "Alpha    0.9123");
        assert_eq!(lines[3], "Gamma    -0.1000");
    }
}
