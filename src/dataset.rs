//! dataset.rs — ground-truth rows and the dataset collaborator.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{LoadGenError, Result};

/// Dense embedding; dimensionality is fixed per benchmark run.
pub type Vector = Vec<f32>;

/// One row of the ground-truth dataset. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub id: i64,
    pub vector: Vector,
    pub label: String,
}

impl DataRow {
    pub fn new(id: i64, vector: Vector, label: impl Into<String>) -> Self {
        Self { id, vector, label: label.into() }
    }
}

/// Source of the rows that are inserted into the SUT and later used to
/// recompute exact neighbours.
pub trait DataSource: Send + Sync {
    fn load_dataset(&self) -> Result<Vec<DataRow>>;
}

impl DataSource for Vec<DataRow> {
    fn load_dataset(&self) -> Result<Vec<DataRow>> {
        Ok(self.clone())
    }
}

/// Whitespace separated text embeddings, one row per line:
/// `label v0 v1 ... vN`. The row id is the zero-based line number.
#[derive(Debug, Clone)]
pub struct TextDataset {
    path: PathBuf,
}

impl TextDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for TextDataset {
    fn load_dataset(&self) -> Result<Vec<DataRow>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut rows = Vec::new();
        let mut dims: Option<usize> = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = parse_line(line_no, &line)?;
            match dims {
                None => dims = Some(row.vector.len()),
                Some(d) if d != row.vector.len() => {
                    return Err(LoadGenError::DimensionMismatch {
                        expected: d,
                        found: row.vector.len(),
                    });
                }
                Some(_) => {}
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<DataRow> {
    let mut parts = line.split_whitespace();
    let label = parts.next().unwrap_or_default();
    let vector = parts
        .map(|tok| {
            tok.parse::<f32>().map_err(|e| {
                LoadGenError::Io(format!("line {}: bad component {:?}: {}", line_no + 1, tok, e))
            })
        })
        .collect::<Result<Vector>>()?;
    Ok(DataRow::new(line_no as i64, vector, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_labelled_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "the 0.1 0.2 0.3").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "cat -1 2.5 0").unwrap();

        let rows = TextDataset::new(f.path()).load_dataset().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], DataRow::new(0, vec![0.1, 0.2, 0.3], "the"));
        // Ids follow line numbers, blank lines included.
        assert_eq!(rows[1].id, 2);
        assert_eq!(rows[1].label, "cat");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "a 1 2").unwrap();
        writeln!(f, "b 1 2 3").unwrap();

        let err = TextDataset::new(f.path()).load_dataset().unwrap_err();
        assert_eq!(err, LoadGenError::DimensionMismatch { expected: 2, found: 3 });
    }

    #[test]
    fn bad_float_names_the_line() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "a 1 x").unwrap();

        let err = TextDataset::new(f.path()).load_dataset().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TextDataset::new("/definitely/not/here.txt").load_dataset().unwrap_err();
        assert!(matches!(err, LoadGenError::Io(_)));
    }
}
