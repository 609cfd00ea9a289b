//! Dataset loading for benchmark runs.
//!
//! A run is described by an ordered list of files (`DatasetSpec`):
//!
//! 0. training data, with the label in the last column;
//! 1. test features;
//! 2. optionally, the true labels of the test set.
//!
//! Files are headerless numeric tables, comma separated unless the extension
//! is `.tsv`. Lines starting with `#` are skipped.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetSpec {
    files: Vec<PathBuf>,
}

impl DatasetSpec {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn train_file(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    pub fn test_file(&self) -> Option<&Path> {
        self.files.get(1).map(PathBuf::as_path)
    }

    pub fn labels_file(&self) -> Option<&Path> {
        self.files.get(2).map(PathBuf::as_path)
    }

    /// Error unless at least `required` files are listed.
    pub fn require(&self, required: usize) -> Result<(), BenchError> {
        if self.files.len() < required {
            return Err(BenchError::InsufficientDatasets {
                required,
                found: self.files.len(),
            });
        }
        Ok(())
    }
}

fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

/// Read a numeric table into a matrix.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter_for(path))
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let mut data = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;

    for (row, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read row {} of {}", row + 1, path.display()))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        match ncols {
            None => ncols = Some(record.len()),
            Some(expected) if expected != record.len() => bail!(
                "Row {} of {} has {} columns, expected {}",
                row + 1,
                path.display(),
                record.len(),
                expected
            ),
            Some(_) => {}
        }

        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                anyhow!(
                    "Non-numeric value {:?} at row {}, column {} of {}",
                    field,
                    row + 1,
                    col + 1,
                    path.display()
                )
            })?;
            data.push(value);
        }
        nrows += 1;
    }

    let ncols = ncols.ok_or_else(|| anyhow!("Dataset is empty: {}", path.display()))?;
    Array2::from_shape_vec((nrows, ncols), data)
        .with_context(|| format!("Failed to shape dataset: {}", path.display()))
}

/// Load the training file of `spec` and split off its last column as labels.
pub fn split_train_data(spec: &DatasetSpec) -> Result<(Array2<f64>, Array1<f64>)> {
    spec.require(1)?;
    let path = spec.files[0].as_path();
    let data = load_dataset(path)?;
    if data.ncols() < 2 {
        bail!(
            "Training data needs at least one feature column and a label column: {}",
            path.display()
        );
    }

    let last = data.ncols() - 1;
    let features = data.slice(s![.., ..last]).to_owned();
    let labels = data.column(last).to_owned();
    Ok((features, labels))
}

/// Read a label file stored either as one column or as one row.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let path = path.as_ref();
    let data = load_dataset(path)?;
    match data.dim() {
        (_, 1) => Ok(data.column(0).to_owned()),
        (1, _) => Ok(data.row(0).to_owned()),
        (rows, cols) => bail!(
            "Label file {} must be a single row or column, found {}x{}",
            path.display(),
            rows,
            cols
        ),
    }
}
