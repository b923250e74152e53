//! Archive file reading.

use std::path::Path;

use crate::error::{DatasetError, Result};

/// A numeric variable read from an archive file.
///
/// `data` is row-major with `shape[0]` the sample (epoch) axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl VariableArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let array = VariableArray { shape, data };
        array.validate()?;
        Ok(array)
    }

    /// Check that `shape` has a sample axis and covers `data` exactly.
    pub fn validate(&self) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if self.shape.is_empty() || expected != self.data.len() {
            return Err(DatasetError::Format(format!(
                "shape {:?} does not match {} values",
                self.shape,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// One value per sample.
    pub fn scalar(data: Vec<f64>) -> Self {
        VariableArray {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn samples(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Shape of a single sample.
    pub fn sample_shape(&self) -> &[usize] {
        self.shape.get(1..).unwrap_or(&[])
    }

    /// The `index`-th sample, keeping its own shape.
    pub fn sample(&self, index: usize) -> Option<VariableArray> {
        if index >= self.samples() {
            return None;
        }
        let width: usize = self.sample_shape().iter().product();
        let start = index * width;
        Some(VariableArray {
            shape: self.sample_shape().to_vec(),
            data: self.data.get(start..start + width)?.to_vec(),
        })
    }
}

/// Reads named variables out of archive files.
///
/// Implementations wrap the on-disk scientific format; a missing variable
/// must be reported as [`DatasetError::Lookup`].
pub trait ArchiveReader {
    fn variable_names(&self, path: &Path) -> Result<Vec<String>>;

    /// A time-tag variable as TT2000 epochs.
    fn read_epochs(&self, path: &Path, variable: &str) -> Result<Vec<i64>>;

    /// An integer variable such as a label array.
    fn read_integers(&self, path: &Path, variable: &str) -> Result<Vec<i64>>;

    fn read_values(&self, path: &Path, variable: &str) -> Result<VariableArray>;
}
