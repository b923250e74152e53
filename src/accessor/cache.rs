use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use log::debug;

use crate::archive::reader::{ArchiveReader, VariableArray};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// CachedVariable
// ---------------------------------------------------------------------------

/// One variable of one archive file, with its epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVariable {
    epochs: Vec<i64>,
    values: VariableArray,
}

impl CachedVariable {
    pub fn new(epochs: Vec<i64>, values: VariableArray) -> Result<Self> {
        values.validate()?;
        if epochs.len() != values.samples() {
            return Err(DatasetError::Consistency(format!(
                "{} epochs but {} samples",
                epochs.len(),
                values.samples()
            )));
        }
        Ok(CachedVariable { epochs, values })
    }

    /// Read `variable` and its time tags from `path`.
    ///
    /// With `keep`, only samples whose epoch is in the set are retained.
    pub fn load(
        reader: &dyn ArchiveReader,
        path: &Path,
        variable: &str,
        epoch_variable: &str,
        keep: Option<&HashSet<i64>>,
    ) -> Result<Self> {
        let epochs = reader.read_epochs(path, epoch_variable)?;
        let values = reader.read_values(path, variable)?;
        let full = CachedVariable::new(epochs, values)?;
        Ok(match keep {
            Some(keep) => full.retain(keep),
            None => full,
        })
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Position whose epoch equals `epoch` exactly.
    pub fn position(&self, epoch: i64) -> Option<usize> {
        self.epochs.iter().position(|&e| e == epoch)
    }

    pub fn epoch_at(&self, position: usize) -> Option<i64> {
        self.epochs.get(position).copied()
    }

    pub fn sample(&self, position: usize) -> Option<VariableArray> {
        self.values.sample(position)
    }

    fn retain(self, keep: &HashSet<i64>) -> Self {
        let width: usize = self.values.sample_shape().iter().product();
        let mut epochs = Vec::new();
        let mut data = Vec::new();
        for (i, &epoch) in self.epochs.iter().enumerate() {
            if keep.contains(&epoch) {
                epochs.push(epoch);
                data.extend_from_slice(&self.values.data[i * width..(i + 1) * width]);
            }
        }
        let mut shape = self.values.shape.clone();
        shape[0] = epochs.len();
        CachedVariable {
            epochs,
            values: VariableArray { shape, data },
        }
    }
}

// ---------------------------------------------------------------------------
// FileCache
// ---------------------------------------------------------------------------

/// Loaded variables keyed by archive file name, then variable name.
///
/// Entries live as long as the cache; archive files never change once fetched.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<String, HashMap<String, CachedVariable>>,
    loads: usize,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, file: &str, variable: &str) -> bool {
        self.entries.get(file).is_some_and(|v| v.contains_key(variable))
    }

    pub fn get(&self, file: &str, variable: &str) -> Option<&CachedVariable> {
        self.entries.get(file)?.get(variable)
    }

    /// Cached entry, loading it on first use.
    pub fn get_or_load<F>(&mut self, file: &str, variable: &str, load: F) -> Result<&CachedVariable>
    where
        F: FnOnce() -> Result<CachedVariable>,
    {
        if !self.contains(file, variable) {
            let loaded = load()?;
            debug!("Cached {variable} from {file} ({} samples)", loaded.len());
            self.loads += 1;
            self.entries
                .entry(file.to_string())
                .or_default()
                .insert(variable.to_string(), loaded);
        }
        self.get(file, variable)
            .ok_or_else(|| DatasetError::Consistency(format!("{variable} from {file} missing from cache")))
    }

    /// Names of the files with at least one cached variable.
    pub fn files(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// How many entries were loaded so far.
    pub fn loads(&self) -> usize {
        self.loads
    }
}
