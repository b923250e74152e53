//! In-memory stand-ins for the remote archive and the file reader.
//!
//! Useful for dry runs and tests: `MemoryRemote` serves listings and file
//! bytes, `MemoryArchive` answers variable reads keyed by file name.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;

use super::naming::{ArchiveQuery, FileDescriptor};
use super::reader::{ArchiveReader, VariableArray};
use super::remote::{Catalogue, RemoteBody, RemoteSource};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// MemoryArchive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum StoredVariable {
    Epochs(Vec<i64>),
    Integers(Vec<i64>),
    Values(VariableArray),
}

/// Archive reader over variables registered in memory.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    files: HashMap<String, BTreeMap<String, StoredVariable>>,
    reads: Cell<usize>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_epochs(&mut self, file: &str, variable: &str, epochs: Vec<i64>) {
        self.insert(file, variable, StoredVariable::Epochs(epochs));
    }

    pub fn insert_integers(&mut self, file: &str, variable: &str, values: Vec<i64>) {
        self.insert(file, variable, StoredVariable::Integers(values));
    }

    pub fn insert_values(&mut self, file: &str, variable: &str, values: VariableArray) {
        self.insert(file, variable, StoredVariable::Values(values));
    }

    /// Number of successful variable reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn insert(&mut self, file: &str, variable: &str, value: StoredVariable) {
        self.files
            .entry(file.to_string())
            .or_default()
            .insert(variable.to_string(), value);
    }

    fn lookup(&self, path: &Path, variable: &str) -> Result<&StoredVariable> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let file = self
            .files
            .get(name)
            .ok_or_else(|| DatasetError::Lookup(format!("no archive file {}", path.display())))?;
        let stored = file.get(variable).ok_or_else(|| {
            DatasetError::Lookup(format!("failed to read {variable} from {}", path.display()))
        })?;
        self.reads.set(self.reads.get() + 1);
        Ok(stored)
    }
}

impl ArchiveReader for MemoryArchive {
    fn variable_names(&self, path: &Path) -> Result<Vec<String>> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.files
            .get(name)
            .map(|vars| vars.keys().cloned().collect())
            .ok_or_else(|| DatasetError::Lookup(format!("no archive file {}", path.display())))
    }

    fn read_epochs(&self, path: &Path, variable: &str) -> Result<Vec<i64>> {
        match self.lookup(path, variable)? {
            StoredVariable::Epochs(e) | StoredVariable::Integers(e) => Ok(e.clone()),
            StoredVariable::Values(_) => Err(DatasetError::Lookup(format!(
                "{variable} in {} is not a time variable",
                path.display()
            ))),
        }
    }

    fn read_integers(&self, path: &Path, variable: &str) -> Result<Vec<i64>> {
        match self.lookup(path, variable)? {
            StoredVariable::Epochs(v) | StoredVariable::Integers(v) => Ok(v.clone()),
            StoredVariable::Values(arr) => Ok(arr.data.iter().map(|v| *v as i64).collect()),
        }
    }

    fn read_values(&self, path: &Path, variable: &str) -> Result<VariableArray> {
        match self.lookup(path, variable)? {
            StoredVariable::Values(arr) => Ok(arr.clone()),
            StoredVariable::Epochs(v) | StoredVariable::Integers(v) => {
                Ok(VariableArray::scalar(v.iter().map(|x| *x as f64).collect()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

/// Catalogue and transfer source over files registered in memory.
///
/// Archive files are listed when their parameters match a query and their
/// timestamp date falls in `[start, end)`. Downloads are answered for any
/// URL ending in `file={name}` of a registered archive file, or for URLs
/// registered verbatim.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    archive_files: BTreeMap<String, Vec<u8>>,
    urls: HashMap<String, Vec<u8>>,
    opened: RefCell<Vec<String>>,
    listings: Cell<usize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_archive_file(&mut self, name: &str, bytes: Vec<u8>) {
        self.archive_files.insert(name.to_string(), bytes);
    }

    pub fn add_url(&mut self, url: &str, bytes: Vec<u8>) {
        self.urls.insert(url.to_string(), bytes);
    }

    /// URLs opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    pub fn listings(&self) -> usize {
        self.listings.get()
    }
}

fn file_date(desc: &FileDescriptor) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(desc.timestamp.get(..8)?, "%Y%m%d").ok()
}

impl Catalogue for MemoryRemote {
    fn list_files(&self, query: &ArchiveQuery) -> Result<Vec<String>> {
        self.listings.set(self.listings.get() + 1);
        let names = self
            .archive_files
            .keys()
            .filter_map(|name| FileDescriptor::parse(name).ok())
            .filter(|d| {
                d.probe == query.probe
                    && d.instrument == query.instrument
                    && d.rate == query.rate
                    && d.level == query.level
                    && d.descriptor == query.descriptor
            })
            .filter(|d| file_date(d).is_some_and(|day| query.start <= day && day < query.end))
            .map(|d| d.name)
            .collect();
        Ok(names)
    }
}

impl RemoteSource for MemoryRemote {
    fn open(&self, url: &str) -> Result<RemoteBody> {
        self.opened.borrow_mut().push(url.to_string());
        let bytes = self.urls.get(url).or_else(|| {
            url.rsplit_once("file=")
                .and_then(|(_, name)| self.archive_files.get(name))
        });
        match bytes {
            Some(bytes) => Ok(RemoteBody::from_bytes(bytes.clone())),
            None => Err(DatasetError::Transport {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}
