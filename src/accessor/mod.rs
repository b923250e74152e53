//! Runtime access to a persisted alignment table.
//!
//! Architecture:
//! ```text
//!   .csv / .feather ──► Dataset ──► ensure archive files present (per slot)
//!                                       │
//!   get(row) ─► for each slot ─► FileCache (file, var) ─► exact epoch ─► sample
//!                                       │                                  │
//!                              (row, slot) -> position memo        SampleTransform
//! ```

pub mod cache;
pub mod columns;
pub mod presets;
pub mod transform;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::archive::naming::name_to_path;
use crate::archive::reader::{ArchiveReader, VariableArray};
use crate::archive::remote::RemoteSource;
use crate::archive::sync::{resolve, FileSync};
use crate::archive::variables::epoch_variable_for;
use crate::config::Settings;
use crate::data::loader::read_table;
use crate::data::model::{Dataset, VariableSlot};
use crate::error::{DatasetError, Result};

use cache::{CachedVariable, FileCache};
use presets::PresetRegistry;
use transform::SampleTransform;

#[derive(Debug, Clone, PartialEq)]
pub struct AccessorOptions {
    /// Keep each (file, variable) in memory after its first read.
    pub cache: bool,
    /// Include the row epoch in returned samples.
    pub return_epoch: bool,
    pub transform: SampleTransform,
}

impl Default for AccessorOptions {
    fn default() -> Self {
        AccessorOptions {
            cache: true,
            return_epoch: true,
            transform: SampleTransform::Identity,
        }
    }
}

/// One table row resolved into measurement values, one per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Vec<VariableArray>,
    pub label: i64,
    pub epoch: Option<i64>,
}

// ---------------------------------------------------------------------------
// IndexedAccessor
// ---------------------------------------------------------------------------

/// Serves table rows as measurement samples.
///
/// Not meant for sharing across threads: `get` mutates the cache, so give
/// each worker its own accessor.
pub struct IndexedAccessor<'a> {
    dataset: Dataset,
    root: PathBuf,
    reader: &'a dyn ArchiveReader,
    options: AccessorOptions,
    cache: FileCache,
    positions: HashMap<(usize, usize), usize>,
}

impl<'a> IndexedAccessor<'a> {
    /// Open a table file and make sure every archive file it references is present.
    pub fn open(
        path: &Path,
        settings: &Settings,
        source: &dyn RemoteSource,
        reader: &'a dyn ArchiveReader,
        options: AccessorOptions,
    ) -> Result<Self> {
        let dataset = read_table(path)?;
        info!("Opened {} with {} row(s)", path.display(), dataset.len());
        Self::from_dataset(dataset, settings, source, reader, options)
    }

    pub fn from_dataset(
        dataset: Dataset,
        settings: &Settings,
        source: &dyn RemoteSource,
        reader: &'a dyn ArchiveReader,
        options: AccessorOptions,
    ) -> Result<Self> {
        let sync = FileSync::new(&settings.storage_root, &settings.archive_base_url, source);
        for slot in 0..dataset.slot_count() {
            let files = dataset.distinct_files(slot);
            let fetched = sync.ensure_present(&files)?;
            if fetched > 0 {
                info!("Slot {slot}: downloaded {fetched} of {} file(s)", files.len());
            }
        }

        Ok(IndexedAccessor {
            dataset,
            root: settings.storage_root.clone(),
            reader,
            options,
            cache: FileCache::new(),
            positions: HashMap::new(),
        })
    }

    /// Open a named table, downloading it into `dir` on first use.
    ///
    /// Without explicit options the preset's transform is used.
    pub fn from_preset(
        name: &str,
        registry: &PresetRegistry,
        dir: &Path,
        settings: &Settings,
        source: &dyn RemoteSource,
        reader: &'a dyn ArchiveReader,
        options: Option<AccessorOptions>,
    ) -> Result<Self> {
        let preset = registry.resolve(name)?;
        let path = dir.join(&preset.file_name);
        if !path.is_file() {
            info!("Downloading dataset {name} from {}", preset.url);
            FileSync::new(dir, &settings.archive_base_url, source).fetch_url(&path, &preset.url)?;
        }
        let options = options.unwrap_or_else(|| AccessorOptions {
            transform: preset.transform.clone(),
            ..AccessorOptions::default()
        });
        Self::open(&path, settings, source, reader, options)
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn options(&self) -> &AccessorOptions {
        &self.options
    }

    /// Archive files held in memory so far.
    pub fn cached_files(&self) -> BTreeSet<String> {
        self.cache.files()
    }

    /// Like [`get`](Self::get), for callers holding signed indices.
    pub fn get_index(&mut self, index: i64) -> Result<Sample> {
        let index = usize::try_from(index)
            .map_err(|_| DatasetError::Lookup(format!("Row index {index} is negative")))?;
        self.get(index)
    }

    /// Resolve row `index` into one value per slot.
    pub fn get(&mut self, index: usize) -> Result<Sample> {
        let row = self.dataset.rows.get(index).ok_or_else(|| {
            DatasetError::Lookup(format!(
                "Row index {index} out of range for {} row(s)",
                self.dataset.len()
            ))
        })?;
        let label = row.label;
        let epoch = row.epoch;
        let slots = row.slots.clone();

        let mut values = Vec::with_capacity(slots.len());
        for (s, slot) in slots.iter().enumerate() {
            let value = if self.options.cache {
                self.cached_value(index, s, slot)?
            } else {
                self.fresh_value(slot)?
            };
            values.push(self.options.transform.apply(value)?);
        }

        Ok(Sample {
            values,
            label,
            epoch: self.options.return_epoch.then_some(epoch),
        })
    }

    fn slot_path(&self, slot: &VariableSlot) -> Result<PathBuf> {
        if !slot.is_resolved() || slot.file.is_empty() {
            return Err(DatasetError::Consistency(format!(
                "{} has no resolved sample",
                slot.var_name
            )));
        }
        Ok(resolve(&self.root, &name_to_path(&slot.file)?))
    }

    fn cached_value(&mut self, row: usize, s: usize, slot: &VariableSlot) -> Result<VariableArray> {
        let path = self.slot_path(slot)?;
        let reader = self.reader;
        let dataset = &self.dataset;
        let entry = self.cache.get_or_load(&slot.file, &slot.var_name, || {
            let keep = referenced_epochs(dataset, &slot.file, &slot.var_name);
            CachedVariable::load(
                reader,
                &path,
                &slot.var_name,
                &epoch_variable_for(&slot.var_name),
                Some(&keep),
            )
        })?;

        let position = match self.positions.get(&(row, s)) {
            Some(&p) if entry.epoch_at(p) == Some(slot.epoch) => p,
            _ => {
                let p = entry
                    .position(slot.epoch)
                    .ok_or_else(|| epoch_missing(slot, &path))?;
                self.positions.insert((row, s), p);
                p
            }
        };
        entry
            .sample(position)
            .ok_or_else(|| epoch_missing(slot, &path))
    }

    fn fresh_value(&self, slot: &VariableSlot) -> Result<VariableArray> {
        let path = self.slot_path(slot)?;
        debug!("Reading {} from {}", slot.var_name, path.display());
        let entry = CachedVariable::load(
            self.reader,
            &path,
            &slot.var_name,
            &epoch_variable_for(&slot.var_name),
            None,
        )?;
        entry
            .position(slot.epoch)
            .and_then(|p| entry.sample(p))
            .ok_or_else(|| epoch_missing(slot, &path))
    }
}

/// Every epoch the table asks of `variable` in `file`, over all slots.
fn referenced_epochs(dataset: &Dataset, file: &str, variable: &str) -> HashSet<i64> {
    dataset
        .rows
        .iter()
        .flat_map(|r| r.slots.iter())
        .filter(|s| s.file == file && s.var_name == variable)
        .map(|s| s.epoch)
        .collect()
}

fn epoch_missing(slot: &VariableSlot, path: &Path) -> DatasetError {
    DatasetError::Consistency(format!(
        "Epoch {} of {} not found in {}",
        slot.epoch,
        slot.var_name,
        path.display()
    ))
}
