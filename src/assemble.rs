//! Builds alignment tables and writes them to disk.

use std::path::Path;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::align::TemporalAligner;
use crate::archive::reader::ArchiveReader;
use crate::archive::remote::{Catalogue, RemoteSource};
use crate::archive::sync::FileSync;
use crate::config::Settings;
use crate::data::filter::{drop_unknown_labels, sample_per_label};
use crate::data::loader::TableFormat;
use crate::data::model::{AlignedRow, Dataset, UNKNOWN_LABEL};
use crate::data::writer::write_table;
use crate::epoch::{epoch_to_datetime, DateRange};
use crate::error::{DatasetError, Result};
use crate::labels::{LabelIngestion, LabelSource, OLSHEVSKY_REFERENCE};

/// Variable aligned when the caller names none.
pub const DEFAULT_VARIABLE: &str = "mms1_dis_dist_fast";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Variables to align, one table slot each, in order.
    pub variables: Vec<String>,
    /// Drop rows with the unknown label.
    pub clean: bool,
    /// Rows to draw per distinct label; `0` keeps every row.
    pub samples_per_label: usize,
    /// Seed for the sampling generator; entropy when `None`.
    pub seed: Option<u64>,
    /// Replace an existing destination file.
    pub force: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            variables: vec![DEFAULT_VARIABLE.to_string()],
            clean: false,
            samples_per_label: 0,
            seed: None,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Written { rows: usize },
    /// The destination existed and `force` was not set.
    Skipped,
}

// ---------------------------------------------------------------------------
// DatasetAssembler
// ---------------------------------------------------------------------------

pub struct DatasetAssembler<'a> {
    settings: &'a Settings,
    catalogue: &'a dyn Catalogue,
    source: &'a dyn RemoteSource,
    reader: &'a dyn ArchiveReader,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(
        settings: &'a Settings,
        catalogue: &'a dyn Catalogue,
        source: &'a dyn RemoteSource,
        reader: &'a dyn ArchiveReader,
    ) -> Self {
        DatasetAssembler {
            settings,
            catalogue,
            source,
            reader,
        }
    }

    /// Align, clean, sample and order a dataset in memory.
    pub fn build(&self, label_source: LabelSource, range: &DateRange, options: &BuildOptions) -> Result<Dataset> {
        if options.variables.is_empty() {
            return Err(DatasetError::Lookup("no variables requested".to_string()));
        }

        let sync = FileSync::new(
            &self.settings.storage_root,
            &self.settings.archive_base_url,
            self.source,
        );
        let aligner = TemporalAligner::new(self.catalogue, &sync, self.reader);

        let rows = match label_source {
            LabelSource::Olshevsky => {
                info!("Generating a dataset based on labels from {OLSHEVSKY_REFERENCE}");
                let ingestion = LabelIngestion::new(
                    &sync,
                    self.reader,
                    &self.settings.label_base_url,
                    &self.settings.label_cache_dir,
                );
                let rows = ingestion
                    .ingest(range)?
                    .into_iter()
                    .map(|r| AlignedRow {
                        label: r.label,
                        epoch: r.epoch,
                        slots: Vec::with_capacity(options.variables.len()),
                    })
                    .collect();
                align_all(&aligner, range, rows, &options.variables)?
            }
            LabelSource::Unlabeled => {
                let (first, rest) = options.variables.split_at(1);
                let grid = unlabeled_grid(&aligner, range, &first[0])?;
                align_all(&aligner, range, grid, rest)?
            }
        };

        let mut dataset = Dataset::from_rows(options.variables.len(), rows)?;
        info!("Creating dataset from {} aligned row(s)", dataset.len());

        if options.clean {
            drop_unknown_labels(&mut dataset);
        }

        if options.samples_per_label > 0 {
            let mut rng = match options.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            sample_per_label(&mut dataset, options.samples_per_label, &mut rng)?;
        }

        // The unlabeled grid is already in archive order.
        if label_source != LabelSource::Unlabeled {
            dataset.sort_by_epoch();
        }
        Ok(dataset)
    }

    /// Build a dataset and store it at `path`.
    ///
    /// An existing destination is left alone unless `options.force` is set.
    pub fn create(
        &self,
        path: &Path,
        label_source: LabelSource,
        range: &DateRange,
        options: &BuildOptions,
    ) -> Result<CreateOutcome> {
        TableFormat::from_path(path)?;

        if path.is_file() {
            if !options.force {
                warn!("Dataset {} exists, aborting", path.display());
                return Ok(CreateOutcome::Skipped);
            }
            std::fs::remove_file(path).map_err(|e| DatasetError::io(path, e))?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
        }

        let dataset = self.build(label_source, range, options)?;
        info!("Storing dataset at {}", path.display());
        write_table(path, &dataset)?;
        Ok(CreateOutcome::Written { rows: dataset.len() })
    }
}

/// Attach one slot per variable, dropping rows whose slot found no match.
fn align_all(
    aligner: &TemporalAligner<'_>,
    range: &DateRange,
    mut rows: Vec<AlignedRow>,
    variables: &[String],
) -> Result<Vec<AlignedRow>> {
    for variable in variables {
        let targets: Vec<i64> = rows.iter().map(|r| r.epoch).collect();
        let alignment = aligner.align(range, variable, Some(targets.as_slice()))?;
        for (i, row) in rows.iter_mut().enumerate() {
            row.slots.push(alignment.slot(i, variable));
        }
        let before = rows.len();
        rows.retain(AlignedRow::is_valid);
        if rows.len() < before {
            info!("{variable}: dropped {} row(s) without a close sample", before - rows.len());
        }
    }
    Ok(rows)
}

/// Every sample of `variable` inside the range, labelled unknown.
fn unlabeled_grid(aligner: &TemporalAligner<'_>, range: &DateRange, variable: &str) -> Result<Vec<AlignedRow>> {
    let all = aligner.align(range, variable, None)?;
    let rows: Vec<AlignedRow> = (0..all.len())
        .filter(|&i| {
            let time = epoch_to_datetime(all.epochs[i]);
            range.admits(time.date_naive(), time)
        })
        .map(|i| AlignedRow {
            label: UNKNOWN_LABEL,
            epoch: all.epochs[i],
            slots: vec![all.slot(i, variable)],
        })
        .collect();
    info!("Unlabeled grid: {} of {} sample(s) inside the range", rows.len(), all.len());
    Ok(rows)
}
