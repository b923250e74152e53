//! Label ingestion.
//!
//! Human labels come as monthly files. Each file holds pairs of variables,
//! `label_{probe}_{inst}_{rate}_{desc}_{timestamp}` and
//! `epoch_{probe}_{inst}_{rate}_{desc}_{timestamp}`, one pair per archive
//! file that was labelled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use log::info;

use crate::archive::reader::ArchiveReader;
use crate::archive::sync::FileSync;
use crate::data::model::LabelRecord;
use crate::epoch::{epoch_to_datetime, DateRange};
use crate::error::{DatasetError, Result};

const LABEL_FILE_PREFIX: &str = "labels_fpi_fast_dis_dist_";

/// Length of the archive timestamp that ends every label variable name.
const SUFFIX_LEN: usize = 14;

/// Labels were made on this data level and version.
const LABELLED_LEVEL: &str = "l2";
const LABELLED_VERSION: &str = "v3.4.0.cdf";

pub const OLSHEVSKY_REFERENCE: &str = "Olshevsky, V., et al. (2021). Automated classification of plasma \
regions using 3D particle energy distributions. Journal of Geophysical Research: Space Physics, \
https://doi.org/10.1029/2021JA029620";

// ---------------------------------------------------------------------------
// LabelSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// Human-classified plasma regions, November and December 2017.
    Olshevsky,
    /// No labels: every archive sample becomes a row with the unknown label.
    Unlabeled,
}

impl LabelSource {
    /// First and last day (inclusive) the source has labels for.
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            LabelSource::Olshevsky => Some((
                NaiveDate::from_ymd_opt(2017, 11, 1)?,
                NaiveDate::from_ymd_opt(2017, 12, 31)?,
            )),
            LabelSource::Unlabeled => None,
        }
    }
}

impl FromStr for LabelSource {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "olshevsky" => Ok(LabelSource::Olshevsky),
            "unlabeled" | "unlabelled" => Ok(LabelSource::Unlabeled),
            _ => Err(DatasetError::Lookup(format!("Incorrect label_source ({s})"))),
        }
    }
}

impl fmt::Display for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSource::Olshevsky => write!(f, "Olshevsky"),
            LabelSource::Unlabeled => write!(f, "Unlabeled"),
        }
    }
}

// ---------------------------------------------------------------------------
// LabelIngestion
// ---------------------------------------------------------------------------

/// Fetches and decodes the human label files.
pub struct LabelIngestion<'a> {
    sync: &'a FileSync<'a>,
    reader: &'a dyn ArchiveReader,
    base_url: String,
    cache_dir: PathBuf,
}

impl<'a> LabelIngestion<'a> {
    pub fn new(
        sync: &'a FileSync<'a>,
        reader: &'a dyn ArchiveReader,
        base_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        LabelIngestion {
            sync,
            reader,
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// All labels inside `range`, in file order.
    pub fn ingest(&self, range: &DateRange) -> Result<Vec<LabelRecord>> {
        let (first, last) = LabelSource::Olshevsky
            .period()
            .ok_or_else(|| DatasetError::Range("label source has no period".to_string()))?;
        if !range.overlaps(first, last) {
            return Err(DatasetError::Range(format!(
                "Invalid time range: range has to be within {first} to {last} (inclusive)"
            )));
        }

        let covered = (first.year(), first.month())..=(last.year(), last.month());
        let mut records = Vec::new();
        for (year, month) in range.months() {
            if !covered.contains(&(year, month)) {
                continue;
            }
            let path = self.label_file(year, month)?;
            info!("Processing file {}", path.display());
            records.extend(read_label_file(self.reader, &path)?);
        }

        let before = records.len();
        records.retain(|r| range.admits(r.source_date, epoch_to_datetime(r.epoch)));
        info!("{} of {before} label(s) fall inside the requested range", records.len());
        Ok(records)
    }

    /// Local copy of the month's label file, downloading it on first use.
    fn label_file(&self, year: i32, month: u32) -> Result<PathBuf> {
        let name = format!("{LABEL_FILE_PREFIX}{year:04}{month:02}.cdf");
        let path = self.cache_dir.join(&name);
        if !path.is_file() {
            info!("Downloading label file {name}");
            self.sync
                .fetch_url(&path, &format!("{}{name}", self.base_url))?;
        }
        Ok(path)
    }
}

/// Decode one label file into records.
pub fn read_label_file(reader: &dyn ArchiveReader, path: &Path) -> Result<Vec<LabelRecord>> {
    let names = reader.variable_names(path)?;
    let label_vars: Vec<&String> = names.iter().filter(|n| n.starts_with("label_")).collect();
    let epoch_vars: Vec<&String> = names.iter().filter(|n| n.starts_with("epoch_")).collect();
    if label_vars.len() != epoch_vars.len() {
        return Err(DatasetError::Consistency(format!(
            "{}: {} label variables but {} epoch variables",
            path.display(),
            label_vars.len(),
            epoch_vars.len()
        )));
    }

    let mut records = Vec::new();
    for (label_var, epoch_var) in label_vars.into_iter().zip(epoch_vars) {
        let paired = matches!(
            (suffix(label_var), suffix(epoch_var)),
            (Some(l), Some(e)) if l == e
        );
        if !paired {
            return Err(DatasetError::Consistency(format!(
                "The label and epoch variables do not match ({label_var} vs {epoch_var})"
            )));
        }
        let (file, source_date) = labelled_file(label_var)?;

        let labels = reader.read_integers(path, label_var)?;
        let epochs = reader.read_epochs(path, epoch_var)?;
        if labels.len() != epochs.len() {
            return Err(DatasetError::Consistency(format!(
                "{label_var} has {} values but {epoch_var} has {}",
                labels.len(),
                epochs.len()
            )));
        }

        records.extend(labels.into_iter().zip(epochs).map(|(label, epoch)| LabelRecord {
            label,
            epoch,
            source_date,
            file: file.clone(),
        }));
    }
    Ok(records)
}

/// The trailing file timestamp; `None` when it would split a character.
fn suffix(name: &str) -> Option<&str> {
    name.get(name.len().saturating_sub(SUFFIX_LEN)..)
}

/// Archive file and its date, from a label variable name.
///
/// `label_mms1_fpi_fast_dis_dist_20171129160000` ->
/// `mms1_fpi_fast_l2_dis-dist_20171129160000_v3.4.0.cdf`, 2017-11-29.
fn labelled_file(label_var: &str) -> Result<(String, NaiveDate)> {
    let malformed = || DatasetError::Format(format!("'{label_var}' is not a label variable name"));
    let parts: Vec<&str> = label_var
        .strip_prefix("label_")
        .ok_or_else(malformed)?
        .split('_')
        .collect();
    if parts.len() < 5 {
        return Err(malformed());
    }
    let timestamp = parts[parts.len() - 1];
    let date = timestamp
        .get(..8)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .ok_or_else(malformed)?;
    let descriptor = parts[3..parts.len() - 1].join("-");
    let file = format!(
        "{}_{}_{}_{LABELLED_LEVEL}_{descriptor}_{timestamp}_{LABELLED_VERSION}",
        parts[0], parts[1], parts[2]
    );
    Ok((file, date))
}
