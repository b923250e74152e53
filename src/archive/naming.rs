//! Archive file names, storage paths and catalogue queries.
//!
//! File names follow `{probe}_{instrument}_{rate}_{level}[_{descriptor}]_{timestamp}_{version}`,
//! e.g. `mms1_fpi_fast_l2_dis-dist_20171129160000_v3.4.0.cdf`, and are stored at
//! `./mms/{probe}/{instrument}/{rate}/{level}[/{descriptor}]/{year}/{month}/{name}`.

use std::cmp::Ordering;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{DatasetError, Result};

/// Names with fewer underscore-delimited segments are rejected.
pub const MIN_NAME_SEGMENTS: usize = 6;

const PATH_PREFIX: &str = "./mms/";

// ---------------------------------------------------------------------------
// Name <-> path
// ---------------------------------------------------------------------------

/// Storage-relative path of an archive file.
pub fn name_to_path(name: &str) -> Result<String> {
    let segments = split_name(name)?;
    let (year, month) = year_month(segments[segments.len() - 2], name)?;
    let dirs = segments[..segments.len() - 2].join("/");
    Ok(format!("{PATH_PREFIX}{dirs}/{year}/{month}/{name}"))
}

/// Ordered sequence form of [`name_to_path`].
pub fn names_to_paths<S: AsRef<str>>(names: &[S]) -> Result<Vec<String>> {
    names.iter().map(|n| name_to_path(n.as_ref())).collect()
}

/// File name of a storage path (its last component).
pub fn path_to_name(path: &str) -> Result<String> {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| DatasetError::Format(format!("'{path}' has no file name")))
}

fn split_name(name: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = name.split('_').collect();
    if segments.len() < MIN_NAME_SEGMENTS || segments.iter().any(|s| s.is_empty()) {
        return Err(DatasetError::Format(format!(
            "'{name}' is not an archive file name (expected at least {MIN_NAME_SEGMENTS} '_' separated parts)"
        )));
    }
    Ok(segments)
}

fn year_month<'a>(timestamp: &'a str, name: &str) -> Result<(&'a str, &'a str)> {
    let date = timestamp
        .get(..8)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| DatasetError::Format(format!("'{name}' has no YYYYMMDD timestamp")))?;
    let (year, month) = (&date[..4], &date[4..6]);
    match month.parse::<u32>() {
        Ok(1..=12) => Ok((year, month)),
        _ => Err(DatasetError::Format(format!("'{name}' has an invalid month"))),
    }
}

// ---------------------------------------------------------------------------
// FileDescriptor
// ---------------------------------------------------------------------------

/// Logical identity of one archive file, derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub probe: String,
    pub instrument: String,
    pub rate: String,
    pub level: String,
    pub descriptor: Option<String>,
    pub year: i32,
    pub month: u32,
    pub timestamp: String,
    pub version: String,
    pub name: String,
}

impl FileDescriptor {
    pub fn parse(name: &str) -> Result<Self> {
        let segments = split_name(name)?;
        let n = segments.len();
        let (year, month) = year_month(segments[n - 2], name)?;
        let descriptor = match n {
            MIN_NAME_SEGMENTS => None,
            _ => Some(segments[4..n - 2].join("_")),
        };
        Ok(FileDescriptor {
            probe: segments[0].to_string(),
            instrument: segments[1].to_string(),
            rate: segments[2].to_string(),
            level: segments[3].to_string(),
            descriptor,
            year: year.parse().map_err(|_| DatasetError::Format(format!("'{name}' has an invalid year")))?,
            month: month.parse().map_err(|_| DatasetError::Format(format!("'{name}' has an invalid month")))?,
            timestamp: segments[n - 2].to_string(),
            version: segments[n - 1].to_string(),
            name: name.to_string(),
        })
    }

    /// The name without its version segment; files differing only in version share a stem.
    pub fn stem(&self) -> &str {
        let cut = self.name.len() - self.version.len() - 1;
        &self.name[..cut]
    }

    /// Numeric version components, `v3.4.0.cdf` -> `[3, 4, 0]`.
    pub fn version_numbers(&self) -> Vec<u64> {
        self.version
            .trim_start_matches('v')
            .split('.')
            .map_while(|part| part.parse().ok())
            .collect()
    }

    pub fn path(&self) -> Result<String> {
        name_to_path(&self.name)
    }
}

/// Order two descriptors of the same stem by version.
pub fn compare_versions(a: &FileDescriptor, b: &FileDescriptor) -> Ordering {
    a.version_numbers().cmp(&b.version_numbers())
}

// ---------------------------------------------------------------------------
// Catalogue queries
// ---------------------------------------------------------------------------

/// Instrument parameters plus a listing window, as the remote catalogue expects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveQuery {
    pub start: NaiveDate,
    /// Exclusive end date.
    pub end: NaiveDate,
    pub probe: String,
    pub instrument: String,
    pub rate: String,
    pub level: String,
    pub descriptor: Option<String>,
}

impl ArchiveQuery {
    pub fn listing_url(&self, base: &str) -> String {
        let mut url = format!(
            "{base}file_info/science?start_date={}&end_date={}&sc_id={}&instrument_id={}&data_rate_mode={}&data_level={}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d"),
            self.probe,
            self.instrument,
            self.rate,
            self.level,
        );
        if let Some(descriptor) = &self.descriptor {
            url.push_str("&descriptor=");
            url.push_str(descriptor);
        }
        url
    }
}

pub fn download_url(base: &str, name: &str) -> String {
    format!("{base}download/science?file={name}")
}
