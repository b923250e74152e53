//! Keeps the local archive mirror populated.
//!
//! Transfers are staged in a temporary file next to the destination and only
//! moved into place once complete, so an aborted download never leaves a
//! truncated file that later runs would mistake for a good one.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use super::naming::{download_url, name_to_path};
use super::remote::RemoteSource;
use crate::error::{DatasetError, Result};

const COPY_BUFFER: usize = 64 * 1024;

/// What a single fetch ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The transfer completed and was moved into place.
    Fetched,
    /// Another writer placed the destination first; the transfer was discarded.
    AlreadyPresent,
}

/// Absolute location of a storage-relative path (`./mms/...`) under `root`.
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    root.join(relative.trim_start_matches("./"))
}

/// The subset of `paths` absent under `root`, or `None` when all are present.
pub fn missing_files<S: AsRef<str>>(root: &Path, paths: &[S]) -> Option<Vec<String>> {
    let missing: Vec<String> = paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !resolve(root, p).is_file())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}

// ---------------------------------------------------------------------------
// FileSync
// ---------------------------------------------------------------------------

pub struct FileSync<'a> {
    root: PathBuf,
    base_url: String,
    source: &'a dyn RemoteSource,
}

impl<'a> FileSync<'a> {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, source: &'a dyn RemoteSource) -> Self {
        FileSync {
            root: root.into(),
            base_url: base_url.into(),
            source,
        }
    }

    /// Local path of an archive file name.
    pub fn local_path(&self, name: &str) -> Result<PathBuf> {
        Ok(resolve(&self.root, &name_to_path(name)?))
    }

    /// Make sure every named archive file exists locally, downloading the
    /// missing ones one at a time. Returns how many were downloaded.
    pub fn ensure_present<S: AsRef<str>>(&self, names: &[S]) -> Result<usize> {
        let mut wanted: Vec<(&str, String)> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !wanted.iter().any(|(n, _)| *n == name) {
                wanted.push((name, name_to_path(name)?));
            }
        }
        let paths: Vec<&str> = wanted.iter().map(|(_, p)| p.as_str()).collect();
        let Some(missing) = missing_files(&self.root, &paths) else {
            debug!("All {} archive file(s) present under {}", wanted.len(), self.root.display());
            return Ok(0);
        };

        info!("{} data file(s) are missing, downloading", missing.len());
        let total = missing.len();
        for (cnt, path) in missing.iter().enumerate() {
            let name = path.rsplit('/').next().unwrap_or(path);
            info!("({}/{total}): Downloading file {name}", cnt + 1);
            self.fetch(path, name)?;
        }
        Ok(total)
    }

    /// Download `remote_name` from the archive into `relative_path` under the root.
    pub fn fetch(&self, relative_path: &str, remote_name: &str) -> Result<FetchOutcome> {
        let url = download_url(&self.base_url, remote_name);
        self.fetch_url(&resolve(&self.root, relative_path), &url)
    }

    /// Download an arbitrary URL to `destination`, atomically.
    pub fn fetch_url(&self, destination: &Path, url: &str) -> Result<FetchOutcome> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;

        let body = self.source.open(url)?;
        let mut staged = NamedTempFile::new_in(parent).map_err(|e| DatasetError::io(parent, e))?;
        let label = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());

        // On any error `staged` is dropped here and its temp file removed.
        let written = copy_with_progress(body.reader, staged.as_file_mut(), body.content_length, &label)
            .map_err(|e| DatasetError::io(destination, e))?;
        if let Some(total) = body.content_length {
            if written != total {
                return Err(DatasetError::io(
                    destination,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("transfer ended after {written} of {total} bytes"),
                    ),
                ));
            }
        }
        staged
            .as_file()
            .sync_all()
            .map_err(|e| DatasetError::io(destination, e))?;

        match staged.persist_noclobber(destination) {
            Ok(_) => {
                debug!("Stored {} ({written} bytes)", destination.display());
                Ok(FetchOutcome::Fetched)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(
                    "{} appeared during transfer, keeping the existing file",
                    destination.display()
                );
                Ok(FetchOutcome::AlreadyPresent)
            }
            Err(e) => Err(DatasetError::io(destination, e.error)),
        }
    }
}

/// Copy the body, logging progress roughly every tenth of the known size.
fn copy_with_progress(
    mut reader: Box<dyn Read>,
    writer: &mut impl Write,
    total: Option<u64>,
    label: &str,
) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut written = 0u64;
    let mut next_report = total.map(|t| t / 10).unwrap_or(u64::MAX);
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        written += n as u64;
        if let Some(total) = total {
            if written >= next_report && total > 0 {
                debug!("{label}: {written}/{total} bytes ({}%)", written * 100 / total);
                next_report = written + total / 10;
            }
        }
    }
    match total {
        Some(total) => debug!("{label}: transfer complete ({written}/{total} bytes)"),
        None => debug!("{label}: transfer complete ({written} bytes, unknown total size)"),
    }
    writer.flush()?;
    Ok(written)
}
