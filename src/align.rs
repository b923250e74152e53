//! Nearest-sample alignment of label epochs against the archive.

use std::cell::OnceCell;

use log::{debug, info, warn};

use crate::archive::reader::ArchiveReader;
use crate::archive::remote::Catalogue;
use crate::archive::sync::FileSync;
use crate::archive::variables;
use crate::data::model::{VariableSlot, UNRESOLVED_EPOCH};
use crate::epoch::DateRange;
use crate::error::Result;

/// Largest accepted gap between a target and its matched sample, in ns.
pub const MAX_ALIGNMENT_GAP_NS: i64 = 4_500_000_000;

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Matched file and epoch per target; empty file and epoch `0` when rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub files: Vec<String>,
    pub epochs: Vec<i64>,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.epochs.iter().filter(|&&e| e == UNRESOLVED_EPOCH).count()
    }

    /// The `i`-th match as a table slot for `var_name`.
    pub fn slot(&self, i: usize, var_name: &str) -> VariableSlot {
        VariableSlot {
            epoch: self.epochs[i],
            file: self.files[i].clone(),
            var_name: var_name.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// ArchiveIndex
// ---------------------------------------------------------------------------

/// Every sample epoch of a set of archive files, in archive order
/// (files in the order added, samples in file order).
///
/// The sorted lookup view is built once, on the first query after the last
/// `push_file`.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    files: Vec<String>,
    file_of: Vec<usize>,
    epochs: Vec<i64>,
    /// `(epoch, position)` sorted ascending, built on first lookup.
    sorted: OnceCell<Vec<(i64, usize)>>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_file(&mut self, name: &str, epochs: &[i64]) {
        let file = self.files.len();
        self.files.push(name.to_string());
        self.epochs.extend_from_slice(epochs);
        self.file_of.extend(std::iter::repeat(file).take(epochs.len()));
        self.sorted.take();
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn epoch_at(&self, position: usize) -> i64 {
        self.epochs[position]
    }

    pub fn file_at(&self, position: usize) -> &str {
        &self.files[self.file_of[position]]
    }

    /// Position of the sample closest to `target`.
    ///
    /// Among equally close samples the first in archive order wins.
    pub fn nearest(&self, target: i64) -> Option<usize> {
        let sorted = self.sorted();
        let idx = sorted.partition_point(|&(e, _)| e < target);

        // `sorted` is ordered by (epoch, position), so the first entry of an
        // equal-epoch run carries the lowest archive position.
        let above = sorted.get(idx).map(|&(e, pos)| (e.abs_diff(target), pos));
        let below = idx.checked_sub(1).map(|i| {
            let epoch = sorted[i].0;
            let first = sorted.partition_point(|&(e, _)| e < epoch);
            (target.abs_diff(epoch), sorted[first].1)
        });

        match (below, above) {
            (Some(b), Some(a)) => Some(if b <= a { b.1 } else { a.1 }),
            (Some(b), None) => Some(b.1),
            (None, Some(a)) => Some(a.1),
            (None, None) => None,
        }
    }

    fn sorted(&self) -> &[(i64, usize)] {
        self.sorted.get_or_init(|| {
            let mut sorted: Vec<(i64, usize)> = self.epochs.iter().copied().zip(0..).collect();
            sorted.sort_unstable();
            sorted
        })
    }

    /// Nearest sample within tolerance, as `(file, epoch)`.
    pub fn resolve(&self, target: i64) -> Option<(&str, i64)> {
        let pos = self.nearest(target)?;
        let epoch = self.epochs[pos];
        (epoch.abs_diff(target) <= MAX_ALIGNMENT_GAP_NS.unsigned_abs())
            .then(|| (self.file_at(pos), epoch))
    }

    /// Match every target; rejects become empty file and epoch `0`.
    pub fn align(&self, targets: &[i64]) -> Alignment {
        let mut alignment = Alignment {
            files: Vec::with_capacity(targets.len()),
            epochs: Vec::with_capacity(targets.len()),
        };
        for &target in targets {
            match self.resolve(target) {
                Some((file, epoch)) => {
                    alignment.files.push(file.to_string());
                    alignment.epochs.push(epoch);
                }
                None => {
                    alignment.files.push(String::new());
                    alignment.epochs.push(UNRESOLVED_EPOCH);
                }
            }
        }
        alignment
    }

    /// The whole index as an alignment, in archive order.
    pub fn to_alignment(&self) -> Alignment {
        Alignment {
            files: (0..self.len()).map(|p| self.file_at(p).to_string()).collect(),
            epochs: self.epochs.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemporalAligner
// ---------------------------------------------------------------------------

pub struct TemporalAligner<'a> {
    catalogue: &'a dyn Catalogue,
    sync: &'a FileSync<'a>,
    reader: &'a dyn ArchiveReader,
}

impl<'a> TemporalAligner<'a> {
    pub fn new(catalogue: &'a dyn Catalogue, sync: &'a FileSync<'a>, reader: &'a dyn ArchiveReader) -> Self {
        TemporalAligner {
            catalogue,
            sync,
            reader,
        }
    }

    /// List, fetch and index every archive file holding `variable` in `range`.
    pub fn index(&self, range: &DateRange, variable: &str) -> Result<ArchiveIndex> {
        let spec = variables::lookup(variable)?;
        let (start, end) = range.catalogue_dates();
        let mut names = self.catalogue.list_files(&spec.query(start, end))?;
        names.sort();
        names.dedup();
        if names.is_empty() {
            warn!("No archive files hold {variable} between {start} and {end}");
        }

        self.sync.ensure_present(&names)?;

        let mut index = ArchiveIndex::new();
        for name in &names {
            let path = self.sync.local_path(name)?;
            let epochs = self.reader.read_epochs(&path, &spec.epoch_variable)?;
            debug!("{name}: {} sample(s)", epochs.len());
            index.push_file(name, &epochs);
        }
        info!("Indexed {} sample(s) of {variable} from {} file(s)", index.len(), names.len());
        Ok(index)
    }

    /// Align `targets` against `variable`, or return every available sample
    /// when no targets are given.
    pub fn align(&self, range: &DateRange, variable: &str, targets: Option<&[i64]>) -> Result<Alignment> {
        let index = self.index(range, variable)?;
        let Some(targets) = targets else {
            return Ok(index.to_alignment());
        };
        let alignment = index.align(targets);
        info!(
            "{variable}: {} of {} target(s) rejected (gap above {} s)",
            alignment.rejected(),
            targets.len(),
            MAX_ALIGNMENT_GAP_NS as f64 / 1e9
        );
        Ok(alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::memory::{MemoryArchive, MemoryRemote};

    const SEC: i64 = 1_000_000_000;

    fn index(files: &[(&str, Vec<i64>)]) -> ArchiveIndex {
        let mut index = ArchiveIndex::new();
        for (name, epochs) in files {
            index.push_file(name, epochs);
        }
        index
    }

    /// Reference: first minimum of a full scan.
    fn scan(index: &ArchiveIndex, target: i64) -> Option<usize> {
        (0..index.len()).min_by_key(|&p| index.epoch_at(p).abs_diff(target))
    }

    #[test]
    fn test_exact_match_has_zero_gap() {
        let idx = index(&[("a.cdf", vec![10 * SEC, 20 * SEC]), ("b.cdf", vec![30 * SEC])]);
        assert_eq!(idx.resolve(30 * SEC), Some(("b.cdf", 30 * SEC)));
    }

    #[test]
    fn test_tolerance_boundary() {
        let idx = index(&[("a.cdf", vec![100 * SEC])]);
        let edge = 100 * SEC + MAX_ALIGNMENT_GAP_NS;
        assert_eq!(idx.resolve(edge), Some(("a.cdf", 100 * SEC)));
        assert_eq!(idx.resolve(edge + 1), None);

        let alignment = idx.align(&[edge + 1]);
        assert_eq!(alignment.epochs, vec![UNRESOLVED_EPOCH]);
        assert_eq!(alignment.files, vec![String::new()]);
    }

    #[test]
    fn test_tie_goes_to_first_in_archive_order() {
        // Equidistant neighbours: the earlier file wins even though its epoch is larger.
        let idx = index(&[("a.cdf", vec![12 * SEC]), ("b.cdf", vec![8 * SEC])]);
        assert_eq!(idx.resolve(10 * SEC), Some(("a.cdf", 12 * SEC)));

        // Duplicate epochs across files resolve to the first file.
        let idx = index(&[("a.cdf", vec![5 * SEC]), ("b.cdf", vec![5 * SEC])]);
        assert_eq!(idx.resolve(5 * SEC), Some(("a.cdf", 5 * SEC)));
    }

    #[test]
    fn test_matches_full_scan_on_unsorted_archive() {
        let idx = index(&[
            ("a.cdf", vec![50, 10, 30, 30, 90]),
            ("b.cdf", vec![20, 70, 10, 60]),
            ("c.cdf", vec![]),
            ("d.cdf", vec![40, 80, 50]),
        ]);
        for target in -5..100 {
            assert_eq!(idx.nearest(target), scan(&idx, target), "target {target}");
        }
    }

    #[test]
    fn test_file_added_after_lookup_is_searched() {
        let mut idx = index(&[("a.cdf", vec![10 * SEC])]);
        assert_eq!(idx.resolve(20 * SEC), None);

        idx.push_file("b.cdf", &[19 * SEC, 40 * SEC]);
        assert_eq!(idx.resolve(20 * SEC), Some(("b.cdf", 19 * SEC)));
        assert_eq!(idx.resolve(10 * SEC), Some(("a.cdf", 10 * SEC)));
        assert_eq!(idx.nearest(39 * SEC), Some(2));
    }

    #[test]
    fn test_empty_index_rejects_everything() {
        let idx = ArchiveIndex::new();
        assert_eq!(idx.nearest(0), None);
        assert_eq!(idx.align(&[1, 2]).rejected(), 2);
    }

    #[test]
    fn test_aligner_fetches_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let a = "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf";
        let b = "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf";
        let mut remote = MemoryRemote::new();
        remote.add_archive_file(b, b"b".to_vec());
        remote.add_archive_file(a, b"a".to_vec());
        let mut archive = MemoryArchive::new();
        archive.insert_epochs(a, "Epoch", vec![10 * SEC, 20 * SEC]);
        archive.insert_epochs(b, "Epoch", vec![30 * SEC]);

        let sync = FileSync::new(dir.path(), "https://sdc.test/", &remote);
        let aligner = TemporalAligner::new(&remote, &sync, &archive);
        let range = DateRange::parse("2017-12-04", "2017-12-04").unwrap();

        let all = aligner.align(&range, "mms1_dis_dist_fast", None).unwrap();
        assert_eq!(all.epochs, vec![10 * SEC, 20 * SEC, 30 * SEC]);
        assert_eq!(all.files, vec![a, a, b]);
        assert!(sync.local_path(a).unwrap().is_file());

        let targets = [21 * SEC, 100 * SEC];
        let aligned = aligner.align(&range, "mms1_dis_dist_fast", Some(&targets[..])).unwrap();
        assert_eq!(aligned.epochs, vec![20 * SEC, UNRESOLVED_EPOCH]);
        assert_eq!(aligned.files, vec![a.to_string(), String::new()]);
    }

    #[test]
    fn test_unknown_variable() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new();
        let archive = MemoryArchive::new();
        let sync = FileSync::new(dir.path(), "https://sdc.test/", &remote);
        let aligner = TemporalAligner::new(&remote, &sync, &archive);
        let range = DateRange::parse("2017-12-04", "2017-12-04").unwrap();
        assert!(matches!(
            aligner.align(&range, "mms9_dis_dist_fast", None),
            Err(crate::error::DatasetError::Lookup(_))
        ));
    }
}
