use std::collections::BTreeMap;

use log::debug;
use rand::seq::index::sample;
use rand::Rng;

use super::model::{AlignedRow, Dataset, UNKNOWN_LABEL};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Drop rows carrying the unknown label. Returns how many were removed.
///
/// Running it again on a cleaned dataset removes nothing.
pub fn drop_unknown_labels(dataset: &mut Dataset) -> usize {
    let before = dataset.len();
    dataset.rows.retain(|r| r.label != UNKNOWN_LABEL);
    let removed = before - dataset.len();
    debug!("Removed {removed} unlabelled row(s)");
    removed
}

// ---------------------------------------------------------------------------
// Balanced sampling
// ---------------------------------------------------------------------------

/// Keep exactly `per_label` randomly chosen rows for every distinct label.
///
/// Fails with [`DatasetError::Insufficient`] when any label has fewer rows
/// than requested. Rows come back grouped by ascending label, each group in
/// its original relative order.
pub fn sample_per_label<R: Rng + ?Sized>(dataset: &mut Dataset, per_label: usize, rng: &mut R) -> Result<()> {
    let mut groups: BTreeMap<i64, Vec<AlignedRow>> = BTreeMap::new();
    for row in dataset.rows.drain(..) {
        groups.entry(row.label).or_default().push(row);
    }

    let mut kept = Vec::with_capacity(groups.len() * per_label);
    for (label, rows) in groups {
        if rows.len() < per_label {
            return Err(DatasetError::Insufficient {
                label,
                available: rows.len(),
                requested: per_label,
            });
        }
        let mut chosen = sample(rng, rows.len(), per_label).into_vec();
        chosen.sort_unstable();
        let mut rows: Vec<Option<AlignedRow>> = rows.into_iter().map(Some).collect();
        kept.extend(chosen.into_iter().filter_map(|i| rows[i].take()));
        debug!("Sampled {per_label} row(s) for label {label}");
    }

    dataset.rows = kept;
    Ok(())
}
