use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::error::{DatasetError, Result};

/// Label value for rows nobody classified.
pub const UNKNOWN_LABEL: i64 = -1;

/// Epoch recorded in a slot that found no acceptable match.
pub const UNRESOLVED_EPOCH: i64 = 0;

// ---------------------------------------------------------------------------
// LabelRecord – one ingested label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub label: i64,
    /// TT2000 epoch the label was assigned at.
    pub epoch: i64,
    /// Calendar date of the archive file the label refers to.
    pub source_date: NaiveDate,
    /// Archive file the label was made from.
    pub file: String,
}

// ---------------------------------------------------------------------------
// VariableSlot / AlignedRow
// ---------------------------------------------------------------------------

/// Where one requested variable was found for a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSlot {
    /// Matched sample epoch, or [`UNRESOLVED_EPOCH`].
    pub epoch: i64,
    /// Archive file holding the sample; empty when unresolved.
    pub file: String,
    pub var_name: String,
}

impl VariableSlot {
    pub fn is_resolved(&self) -> bool {
        self.epoch != UNRESOLVED_EPOCH
    }
}

/// A label paired with one slot per requested variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRow {
    pub label: i64,
    pub epoch: i64,
    pub slots: Vec<VariableSlot>,
}

impl AlignedRow {
    /// A row is usable only when every slot found a sample.
    pub fn is_valid(&self) -> bool {
        self.slots.iter().all(VariableSlot::is_resolved)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the persisted alignment table
// ---------------------------------------------------------------------------

/// Ordered aligned rows, all with the same number of slots.
///
/// Columns: `label, epoch, epoch 0, file 0, var_name 0, epoch 1, ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    slot_count: usize,
    pub rows: Vec<AlignedRow>,
}

impl Dataset {
    pub fn new(slot_count: usize) -> Self {
        Dataset {
            slot_count,
            rows: Vec::new(),
        }
    }

    /// Build from rows, checking each carries `slot_count` slots.
    pub fn from_rows(slot_count: usize, rows: Vec<AlignedRow>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.slots.len() != slot_count) {
            return Err(DatasetError::Consistency(format!(
                "row {i} has {} variable slots, expected {slot_count}",
                row.slots.len()
            )));
        }
        Ok(Dataset { slot_count, rows })
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        column_names(self.slot_count)
    }

    /// Rows per label value.
    pub fn label_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.label).or_insert(0) += 1;
        }
        counts
    }

    /// Files referenced by `slot`, in order of first appearance.
    pub fn distinct_files(&self, slot: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|r| r.slots.get(slot))
            .filter(|s| !s.file.is_empty() && seen.insert(s.file.as_str()))
            .map(|s| s.file.clone())
            .collect()
    }

    /// Stable sort by row epoch.
    pub fn sort_by_epoch(&mut self) {
        self.rows.sort_by_key(|r| r.epoch);
    }
}

/// Column names for a table with `slot_count` variable slots.
pub fn column_names(slot_count: usize) -> Vec<String> {
    let mut names = vec!["label".to_string(), "epoch".to_string()];
    for i in 0..slot_count {
        names.push(format!("epoch {i}"));
        names.push(format!("file {i}"));
        names.push(format!("var_name {i}"));
    }
    names
}

/// Recover the slot count from a table's column count (`2 + 3k`, `k >= 1`).
pub fn slot_count_for_columns(columns: usize) -> Result<usize> {
    if columns < 5 || (columns - 2) % 3 != 0 {
        return Err(DatasetError::Format(format!(
            "{columns} columns cannot hold label, epoch and whole variable slots"
        )));
    }
    Ok((columns - 2) / 3)
}
