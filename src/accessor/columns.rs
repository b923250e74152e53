use std::path::Path;

use log::info;

use super::transform::SampleTransform;
use crate::archive::reader::VariableArray;
use crate::data::columns::ColumnTable;
use crate::error::{DatasetError, Result};

/// Column that is never treated as data unless asked for by name.
const LABEL_COLUMN: &str = "label";

/// How a [`ColumnDataset`] turns table rows into samples.
#[derive(Debug, Clone)]
pub struct ColumnOptions {
    /// Columns forming the sample, in order. `None` takes every numeric
    /// column except the label ones.
    pub data_columns: Option<Vec<String>>,
    pub label_column: Option<String>,
    pub return_index: bool,
    pub transform: SampleTransform,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        ColumnOptions {
            data_columns: None,
            label_column: None,
            return_index: true,
            transform: SampleTransform::Identity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSample {
    pub values: VariableArray,
    pub label: Option<f64>,
    pub index: Option<i64>,
}

/// Rows of a plain numeric table served as one-dimensional samples.
#[derive(Debug, Clone)]
pub struct ColumnDataset {
    table: ColumnTable,
    data: Vec<usize>,
    label: Option<usize>,
    options: ColumnOptions,
}

impl ColumnDataset {
    pub fn open(path: &Path, options: ColumnOptions) -> Result<Self> {
        let table = ColumnTable::read(path)?;
        info!("Opened {} with {} row(s)", path.display(), table.len());
        Self::from_table(table, options)
    }

    pub fn from_table(table: ColumnTable, options: ColumnOptions) -> Result<Self> {
        let find = |name: &str| {
            table.position(name).ok_or_else(|| {
                DatasetError::Lookup(format!("Column '{name}' not among {:?}", table.names()))
            })
        };

        let label = options.label_column.as_deref().map(find).transpose()?;
        let data = match &options.data_columns {
            Some(names) => names.iter().map(|n| find(n)).collect::<Result<Vec<_>>>()?,
            None => table
                .names()
                .iter()
                .enumerate()
                .filter(|(i, n)| Some(*i) != label && n.as_str() != LABEL_COLUMN)
                .map(|(i, _)| i)
                .collect(),
        };

        Ok(ColumnDataset {
            table,
            data,
            label,
            options,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn data_columns(&self) -> Vec<&str> {
        self.data.iter().map(|&i| self.table.names()[i].as_str()).collect()
    }

    pub fn get(&self, index: usize) -> Result<ColumnSample> {
        if index >= self.len() {
            return Err(DatasetError::Lookup(format!(
                "Row index {index} out of range for {} row(s)",
                self.len()
            )));
        }
        let values = self
            .data
            .iter()
            .filter_map(|&c| self.table.value(c, index))
            .collect();
        let values = self.options.transform.apply(VariableArray::scalar(values))?;

        Ok(ColumnSample {
            values,
            label: self.label.and_then(|c| self.table.value(c, index)),
            index: self
                .options
                .return_index
                .then(|| self.table.index()[index]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ColumnTable {
        ColumnTable::new(
            vec!["label".into(), "a".into(), "b".into(), "class".into()],
            vec![vec![1.0, 0.0], vec![10.0, 100.0], vec![1.0, 2.0], vec![7.0, 8.0]],
            vec![40, 41],
        )
        .unwrap()
    }

    #[test]
    fn test_default_columns_skip_labels() {
        let ds = ColumnDataset::from_table(
            table(),
            ColumnOptions {
                label_column: Some("class".into()),
                ..ColumnOptions::default()
            },
        )
        .unwrap();
        assert_eq!(ds.data_columns(), ["a", "b"]);

        let sample = ds.get(1).unwrap();
        assert_eq!(sample.values.data, vec![100.0, 2.0]);
        assert_eq!(sample.label, Some(8.0));
        assert_eq!(sample.index, Some(41));
    }

    #[test]
    fn test_selected_columns_with_transform() {
        let ds = ColumnDataset::from_table(
            table(),
            ColumnOptions {
                data_columns: Some(vec!["b".into(), "a".into()]),
                return_index: false,
                transform: SampleTransform::Log10,
                ..ColumnOptions::default()
            },
        )
        .unwrap();
        let sample = ds.get(0).unwrap();
        assert_eq!(sample.values.data, vec![0.0, 1.0]);
        assert_eq!(sample.label, None);
        assert_eq!(sample.index, None);
    }

    #[test]
    fn test_unknown_column_and_bad_index() {
        let err = ColumnDataset::from_table(
            table(),
            ColumnOptions {
                label_column: Some("missing".into()),
                ..ColumnOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::Lookup(_)));

        let ds = ColumnDataset::from_table(table(), ColumnOptions::default()).unwrap();
        assert!(matches!(ds.get(2), Err(DatasetError::Lookup(_))));
    }
}
