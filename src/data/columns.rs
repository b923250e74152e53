//! Generic numeric tables: any `.csv` / `.feather` file of named columns.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::ipc::reader::FileReader;
use log::debug;

use super::loader::{parse_int, TableFormat, INDEX_COLUMN_NAMES};
use crate::error::{DatasetError, Result};

/// Numeric columns of a table plus its row index.
///
/// Columns that do not hold numbers are left out. Missing values read as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: Vec<i64>,
}

impl ColumnTable {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>, index: Vec<i64>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(DatasetError::Format(format!(
                "{} column names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        if let Some((name, col)) = names.iter().zip(&columns).find(|(_, c)| c.len() != index.len()) {
            return Err(DatasetError::Format(format!(
                "column '{name}' has {} values, expected {}",
                col.len(),
                index.len()
            )));
        }
        Ok(ColumnTable { names, columns, index })
    }

    /// Load a table.  Dispatch by extension.
    pub fn read(path: &Path) -> Result<Self> {
        let table = match TableFormat::from_path(path)? {
            TableFormat::Csv => load_csv(path)?,
            TableFormat::Feather => load_feather(path)?,
        };
        debug!(
            "Loaded {} rows, numeric columns {:?} from {}",
            table.len(),
            table.names,
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Value of column number `column` at `row`.
    pub fn value(&self, column: usize, row: usize) -> Option<f64> {
        self.columns.get(column)?.get(row).copied()
    }

    /// Row labels: the stored index column, or row numbers when there is none.
    pub fn index(&self) -> &[i64] {
        &self.index
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<ColumnTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let has_index = headers
        .first()
        .is_some_and(|h| INDEX_COLUMN_NAMES.contains(&h.as_str()));
    let offset = usize::from(has_index);

    let mut index = Vec::new();
    let mut cells: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); headers.len() - offset];
    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        index.push(if has_index {
            parse_int(record.get(0).unwrap_or(""), row_no, "index")?
        } else {
            row_no as i64
        });
        for (c, column) in cells.iter_mut().enumerate() {
            let Some(values) = column else { continue };
            match parse_float(record.get(c + offset).unwrap_or("")) {
                Some(v) => values.push(v),
                None => *column = None,
            }
        }
    }

    let mut names = Vec::new();
    let mut columns = Vec::new();
    for (name, column) in headers.into_iter().skip(offset).zip(cells) {
        match column {
            Some(values) => {
                names.push(name);
                columns.push(values);
            }
            None => debug!("{}: skipping non-numeric column '{name}'", path.display()),
        }
    }
    ColumnTable::new(names, columns, index)
}

/// Empty cells are missing values.
fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Feather loader
// ---------------------------------------------------------------------------

fn load_feather(path: &Path) -> Result<ColumnTable> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let reader = FileReader::try_new(file, None)?;
    let schema = reader.schema();

    let index_col = schema
        .fields()
        .iter()
        .position(|f| INDEX_COLUMN_NAMES.contains(&f.name().as_str()) && f.data_type().is_integer());
    let numeric: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, f)| Some(*i) != index_col && f.data_type().is_numeric())
        .map(|(i, _)| i)
        .collect();
    let names: Vec<String> = numeric.iter().map(|&i| schema.field(i).name().clone()).collect();

    let mut index = Vec::new();
    let mut columns = vec![Vec::new(); numeric.len()];
    for batch_result in reader {
        let batch = batch_result?;
        match index_col {
            Some(i) => index.extend(index_values(batch.column(i))?),
            None => {
                let start = index.len() as i64;
                index.extend(start..start + batch.num_rows() as i64);
            }
        }
        for (values, &i) in columns.iter_mut().zip(&numeric) {
            values.extend(float_values(batch.column(i))?);
        }
    }
    ColumnTable::new(names, columns, index)
}

/// Nulls read as NaN.
fn float_values(col: &ArrayRef) -> Result<Vec<f64>> {
    let widened = cast(col, &DataType::Float64)?;
    let floats = widened.as_primitive::<Float64Type>();
    Ok((0..floats.len())
        .map(|i| if floats.is_null(i) { f64::NAN } else { floats.value(i) })
        .collect())
}

fn index_values(col: &ArrayRef) -> Result<Vec<i64>> {
    if col.null_count() > 0 {
        return Err(DatasetError::Format("index column contains nulls".into()));
    }
    let widened = cast(col, &DataType::Int64)?;
    Ok(widened.as_primitive::<Int64Type>().values().to_vec())
}
