use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::ipc::reader::FileReader;
use log::debug;

use super::model::{column_names, slot_count_for_columns, AlignedRow, Dataset, VariableSlot};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Table formats
// ---------------------------------------------------------------------------

/// On-disk layouts an alignment table can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// `.csv`, row oriented; the first, unnamed column is the row index.
    Csv,
    /// `.feather`, an Arrow IPC file.
    Feather,
}

impl TableFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "feather" => Ok(TableFormat::Feather),
            other => Err(DatasetError::Format(format!("Unknown filetype: .{other}"))),
        }
    }
}

/// Names the row-index column may carry in text tables.
pub(super) const INDEX_COLUMN_NAMES: [&str; 2] = ["", "Unnamed: 0"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an alignment table.  Dispatch by extension.
pub fn read_table(path: &Path) -> Result<Dataset> {
    let dataset = match TableFormat::from_path(path)? {
        TableFormat::Csv => load_csv(path)?,
        TableFormat::Feather => load_feather(path)?,
    };
    debug!(
        "Loaded {} rows with {} variable slot(s) from {}",
        dataset.len(),
        dataset.slot_count(),
        path.display()
    );
    Ok(dataset)
}

/// Check the header matches the alignment layout and return the slot count.
fn check_columns(headers: &[String], path: &Path) -> Result<usize> {
    let slots = slot_count_for_columns(headers.len())?;
    let expected = column_names(slots);
    if headers != expected.as_slice() {
        return Err(DatasetError::Format(format!(
            "{}: columns {headers:?} do not follow {expected:?}",
            path.display()
        )));
    }
    Ok(slots)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let skip_index = headers
        .first()
        .is_some_and(|h| INDEX_COLUMN_NAMES.contains(&h.as_str()));
    if skip_index {
        headers.remove(0);
    }
    let slots = check_columns(&headers, path)?;
    let offset = usize::from(skip_index);

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let field = |col: usize| record.get(col + offset).unwrap_or("");

        let label = parse_int(field(0), row_no, "label")?;
        let epoch = parse_int(field(1), row_no, "epoch")?;
        let mut slot_values = Vec::with_capacity(slots);
        for i in 0..slots {
            let base = 2 + 3 * i;
            slot_values.push(VariableSlot {
                epoch: parse_int(field(base), row_no, &format!("epoch {i}"))?,
                file: field(base + 1).to_string(),
                var_name: field(base + 2).to_string(),
            });
        }
        rows.push(AlignedRow {
            label,
            epoch,
            slots: slot_values,
        });
    }

    Dataset::from_rows(slots, rows)
}

/// Integers may have been written as floats (`3.0`) by other tools.
pub(super) fn parse_int(s: &str, row: usize, col: &str) -> Result<i64> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < 9.0e18 => Ok(f as i64),
        _ => Err(DatasetError::Format(format!(
            "Row {row}, {col}: '{s}' is not an integer"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Feather loader
// ---------------------------------------------------------------------------

fn load_feather(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let reader = FileReader::try_new(file, None)?;

    let headers: Vec<String> = reader
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let slots = check_columns(&headers, path)?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;

        let labels = int_values(batch.column(0), "label")?;
        let epochs = int_values(batch.column(1), "epoch")?;
        let mut slot_columns = Vec::with_capacity(slots);
        for i in 0..slots {
            let base = 2 + 3 * i;
            slot_columns.push((
                int_values(batch.column(base), &format!("epoch {i}"))?,
                string_values(batch.column(base + 1))?,
                string_values(batch.column(base + 2))?,
            ));
        }

        for row in 0..batch.num_rows() {
            let slot_values = slot_columns
                .iter()
                .map(|(e, f, v)| VariableSlot {
                    epoch: e[row],
                    file: f[row].clone(),
                    var_name: v[row].clone(),
                })
                .collect();
            rows.push(AlignedRow {
                label: labels[row],
                epoch: epochs[row],
                slots: slot_values,
            });
        }
    }

    Dataset::from_rows(slots, rows)
}

// -- Arrow helpers --

/// Any integer column widened to `i64`; nulls are rejected.
fn int_values(col: &ArrayRef, name: &str) -> Result<Vec<i64>> {
    if col.null_count() > 0 {
        return Err(DatasetError::Format(format!("column '{name}' contains nulls")));
    }
    if !col.data_type().is_integer() {
        return Err(DatasetError::Format(format!(
            "column '{name}' is {:?}, expected an integer type",
            col.data_type()
        )));
    }
    let widened = cast(col, &DataType::Int64)?;
    Ok(widened.as_primitive::<Int64Type>().values().to_vec())
}

/// A string column; nulls read as empty strings.
fn string_values(col: &ArrayRef) -> Result<Vec<String>> {
    let utf8 = cast(col, &DataType::Utf8)?;
    let strings = utf8.as_string::<i32>();
    Ok((0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                String::new()
            } else {
                strings.value(i).to_string()
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_by_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a/b.csv")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("b.FEATHER")).unwrap(), TableFormat::Feather);
        assert!(matches!(
            TableFormat::from_path(Path::new("b.parquet")),
            Err(DatasetError::Format(_))
        ));
        assert!(matches!(TableFormat::from_path(Path::new("noext")), Err(DatasetError::Format(_))));
    }

    #[test]
    fn test_csv_with_index_column_and_float_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexed.csv");
        std::fs::write(
            &path,
            ",label,epoch,epoch 0,file 0,var_name 0\n\
             0,2,565531269184000000,565531269184000000,f.cdf,mms1_dis_dist_fast\n\
             1,-1.0,565531273684000000,565531273684000000,f.cdf,mms1_dis_dist_fast\n",
        )
        .unwrap();

        let ds = read_table(&path).unwrap();
        assert_eq!(ds.slot_count(), 1);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[1].label, -1);
        assert_eq!(ds.rows[1].epoch, 565_531_273_684_000_000);
        assert_eq!(ds.rows[0].slots[0].var_name, "mms1_dis_dist_fast");
    }

    #[test]
    fn test_csv_without_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "label,epoch,epoch 0,file 0,var_name 0\n3,10,10,f.cdf,v\n").unwrap();
        let ds = read_table(&path).unwrap();
        assert_eq!(ds.rows[0].label, 3);
    }

    #[test]
    fn test_csv_bad_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, ",label,epoch,file 0,epoch 0,var_name 0\n").unwrap();
        assert!(matches!(read_table(&path), Err(DatasetError::Format(_))));

        std::fs::write(&path, ",label,epoch,epoch 0,file 0\n").unwrap();
        assert!(matches!(read_table(&path), Err(DatasetError::Format(_))));
    }

    #[test]
    fn test_parse_int_rejects_fractions() {
        assert_eq!(parse_int("4.0", 0, "x").unwrap(), 4);
        assert!(parse_int("4.5", 0, "x").is_err());
        assert!(parse_int("abc", 0, "x").is_err());
    }
}
