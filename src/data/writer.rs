use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use log::debug;

use super::loader::TableFormat;
use super::model::Dataset;
use crate::error::{DatasetError, Result};

/// Write an alignment table.  Format chosen by extension; the file is replaced if present.
pub fn write_table(path: &Path, dataset: &Dataset) -> Result<()> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => write_csv(path, dataset)?,
        TableFormat::Feather => write_feather(path, dataset)?,
    }
    debug!("Wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// Header starts with an unnamed row-index column, then the alignment columns.
fn write_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(dataset.column_names());
    writer.write_record(&header)?;

    for (index, row) in dataset.rows.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(index.to_string());
        record.push(row.label.to_string());
        record.push(row.epoch.to_string());
        for slot in &row.slots {
            record.push(slot.epoch.to_string());
            record.push(slot.file.clone());
            record.push(slot.var_name.clone());
        }
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .map_err(|e| DatasetError::io(path, e))
}

// ---------------------------------------------------------------------------
// Feather writer
// ---------------------------------------------------------------------------

fn write_feather(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut fields = vec![
        Field::new("label", DataType::Int64, false),
        Field::new("epoch", DataType::Int64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(dataset.rows.iter().map(|r| r.label))),
        Arc::new(Int64Array::from_iter_values(dataset.rows.iter().map(|r| r.epoch))),
    ];

    for i in 0..dataset.slot_count() {
        fields.push(Field::new(format!("epoch {i}"), DataType::Int64, false));
        fields.push(Field::new(format!("file {i}"), DataType::Utf8, false));
        fields.push(Field::new(format!("var_name {i}"), DataType::Utf8, false));

        let slots = || dataset.rows.iter().map(move |r| &r.slots[i]);
        columns.push(Arc::new(Int64Array::from_iter_values(slots().map(|s| s.epoch))));
        columns.push(Arc::new(StringArray::from_iter_values(slots().map(|s| s.file.as_str()))));
        columns.push(Arc::new(StringArray::from_iter_values(
            slots().map(|s| s.var_name.as_str()),
        )));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut writer = FileWriter::try_new(file, &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_table;
    use crate::data::model::{AlignedRow, VariableSlot};

    fn sample_dataset() -> Dataset {
        let rows = (0..3)
            .map(|i| AlignedRow {
                label: i % 2,
                epoch: 1_000 + i,
                slots: vec![
                    VariableSlot {
                        epoch: 1_000 + i,
                        file: format!("a_{i}.cdf"),
                        var_name: "mms1_dis_dist_fast".into(),
                    },
                    VariableSlot {
                        epoch: 2_000 + i,
                        file: "b.cdf".into(),
                        var_name: "mms1_fgm_b_gse_srvy_l2".into(),
                    },
                ],
            })
            .collect();
        Dataset::from_rows(2, rows).unwrap()
    }

    #[test]
    fn test_csv_header_has_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        write_table(&path, &sample_dataset()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            ",label,epoch,epoch 0,file 0,var_name 0,epoch 1,file 1,var_name 1"
        );
        assert!(lines.next().unwrap().starts_with("0,0,1000,1000,a_0.cdf"));
    }

    #[test]
    fn test_round_trip_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let original = sample_dataset();
        for name in ["t.csv", "t.feather"] {
            let path = dir.path().join(name);
            write_table(&path, &original).unwrap();
            let loaded = read_table(&path).unwrap();
            assert_eq!(loaded, original, "{name}");
        }
    }

    #[test]
    fn test_empty_feather_keeps_slot_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.feather");
        write_table(&path, &Dataset::new(3)).unwrap();
        let loaded = read_table(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.slot_count(), 3);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.xlsx");
        assert!(matches!(write_table(&path, &sample_dataset()), Err(DatasetError::Format(_))));
        assert!(!path.exists());
    }
}
