//! Writes a synthetic alignment table for trying out the accessor pipeline.
//!
//! Usage: `generate_sample [output] [rows]` (defaults `sample_dataset.csv`, 2000).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spacephy_dataset::data::model::{AlignedRow, Dataset, VariableSlot, UNKNOWN_LABEL};
use spacephy_dataset::data::writer::write_table;
use spacephy_dataset::epoch::datetime_to_epoch;

/// Fast-survey distribution cadence.
const CADENCE_MS: i64 = 4_500;
/// Archive files cover two hours each.
const FILE_HOURS: i64 = 2;
const LABELS: i64 = 4;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output = PathBuf::from(args.next().unwrap_or_else(|| "sample_dataset.csv".to_string()));
    let rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("row count '{n}' is not a number"))?,
        None => 2000,
    };

    let mut rng = StdRng::seed_from_u64(42);
    let start = Utc
        .with_ymd_and_hms(2017, 12, 4, 0, 0, 0)
        .single()
        .context("invalid start time")?;

    let mut aligned = Vec::with_capacity(rows);
    for i in 0..rows {
        let time = start + Duration::milliseconds(CADENCE_MS * i as i64);
        let file_start = start + Duration::hours((time - start).num_hours() / FILE_HOURS * FILE_HOURS);
        let file = format!(
            "mms1_fpi_fast_l2_dis-dist_{}_v3.4.0.cdf",
            file_start.format("%Y%m%d%H%M%S")
        );
        let epoch = datetime_to_epoch(time);
        // Roughly one row in ten stays unclassified.
        let label = if rng.gen_bool(0.1) {
            UNKNOWN_LABEL
        } else {
            rng.gen_range(0..LABELS)
        };

        aligned.push(AlignedRow {
            label,
            epoch,
            slots: vec![VariableSlot {
                epoch,
                file,
                var_name: "mms1_dis_dist_fast".to_string(),
            }],
        });
    }

    let dataset = Dataset::from_rows(1, aligned)?;
    write_table(&output, &dataset).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Wrote {} rows ({} label classes) to {}",
        dataset.len(),
        dataset.label_counts().len(),
        output.display()
    );
    Ok(())
}
