#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use spacephy_dataset::archive::memory::{MemoryArchive, MemoryRemote};
use spacephy_dataset::archive::reader::VariableArray;
use spacephy_dataset::epoch::datetime_to_epoch;
use spacephy_dataset::Settings;

pub const SEC: i64 = 1_000_000_000;
pub const DIS: &str = "mms1_dis_dist_fast";
pub const FGM: &str = "mms1_fgm_b_gse_srvy_l2";
pub const FILE_A: &str = "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf";
pub const FILE_B: &str = "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf";
pub const FGM_FILE: &str = "mms1_fgm_srvy_l2_20171204_v5.117.0.cdf";
pub const LABEL_URL: &str = "https://labels.test/labels_fpi_fast_dis_dist_201712.cdf";
pub const LABEL_FILE: &str = "labels_fpi_fast_dis_dist_201712.cdf";

/// Distribution samples per archive file, 4.5 s apart.
pub const SAMPLES_PER_FILE: i64 = 10;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 2017-12-04T00:00:00Z as an archive epoch.
pub fn day_start() -> i64 {
    datetime_to_epoch(Utc.with_ymd_and_hms(2017, 12, 4, 0, 0, 0).unwrap())
}

pub fn dis_epoch(file_offset_hours: i64, k: i64) -> i64 {
    day_start() + file_offset_hours * 3600 * SEC + k * 4_500_000_000
}

pub fn fgm_epoch(k: i64) -> i64 {
    day_start() + SEC + k * 3 * SEC
}

/// A two-file distribution archive, a magnetometer file and one month of labels.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
    pub remote: MemoryRemote,
    pub archive: MemoryArchive,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            label_cache_dir: dir.path().join("labels"),
            archive_base_url: "https://sdc.test/api/v1/".into(),
            label_base_url: "https://labels.test/".into(),
            ..Settings::from_env().with_storage_root(dir.path().join("archive"))
        };

        let mut remote = MemoryRemote::new();
        let mut archive = MemoryArchive::new();

        for (file, hours, base) in [(FILE_A, 0, 0.0), (FILE_B, 2, 1000.0)] {
            remote.add_archive_file(file, file.as_bytes().to_vec());
            archive.insert_epochs(file, "Epoch", (0..SAMPLES_PER_FILE).map(|k| dis_epoch(hours, k)).collect());
            let data = (0..SAMPLES_PER_FILE)
                .flat_map(|k| [base + k as f64, base + 100.0 + k as f64])
                .collect();
            archive.insert_values(
                file,
                DIS,
                VariableArray::new(vec![SAMPLES_PER_FILE as usize, 2], data).unwrap(),
            );
        }

        // Covers both distribution files.
        let fgm_samples = 2 * 3600 / 3 + 20;
        remote.add_archive_file(FGM_FILE, FGM_FILE.as_bytes().to_vec());
        archive.insert_epochs(FGM_FILE, "Epoch", (0..fgm_samples).map(fgm_epoch).collect());
        archive.insert_values(
            FGM_FILE,
            FGM,
            VariableArray::new(
                vec![fgm_samples as usize, 3],
                (0..fgm_samples).flat_map(|k| [k as f64, 0.0, -(k as f64)]).collect(),
            )
            .unwrap(),
        );

        remote.add_url(LABEL_URL, b"labels".to_vec());
        // File A: labels 1 s after samples 0..5, plus one an hour away from any sample.
        archive.insert_integers(LABEL_FILE, "label_mms1_fpi_fast_dis_dist_20171204000000", vec![0, 1, 2, -1, 0, 1, 2]);
        archive.insert_epochs(
            LABEL_FILE,
            "epoch_mms1_fpi_fast_dis_dist_20171204000000",
            (0..6)
                .map(|k| dis_epoch(0, k) + SEC)
                .chain([day_start() + 3600 * SEC])
                .collect(),
        );
        // File B: exact sample epochs.
        archive.insert_integers(LABEL_FILE, "label_mms1_fpi_fast_dis_dist_20171204020000", vec![2, 2, 0]);
        archive.insert_epochs(
            LABEL_FILE,
            "epoch_mms1_fpi_fast_dis_dist_20171204020000",
            (0..3).map(|k| dis_epoch(2, k)).collect(),
        );
        // Next day, outside the test ranges.
        archive.insert_integers(LABEL_FILE, "label_mms1_fpi_fast_dis_dist_20171205000000", vec![1]);
        archive.insert_epochs(
            LABEL_FILE,
            "epoch_mms1_fpi_fast_dis_dist_20171205000000",
            vec![day_start() + 86_400 * SEC],
        );

        Fixture {
            dir,
            settings,
            remote,
            archive,
        }
    }
}
