use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Public science-file API of the MMS Science Data Center.
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://lasp.colorado.edu/mms/sdc/public/files/api/v1/";

/// Human-labelled region files published alongside Olshevsky et al. (2021).
pub const DEFAULT_LABEL_BASE_URL: &str =
    "https://bitbucket.org/volshevsky/mmslearning/raw/7b93d08b585842454c309668870ecd25ea16e3e0/labels_human/";

/// Environment variables that override the storage root, in priority order.
pub const STORAGE_ROOT_VARS: [&str; 2] = ["MMS_DATA_DIR", "SPEDAS_DATA_DIR"];

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Locations and endpoints shared by the builder and the accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory under which archive files are stored (`./mms/...` paths hang off it).
    pub storage_root: PathBuf,
    /// Where downloaded label source files are kept between runs.
    pub label_cache_dir: PathBuf,
    pub archive_base_url: String,
    pub label_base_url: String,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from);
        let overrides: Vec<Option<PathBuf>> = STORAGE_ROOT_VARS
            .iter()
            .map(|var| env::var_os(var).map(PathBuf::from))
            .collect();

        Settings {
            storage_root: resolve_storage_root(&overrides, home.as_deref()),
            label_cache_dir: env::temp_dir().join("mms_labels"),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            label_base_url: DEFAULT_LABEL_BASE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    /// Load settings from a JSON file; absent keys keep their environment defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let settings: Settings = serde_json::from_str(&text)?;
        info!(
            "Settings loaded from {} (storage root {})",
            path.display(),
            settings.storage_root.display()
        );
        Ok(settings)
    }

    /// Same settings with a different storage root.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// First set override wins, then `$HOME/spacephyml_data`, then `~/spacephyml_data`.
fn resolve_storage_root(overrides: &[Option<PathBuf>], home: Option<&Path>) -> PathBuf {
    if let Some(root) = overrides.iter().flatten().find(|p| !p.as_os_str().is_empty()) {
        return root.clone();
    }
    home.unwrap_or_else(|| Path::new("~")).join("spacephyml_data")
}
