//! Named, downloadable alignment tables.

use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::transform::SampleTransform;
use crate::error::{DatasetError, Result};

/// Where a published table lives and how its samples are usually prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPreset {
    pub url: String,
    /// File name the table is stored under locally.
    pub file_name: String,
    #[serde(default)]
    pub transform: SampleTransform,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetRegistry {
    presets: BTreeMap<String, DatasetPreset>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a preset; returns the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, preset: DatasetPreset) -> Option<DatasetPreset> {
        self.presets.insert(name.into(), preset)
    }

    pub fn resolve(&self, name: &str) -> Result<&DatasetPreset> {
        self.presets.get(name).ok_or_else(|| {
            DatasetError::Lookup(format!(
                "unknown dataset '{name}' (known: {})",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Load a JSON object of `name -> preset`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let presets: BTreeMap<String, DatasetPreset> = serde_json::from_str(&text)?;
        info!("Loaded {} dataset preset(s) from {}", presets.len(), path.display());
        Ok(PresetRegistry { presets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = PresetRegistry::new();
        let preset = DatasetPreset {
            url: "https://tables.test/nov.csv".into(),
            file_name: "nov.csv".into(),
            transform: SampleTransform::Flatten,
        };
        assert!(registry.register("nov", preset.clone()).is_none());
        assert_eq!(registry.resolve("nov").unwrap(), &preset);
        assert!(matches!(registry.resolve("dec"), Err(DatasetError::Lookup(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(
            &path,
            r#"{
                "dec": {"url": "https://tables.test/dec.feather", "file_name": "dec.feather",
                        "transform": {"compose": ["log10", "flatten"]}},
                "nov": {"url": "https://tables.test/nov.csv", "file_name": "nov.csv"}
            }"#,
        )
        .unwrap();

        let registry = PresetRegistry::from_json_file(&path).unwrap();
        assert_eq!(registry.names(), vec!["dec", "nov"]);
        assert!(registry.resolve("nov").unwrap().transform.is_identity());
        assert_eq!(
            registry.resolve("dec").unwrap().transform,
            SampleTransform::Compose(vec![SampleTransform::Log10, SampleTransform::Flatten])
        );
    }
}
