//! Known measurement variables and the archive partition each lives in.

use chrono::NaiveDate;

use super::naming::ArchiveQuery;
use crate::error::{DatasetError, Result};

/// Time-tag variable used by the archive when a variable has no dedicated one.
pub const DEFAULT_EPOCH_VARIABLE: &str = "Epoch";

const PROBES: [&str; 4] = ["mms1", "mms2", "mms3", "mms4"];

/// Where a measurement variable can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    pub probe: String,
    pub instrument: String,
    pub rate: String,
    pub level: String,
    pub descriptor: Option<String>,
    pub epoch_variable: String,
}

impl VariableSpec {
    pub fn query(&self, start: NaiveDate, end: NaiveDate) -> ArchiveQuery {
        ArchiveQuery {
            start,
            end,
            probe: self.probe.clone(),
            instrument: self.instrument.clone(),
            rate: self.rate.clone(),
            level: self.level.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

/// Per-probe variable templates: (suffix, instrument, rate, level, descriptor, epoch variable).
const TEMPLATES: [(&str, &str, &str, &str, Option<&str>, &str); 5] = [
    ("dis_dist_fast", "fpi", "fast", "l2", Some("dis-dist"), "Epoch"),
    ("des_dist_fast", "fpi", "fast", "l2", Some("des-dist"), "Epoch"),
    ("dis_energyspectr_omni_fast", "fpi", "fast", "l2", Some("dis-moms"), "Epoch"),
    ("des_energyspectr_omni_fast", "fpi", "fast", "l2", Some("des-moms"), "Epoch"),
    ("fgm_b_gse_srvy_l2", "fgm", "srvy", "l2", None, "Epoch"),
];

/// Look up a variable by name, e.g. `mms1_dis_dist_fast`.
pub fn lookup(name: &str) -> Result<VariableSpec> {
    let unknown = || DatasetError::Lookup(format!("unknown variable '{name}'"));
    let (probe, suffix) = name.split_once('_').ok_or_else(unknown)?;
    if !PROBES.contains(&probe) {
        return Err(unknown());
    }
    let (_, instrument, rate, level, descriptor, epoch) = TEMPLATES
        .iter()
        .find(|(s, ..)| *s == suffix)
        .ok_or_else(unknown)?;
    Ok(VariableSpec {
        name: name.to_string(),
        probe: probe.to_string(),
        instrument: instrument.to_string(),
        rate: rate.to_string(),
        level: level.to_string(),
        descriptor: descriptor.map(str::to_string),
        epoch_variable: epoch.to_string(),
    })
}

/// Time-tag variable for `name`, falling back to [`DEFAULT_EPOCH_VARIABLE`].
pub fn epoch_variable_for(name: &str) -> String {
    lookup(name)
        .map(|spec| spec.epoch_variable)
        .unwrap_or_else(|_| DEFAULT_EPOCH_VARIABLE.to_string())
}

/// Every variable name the registry knows.
pub fn known_variables() -> Vec<String> {
    PROBES
        .iter()
        .flat_map(|probe| TEMPLATES.iter().map(move |(suffix, ..)| format!("{probe}_{suffix}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ion_distribution() {
        let spec = lookup("mms1_dis_dist_fast").unwrap();
        assert_eq!(spec.instrument, "fpi");
        assert_eq!(spec.descriptor.as_deref(), Some("dis-dist"));
        assert_eq!(spec.epoch_variable, "Epoch");
    }

    #[test]
    fn test_lookup_other_probe() {
        assert_eq!(lookup("mms3_fgm_b_gse_srvy_l2").unwrap().probe, "mms3");
    }

    #[test]
    fn test_unknown_variables() {
        assert!(matches!(lookup("mms5_dis_dist_fast"), Err(DatasetError::Lookup(_))));
        assert!(matches!(lookup("mms1_nothing"), Err(DatasetError::Lookup(_))));
        assert!(matches!(lookup("plain"), Err(DatasetError::Lookup(_))));
        assert_eq!(epoch_variable_for("custom_var"), DEFAULT_EPOCH_VARIABLE);
    }

    #[test]
    fn test_known_variables_all_resolve() {
        let names = known_variables();
        assert_eq!(names.len(), 20);
        assert!(names.iter().all(|n| lookup(n).is_ok()));
    }
}
