//! Oil registry: SAP values and quality coefficients per oil
//!
//! Built once at startup (embedded table, an oil database file, plus any
//! custom oils) and then passed by reference into every calculation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SoapError};
use crate::models::{FattyAcidProfile, KOH_PER_NAOH, OilEntry, Qualities};

const BUILTIN_OILS: &str = include_str!("../data/oils.json");

/// One record of the oil database / custom oils file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OilRecord {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(rename = "sapNaOH")]
    sap_naoh: f64,
    #[serde(rename = "sapKOH", default, skip_serializing_if = "Option::is_none")]
    sap_koh: Option<f64>,
    #[serde(flatten)]
    qualities: Qualities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fatty_acids: Option<FattyAcidProfile>,
}

impl From<OilRecord> for OilEntry {
    fn from(record: OilRecord) -> Self {
        let sap_koh = record.sap_koh.unwrap_or(record.sap_naoh * KOH_PER_NAOH);
        OilEntry {
            display_name: record.display_name.unwrap_or_else(|| record.id.clone()),
            id: record.id,
            sap_naoh: record.sap_naoh,
            sap_koh,
            qualities: record.qualities,
            fatty_acids: record.fatty_acids,
            price_per_unit: record.price_per_unit,
        }
    }
}

impl From<&OilEntry> for OilRecord {
    fn from(entry: &OilEntry) -> Self {
        OilRecord {
            id: entry.id.clone(),
            display_name: Some(entry.display_name.clone()),
            sap_naoh: entry.sap_naoh,
            sap_koh: Some(entry.sap_koh),
            qualities: entry.qualities,
            price_per_unit: entry.price_per_unit,
            fatty_acids: entry.fatty_acids,
        }
    }
}

fn validate(entry: &OilEntry) -> Result<()> {
    let invalid = |reason: &str| SoapError::InvalidOil {
        id: entry.id.clone(),
        reason: reason.to_string(),
    };

    if entry.id.trim().is_empty() {
        return Err(invalid("id is empty"));
    }
    if !(entry.sap_naoh.is_finite() && entry.sap_naoh > 0.0) {
        return Err(invalid("NaOH SAP value must be positive"));
    }
    if !(entry.sap_koh.is_finite() && entry.sap_koh > 0.0) {
        return Err(invalid("KOH SAP value must be positive"));
    }
    if let Some(price) = entry.price_per_unit {
        if !(price.is_finite() && price >= 0.0) {
            return Err(invalid("price must not be negative"));
        }
    }
    Ok(())
}

fn parse_records(json: &str, origin: &Path) -> Result<Vec<OilEntry>> {
    let records: Vec<OilRecord> =
        serde_json::from_str(json).map_err(|e| SoapError::serialization(origin, e))?;
    Ok(records.into_iter().map(OilEntry::from).collect())
}

#[derive(Debug, Clone, Default)]
pub struct OilRegistry {
    oils: BTreeMap<String, OilEntry>,
    custom: BTreeSet<String>,
}

impl OilRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from entries. Duplicate ids are rejected.
    pub fn from_entries(entries: impl IntoIterator<Item = OilEntry>) -> Result<Self> {
        let mut registry = Self::new();
        for entry in entries {
            validate(&entry)?;
            if registry.oils.contains_key(&entry.id) {
                return Err(SoapError::InvalidOil {
                    id: entry.id,
                    reason: "duplicate id".to_string(),
                });
            }
            registry.oils.insert(entry.id.clone(), entry);
        }
        Ok(registry)
    }

    /// The embedded SoapCalc oil table
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_OILS, Path::new("<builtin oils>"))
    }

    /// Parse an oil database (JSON array of oil records)
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self> {
        Self::from_entries(parse_records(json, origin)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
        let registry = Self::from_json_str(&json, path)?;
        info!("Loaded {} oils from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn lookup(&self, id: &str) -> Result<&OilEntry> {
        self.oils.get(id).ok_or_else(|| SoapError::UnknownOil {
            ids: vec![id.to_string()],
        })
    }

    pub fn get(&self, id: &str) -> Option<&OilEntry> {
        self.oils.get(id)
    }

    /// All oils, sorted by id
    pub fn list_oils(&self) -> impl Iterator<Item = &OilEntry> + '_ {
        self.oils.values()
    }

    pub fn len(&self) -> usize {
        self.oils.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oils.is_empty()
    }

    pub fn is_custom(&self, id: &str) -> bool {
        self.custom.contains(id)
    }

    /// Add or replace a custom oil. Built-in oils cannot be overridden.
    pub fn add_custom(&mut self, entry: OilEntry) -> Result<()> {
        validate(&entry)?;
        if self.oils.contains_key(&entry.id) && !self.custom.contains(&entry.id) {
            return Err(SoapError::InvalidOil {
                id: entry.id,
                reason: "a built-in oil already uses this id".to_string(),
            });
        }
        self.custom.insert(entry.id.clone());
        self.oils.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Remove a custom oil; returns `None` for unknown or built-in ids
    pub fn remove_custom(&mut self, id: &str) -> Option<OilEntry> {
        if !self.custom.remove(id) {
            return None;
        }
        self.oils.remove(id)
    }

    pub fn custom_oils(&self) -> impl Iterator<Item = &OilEntry> + '_ {
        self.custom.iter().filter_map(|id| self.oils.get(id))
    }

    /// Merge a custom oils file into the registry. A missing file is not an error.
    pub fn merge_custom_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            debug!("No custom oils file at {}", path.display());
            return Ok(0);
        }

        let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
        let entries = parse_records(&json, path)?;
        let count = entries.len();
        for entry in entries {
            self.add_custom(entry)?;
        }

        debug!("Merged {} custom oils from {}", count, path.display());
        Ok(count)
    }

    /// Write only the custom oils, in the oil database format
    pub fn save_custom_file(&self, path: &Path) -> Result<()> {
        let records: Vec<OilRecord> = self.custom_oils().map(OilRecord::from).collect();
        let json =
            serde_json::to_string_pretty(&records).map_err(|e| SoapError::serialization(path, e))?;
        fs::write(path, json).map_err(|e| SoapError::io(path, e))?;

        debug!("Saved {} custom oils to {}", records.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oil(id: &str, sap_naoh: f64) -> OilEntry {
        OilEntry {
            id: id.to_string(),
            display_name: id.to_string(),
            sap_naoh,
            sap_koh: sap_naoh * KOH_PER_NAOH,
            qualities: Qualities::default(),
            fatty_acids: None,
            price_per_unit: None,
        }
    }

    #[test]
    fn test_builtin_table_loads() {
        let registry = OilRegistry::builtin().unwrap();
        assert!(registry.len() > 100);

        let coconut = registry.lookup("Coconut Oil, 76 deg").unwrap();
        assert_eq!(coconut.sap_naoh, 0.183);
        assert!(coconut.sap_koh > coconut.sap_naoh);
        assert_eq!(coconut.qualities.ins, 258.0);
        assert_eq!(coconut.fatty_acids.unwrap().lauric, 48.0);
    }

    #[test]
    fn test_lookup_unknown_oil() {
        let registry = OilRegistry::builtin().unwrap();
        match registry.lookup("Unicorn Tallow") {
            Err(SoapError::UnknownOil { ids }) => assert_eq!(ids, vec!["Unicorn Tallow"]),
            other => panic!("Expected UnknownOil, got {other:?}"),
        }
    }

    #[test]
    fn test_koh_sap_derived_when_missing() {
        let json = r#"[{"id": "Test Oil", "sapNaOH": 0.1, "hardness": 10, "cleansing": 0,
            "conditioning": 50, "bubbly": 0, "creamy": 10, "iodine": 80, "ins": 100,
            "pricePerUnit": 0.01}]"#;
        let registry = OilRegistry::from_json_str(json, Path::new("test.json")).unwrap();
        let entry = registry.lookup("Test Oil").unwrap();
        assert!((entry.sap_koh - 0.1403).abs() < 1e-12);
        assert_eq!(entry.display_name, "Test Oil");
        assert_eq!(entry.price_per_unit, Some(0.01));
        assert_eq!(entry.qualities.conditioning, 50.0);
    }

    #[test]
    fn test_rejects_bad_records() {
        let dup = OilRegistry::from_entries(vec![oil("A", 0.1), oil("A", 0.2)]);
        assert!(matches!(dup, Err(SoapError::InvalidOil { .. })));

        let zero_sap = OilRegistry::from_entries(vec![oil("A", 0.0)]);
        assert!(matches!(zero_sap, Err(SoapError::InvalidOil { .. })));

        let malformed = OilRegistry::from_json_str("[{\"id\": 3}]", Path::new("bad.json"));
        assert!(matches!(malformed, Err(SoapError::Serialization { .. })));
    }

    #[test]
    fn test_custom_oils() {
        let mut registry = OilRegistry::from_entries(vec![oil("Olive Oil", 0.135)]).unwrap();

        assert!(registry.add_custom(oil("Olive Oil", 0.2)).is_err());

        registry.add_custom(oil("My Blend", 0.15)).unwrap();
        registry.add_custom(oil("My Blend", 0.16)).unwrap();
        assert!(registry.is_custom("My Blend"));
        assert_eq!(registry.lookup("My Blend").unwrap().sap_naoh, 0.16);
        assert_eq!(registry.custom_oils().count(), 1);

        assert!(registry.remove_custom("Olive Oil").is_none());
        assert!(registry.remove_custom("My Blend").is_some());
        assert!(registry.get("My Blend").is_none());
    }

    #[test]
    fn test_custom_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom_oils.json");

        let mut registry = OilRegistry::from_entries(vec![oil("Olive Oil", 0.135)]).unwrap();
        assert_eq!(registry.merge_custom_file(&path).unwrap(), 0);

        registry.add_custom(oil("My Blend", 0.15)).unwrap();
        registry.save_custom_file(&path).unwrap();

        let mut fresh = OilRegistry::from_entries(vec![oil("Olive Oil", 0.135)]).unwrap();
        assert_eq!(fresh.merge_custom_file(&path).unwrap(), 1);
        assert_eq!(fresh.lookup("My Blend").unwrap(), registry.lookup("My Blend").unwrap());
        assert!(!fresh.is_custom("Olive Oil"));
    }
}
