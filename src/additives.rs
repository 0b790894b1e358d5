//! Additive table: milks, sugars, clays, fragrance and the like
//!
//! Knows which additives stand in for water and how much of each is usually
//! used. Recipes still carry their own `Additive` lines; the table fills in
//! the water flag and the weight when only a name or a usage rate is given.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SoapError};
use crate::models::{Additive, Recipe};
use crate::units::{GRAMS_PER_KILOGRAM, GRAMS_PER_OUNCE, GRAMS_PER_POUND, WeightUnit, parse_weight};

const BUILTIN_ADDITIVES: &str = include_str!("../data/additives.json");

// Pattern: "3%", "0.7 oz/lb", "30g/kg"
static RATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d*)?|\.\d+)\s*(%|oz/lb|g/kg)\s*$").expect("Invalid usage rate regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditiveInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Liquid that is subtracted from the calculated water
    #[serde(default)]
    pub is_water_replacement: bool,
    /// Usual amount, 0 when there is no sensible default
    #[serde(default)]
    pub default_percent_of_oils: f64,
}

/// Amount of additive relative to the oil weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UsageRate {
    PercentOfOils(f64),
    OuncesPerPound(f64),
    GramsPerKilogram(f64),
}

impl UsageRate {
    /// Grams of additive for `total_oil_weight` grams of oil
    pub fn grams_for(self, total_oil_weight: f64) -> f64 {
        match self {
            UsageRate::PercentOfOils(pct) => total_oil_weight * pct / 100.0,
            UsageRate::OuncesPerPound(rate) => total_oil_weight / GRAMS_PER_POUND * rate * GRAMS_PER_OUNCE,
            UsageRate::GramsPerKilogram(rate) => total_oil_weight / GRAMS_PER_KILOGRAM * rate,
        }
    }
}

impl FromStr for UsageRate {
    type Err = SoapError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = RATE_RE
            .captures(s)
            .ok_or_else(|| SoapError::InvalidQuantity(s.to_string()))?;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| SoapError::InvalidQuantity(s.to_string()))?;

        Ok(match &caps[2] {
            "%" => UsageRate::PercentOfOils(value),
            "oz/lb" => UsageRate::OuncesPerPound(value),
            _ => UsageRate::GramsPerKilogram(value),
        })
    }
}

impl fmt::Display for UsageRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageRate::PercentOfOils(v) => write!(f, "{v}%"),
            UsageRate::OuncesPerPound(v) => write!(f, "{v} oz/lb"),
            UsageRate::GramsPerKilogram(v) => write!(f, "{v} g/kg"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdditiveAmount {
    Grams(f64),
    Rate(UsageRate),
}

/// `NAME`, `NAME=WEIGHT` or `NAME=RATE` as given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveSpec {
    pub name: String,
    /// `None` means "use the table's default rate"
    pub amount: Option<AdditiveAmount>,
}

impl AdditiveSpec {
    pub fn parse(input: &str, default_unit: WeightUnit) -> Result<Self> {
        let (name, amount) = match input.split_once('=') {
            Some((name, raw)) => {
                let amount = match raw.parse::<UsageRate>() {
                    Ok(rate) => AdditiveAmount::Rate(rate),
                    Err(_) => AdditiveAmount::Grams(parse_weight(raw, default_unit)?),
                };
                (name.trim(), Some(amount))
            }
            None => (input.trim(), None),
        };

        if name.is_empty() {
            return Err(SoapError::InvalidQuantity(input.to_string()));
        }
        Ok(AdditiveSpec {
            name: name.to_string(),
            amount,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdditiveTable {
    entries: BTreeMap<String, AdditiveInfo>,
    custom: BTreeSet<String>,
}

fn validate(info: &AdditiveInfo) -> Result<()> {
    if info.name.trim().is_empty() {
        return Err(SoapError::invalid("additive name is empty"));
    }
    let pct = info.default_percent_of_oils;
    if !(pct.is_finite() && pct >= 0.0) {
        return Err(SoapError::invalid(format!(
            "default rate of '{}' must not be negative, got {pct}",
            info.name
        )));
    }
    Ok(())
}

impl AdditiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_ADDITIVES, Path::new("<builtin additives>"))
    }

    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self> {
        let records: Vec<AdditiveInfo> =
            serde_json::from_str(json).map_err(|e| SoapError::serialization(origin, e))?;

        let mut table = Self::new();
        for info in records {
            validate(&info)?;
            table.entries.insert(info.name.clone(), info);
        }
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&AdditiveInfo> {
        self.entries.get(name)
    }

    /// All additives, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &AdditiveInfo> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom.contains(name)
    }

    /// Add or update an additive; user entries may also redefine built-in ones
    pub fn insert(&mut self, info: AdditiveInfo) -> Result<()> {
        validate(&info)?;
        self.custom.insert(info.name.clone());
        self.entries.insert(info.name.clone(), info);
        Ok(())
    }

    /// Remove a user entry; built-in additives stay
    pub fn remove(&mut self, name: &str) -> Option<AdditiveInfo> {
        if !self.custom.remove(name) {
            return None;
        }
        self.entries.remove(name)
    }

    /// Merge a custom additives file. A missing file is not an error.
    pub fn merge_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            debug!("No custom additives file at {}", path.display());
            return Ok(0);
        }

        let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
        let records: Vec<AdditiveInfo> =
            serde_json::from_str(&json).map_err(|e| SoapError::serialization(path, e))?;
        let count = records.len();
        for info in records {
            self.insert(info)?;
        }

        debug!("Merged {} custom additives from {}", count, path.display());
        Ok(count)
    }

    /// Write the user entries only
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let records: Vec<&AdditiveInfo> =
            self.custom.iter().filter_map(|name| self.entries.get(name)).collect();
        let json =
            serde_json::to_string_pretty(&records).map_err(|e| SoapError::serialization(path, e))?;
        fs::write(path, json).map_err(|e| SoapError::io(path, e))
    }

    /// Turn a spec into a recipe line for `total_oil_weight` grams of oil.
    ///
    /// Unknown additives are allowed but need an explicit amount and never replace water.
    pub fn resolve(&self, spec: &AdditiveSpec, total_oil_weight: f64) -> Result<Additive> {
        let info = self.get(&spec.name);

        let weight = match spec.amount {
            Some(AdditiveAmount::Grams(grams)) => grams,
            Some(AdditiveAmount::Rate(rate)) => rate.grams_for(total_oil_weight),
            None => match info {
                Some(info) if info.default_percent_of_oils > 0.0 => {
                    UsageRate::PercentOfOils(info.default_percent_of_oils).grams_for(total_oil_weight)
                }
                _ => {
                    return Err(SoapError::InvalidQuantity(format!(
                        "no amount given for '{}' and no default rate",
                        spec.name
                    )));
                }
            },
        };

        let mut additive = Additive::new(spec.name.clone(), weight);
        additive.replaces_water = info.is_some_and(|i| i.is_water_replacement);
        Ok(additive)
    }

    /// Mark every additive the table lists as a water replacement
    pub fn mark_water_replacements(&self, recipe: &Recipe) -> Recipe {
        let mut marked = recipe.clone();
        for additive in &mut marked.additives {
            if self.get(&additive.name).is_some_and(|i| i.is_water_replacement) {
                additive.replaces_water = true;
            }
        }
        marked
    }
}
