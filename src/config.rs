//! Calculator settings
//!
//! Defaults for new recipes plus the locations of the data files. Loaded
//! from an optional JSON file; command line flags override what it says.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SoapError};
use crate::models::{LyeType, WaterMode, WaterSetting};
use crate::production::{DEFAULT_BAR_WEIGHT, ProductionCosts};
use crate::units::WeightUnit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: RecipeDefaults,
    pub paths: DataPaths,
    /// Unit used for reports and for bare numbers on the command line
    pub unit: WeightUnit,
    pub production: ProductionCosts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            defaults: RecipeDefaults::default(),
            paths: DataPaths::default(),
            unit: WeightUnit::Grams,
            production: ProductionCosts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDefaults {
    pub superfat_percent: f64,
    pub lye_type: LyeType,
    pub water_mode: WaterMode,
    pub water_ratio: f64,
    pub water_percent: f64,
    pub lye_concentration: f64,
    /// Grams per bar for yield estimates
    pub bar_weight: f64,
}

impl Default for RecipeDefaults {
    fn default() -> Self {
        Self {
            superfat_percent: 5.0,
            lye_type: LyeType::Naoh,
            water_mode: WaterMode::Ratio,
            water_ratio: 2.0,
            water_percent: 38.0,
            lye_concentration: 33.0,
            bar_weight: DEFAULT_BAR_WEIGHT,
        }
    }
}

impl RecipeDefaults {
    /// The water setting for the configured default mode
    pub fn water(&self) -> WaterSetting {
        match self.water_mode {
            WaterMode::Ratio => WaterSetting::Ratio(self.water_ratio),
            WaterMode::PercentOfOils => WaterSetting::PercentOfOils(self.water_percent),
            WaterMode::Concentration => WaterSetting::Concentration(self.lye_concentration),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Oil database; `None` uses the embedded table
    pub oils: Option<PathBuf>,
    pub custom_oils: PathBuf,
    pub custom_additives: PathBuf,
    pub recipes_dir: PathBuf,
    pub costs: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            oils: None,
            custom_oils: PathBuf::from("custom_oils.json"),
            custom_additives: PathBuf::from("custom_additives.json"),
            recipes_dir: PathBuf::from("recipes"),
            costs: PathBuf::from("ingredient_costs.json"),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no file is given or it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
        let settings = serde_json::from_str(&json).map_err(|e| SoapError::serialization(path, e))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}
