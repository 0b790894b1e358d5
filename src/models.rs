//! Data models for oils, recipes and calculation results

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SoapError};

/// KOH SAP / NaOH SAP, from the molar masses 56.1 / 40.0
pub const KOH_PER_NAOH: f64 = 1.403;

/// Purity of the KOH flakes sold as "90% KOH"
pub const KOH_90_PURITY: f64 = 0.90;

/// Tolerance when checking that oil percentages add up to 100
pub const PERCENT_TOLERANCE: f64 = 0.1;

/// Soap quality scores, on the oil database's native scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Qualities {
    pub hardness: f64,
    pub cleansing: f64,
    pub conditioning: f64,
    pub bubbly: f64,
    pub creamy: f64,
    pub iodine: f64,
    pub ins: f64,
}

impl Qualities {
    /// Add `other` weighted by `fraction` (0..=1 share of the oils)
    pub fn accumulate(&mut self, other: &Qualities, fraction: f64) {
        self.hardness += other.hardness * fraction;
        self.cleansing += other.cleansing * fraction;
        self.conditioning += other.conditioning * fraction;
        self.bubbly += other.bubbly * fraction;
        self.creamy += other.creamy * fraction;
        self.iodine += other.iodine * fraction;
        self.ins += other.ins * fraction;
    }

    /// (label, value, recommended range) rows for display
    pub fn rows(&self) -> [(&'static str, f64, (f64, f64)); 7] {
        [
            ("Hardness", self.hardness, (29.0, 54.0)),
            ("Cleansing", self.cleansing, (12.0, 22.0)),
            ("Conditioning", self.conditioning, (44.0, 69.0)),
            ("Bubbly", self.bubbly, (14.0, 46.0)),
            ("Creamy", self.creamy, (16.0, 48.0)),
            ("Iodine", self.iodine, (41.0, 70.0)),
            ("INS", self.ins, (136.0, 165.0)),
        ]
    }
}

/// Fatty acid composition, percent of the oil
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FattyAcidProfile {
    pub lauric: f64,
    pub myristic: f64,
    pub palmitic: f64,
    pub stearic: f64,
    pub ricinoleic: f64,
    pub oleic: f64,
    pub linoleic: f64,
    pub linolenic: f64,
}

impl FattyAcidProfile {
    pub fn accumulate(&mut self, other: &FattyAcidProfile, fraction: f64) {
        self.lauric += other.lauric * fraction;
        self.myristic += other.myristic * fraction;
        self.palmitic += other.palmitic * fraction;
        self.stearic += other.stearic * fraction;
        self.ricinoleic += other.ricinoleic * fraction;
        self.oleic += other.oleic * fraction;
        self.linoleic += other.linoleic * fraction;
        self.linolenic += other.linolenic * fraction;
    }

    pub fn rows(&self) -> [(&'static str, f64); 8] {
        [
            ("Lauric", self.lauric),
            ("Myristic", self.myristic),
            ("Palmitic", self.palmitic),
            ("Stearic", self.stearic),
            ("Ricinoleic", self.ricinoleic),
            ("Oleic", self.oleic),
            ("Linoleic", self.linoleic),
            ("Linolenic", self.linolenic),
        ]
    }
}

/// One oil in the registry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct OilEntry {
    pub id: String,
    pub display_name: String,
    pub sap_naoh: f64, // g NaOH per g oil
    pub sap_koh: f64,  // g KOH per g oil
    pub qualities: Qualities,
    pub fatty_acids: Option<FattyAcidProfile>,
    pub price_per_unit: Option<f64>, // currency per gram
}

impl OilEntry {
    /// SAP value for one lye; 90% KOH uses the pure KOH value (purity is applied later)
    pub fn sap(&self, lye: Lye) -> f64 {
        match lye {
            Lye::Naoh => self.sap_naoh,
            Lye::Koh => self.sap_koh,
        }
    }
}

/// A single alkali
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lye {
    Naoh,
    Koh,
}

/// Lye selection of a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LyeType {
    #[default]
    #[serde(rename = "NaOH")]
    Naoh,
    #[serde(rename = "KOH")]
    Koh,
    #[serde(rename = "90% KOH")]
    Koh90,
    /// NaOH/KOH split, see `Recipe::lye_split_percent`
    Dual,
}

impl LyeType {
    pub fn label(self) -> &'static str {
        match self {
            LyeType::Naoh => "NaOH",
            LyeType::Koh => "KOH",
            LyeType::Koh90 => "90% KOH",
            LyeType::Dual => "Dual",
        }
    }

    pub fn koh_purity(self) -> f64 {
        match self {
            LyeType::Koh90 => KOH_90_PURITY,
            _ => 1.0,
        }
    }
}

impl FromStr for LyeType {
    type Err = SoapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "naoh" => Ok(LyeType::Naoh),
            "koh" => Ok(LyeType::Koh),
            "90% koh" | "koh90" | "90koh" => Ok(LyeType::Koh90),
            "dual" => Ok(LyeType::Dual),
            _ => Err(SoapError::invalid(format!("unknown lye type '{s}'"))),
        }
    }
}

impl fmt::Display for LyeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the water amount is derived. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaterSetting {
    /// water : lye, e.g. 2.0 = twice the lye weight
    Ratio(f64),
    /// Percent of total oil weight
    PercentOfOils(f64),
    /// Lye as percent of (lye + water)
    Concentration(f64),
}

impl Default for WaterSetting {
    fn default() -> Self {
        WaterSetting::Ratio(2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaterMode {
    Ratio,
    PercentOfOils,
    Concentration,
}

impl WaterSetting {
    pub fn from_parts(mode: WaterMode, value: f64) -> Self {
        match mode {
            WaterMode::Ratio => WaterSetting::Ratio(value),
            WaterMode::PercentOfOils => WaterSetting::PercentOfOils(value),
            WaterMode::Concentration => WaterSetting::Concentration(value),
        }
    }

    pub fn mode(&self) -> WaterMode {
        match self {
            WaterSetting::Ratio(_) => WaterMode::Ratio,
            WaterSetting::PercentOfOils(_) => WaterMode::PercentOfOils,
            WaterSetting::Concentration(_) => WaterMode::Concentration,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            WaterSetting::Ratio(v) | WaterSetting::PercentOfOils(v) | WaterSetting::Concentration(v) => v,
        }
    }
}

impl fmt::Display for WaterSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaterSetting::Ratio(r) => write!(f, "water:lye ratio {r}:1"),
            WaterSetting::PercentOfOils(p) => write!(f, "water at {p}% of oils"),
            WaterSetting::Concentration(c) => write!(f, "{c}% lye concentration"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeOilLine {
    pub oil_id: String,
    pub weight: f64, // grams
    pub price_per_unit: Option<f64>,
}

impl RecipeOilLine {
    pub fn new(oil_id: impl Into<String>, weight: f64) -> Self {
        Self {
            oil_id: oil_id.into(),
            weight,
            price_per_unit: None,
        }
    }
}

/// Non-oil ingredient with a fixed weight (fragrance, clay, milk, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Additive {
    pub name: String,
    pub weight: f64,
    /// Liquid that stands in for part of the water
    pub replaces_water: bool,
    pub price_per_unit: Option<f64>,
}

impl Additive {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            replaces_water: false,
            price_per_unit: None,
        }
    }

    pub fn replacing_water(mut self) -> Self {
        self.replaces_water = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub oils: Vec<RecipeOilLine>,
    pub lye_type: LyeType,
    /// Percent of saponification done by NaOH when `lye_type` is `Dual`
    pub lye_split_percent: Option<f64>,
    pub superfat_percent: f64,
    pub water: WaterSetting,
    pub batch_weight: Option<f64>,
    pub naoh_price_per_unit: Option<f64>,
    pub koh_price_per_unit: Option<f64>,
    pub water_price_per_unit: Option<f64>,
    pub additives: Vec<Additive>,
    pub notes: String,
    /// Set when the recipe is first stored
    pub created_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self::new("Untitled Recipe")
    }
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oils: Vec::new(),
            lye_type: LyeType::Naoh,
            lye_split_percent: None,
            superfat_percent: 5.0,
            water: WaterSetting::default(),
            batch_weight: None,
            naoh_price_per_unit: None,
            koh_price_per_unit: None,
            water_price_per_unit: None,
            additives: Vec::new(),
            notes: String::new(),
            created_date: None,
            modified_date: None,
        }
    }

    /// Build a recipe from oil percentages and a total oil weight.
    ///
    /// Percentages are converted to absolute weights once; the recipe never
    /// stores both.
    pub fn from_percentages(
        name: impl Into<String>,
        total_oil_weight: f64,
        percentages: &[(String, f64)],
    ) -> Result<Self> {
        if percentages.is_empty() {
            return Err(SoapError::EmptyRecipe);
        }
        if !(total_oil_weight.is_finite() && total_oil_weight > 0.0) {
            return Err(SoapError::invalid(format!(
                "total oil weight must be positive, got {total_oil_weight}"
            )));
        }

        let sum: f64 = percentages.iter().map(|(_, pct)| pct).sum();
        if (sum - 100.0).abs() > PERCENT_TOLERANCE {
            return Err(SoapError::invalid(format!(
                "oil percentages must add up to 100, got {sum}"
            )));
        }

        let mut recipe = Recipe::new(name);
        for (oil_id, pct) in percentages {
            recipe
                .oils
                .push(RecipeOilLine::new(oil_id.clone(), total_oil_weight * pct / 100.0));
        }
        Ok(recipe)
    }

    pub fn with_oil(mut self, oil_id: impl Into<String>, weight: f64) -> Self {
        self.set_oil(oil_id, weight);
        self
    }

    pub fn with_superfat(mut self, percent: f64) -> Self {
        self.superfat_percent = percent;
        self
    }

    pub fn with_water(mut self, water: WaterSetting) -> Self {
        self.water = water;
        self
    }

    pub fn with_lye(mut self, lye_type: LyeType) -> Self {
        self.lye_type = lye_type;
        self
    }

    /// Add an oil, update its weight, or remove it when `weight <= 0`
    pub fn set_oil(&mut self, oil_id: impl Into<String>, weight: f64) {
        let oil_id = oil_id.into();
        match self.oils.iter().position(|line| line.oil_id == oil_id) {
            Some(idx) if weight > 0.0 => self.oils[idx].weight = weight,
            Some(idx) => {
                self.oils.remove(idx);
            }
            None if weight > 0.0 => self.oils.push(RecipeOilLine::new(oil_id, weight)),
            None => {}
        }
    }

    /// Add an additive, replace the one with the same name, or remove it when `weight <= 0`
    pub fn set_additive(&mut self, additive: Additive) {
        match self.additives.iter().position(|a| a.name == additive.name) {
            Some(idx) if additive.weight > 0.0 => self.additives[idx] = additive,
            Some(idx) => {
                self.additives.remove(idx);
            }
            None if additive.weight > 0.0 => self.additives.push(additive),
            None => {}
        }
    }

    /// Stamp the modification time; the creation time is only set once
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.created_date.get_or_insert(now);
        self.modified_date = Some(now);
    }

    pub fn remove_oil(&mut self, oil_id: &str) -> bool {
        let before = self.oils.len();
        self.oils.retain(|line| line.oil_id != oil_id);
        self.oils.len() != before
    }

    pub fn total_oil_weight(&self) -> f64 {
        self.oils.iter().map(|line| line.weight).sum()
    }

    pub fn additive_weight(&self) -> f64 {
        self.additives.iter().map(|a| a.weight).sum()
    }

    /// Each oil's share of the total oil weight, in percent
    pub fn oil_percentages(&self) -> Vec<(String, f64)> {
        let total = self.total_oil_weight();
        self.oils
            .iter()
            .map(|line| {
                let pct = if total > 0.0 { line.weight / total * 100.0 } else { 0.0 };
                (line.oil_id.clone(), pct)
            })
            .collect()
    }
}

/// Lye after superfat and purity adjustments, in grams
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LyeAmounts {
    pub naoh: f64,
    pub koh: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OilLineResult {
    pub oil_id: String,
    pub display_name: String,
    pub weight: f64,
    pub percent: f64,
    pub naoh: f64,
    pub koh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceSpeed {
    Slow,
    Moderate,
    Fast,
}

impl TraceSpeed {
    pub fn faster(self) -> Self {
        match self {
            TraceSpeed::Slow => TraceSpeed::Moderate,
            TraceSpeed::Moderate | TraceSpeed::Fast => TraceSpeed::Fast,
        }
    }
}

impl fmt::Display for TraceSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TraceSpeed::Slow => "slow",
            TraceSpeed::Moderate => "moderate",
            TraceSpeed::Fast => "fast",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub oils: f64,
    pub lye: f64,
    pub water: f64,
    pub additives: f64,
    pub total: f64,
    /// Oils with no known price; they add nothing to `oils`
    pub unpriced_oils: Vec<String>,
    /// Lye the recipe needs but has no price for ("NaOH", "KOH")
    pub unpriced_lye: Vec<String>,
}

/// Output of one calculation. Never cached; recompute after every edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub total_oil_weight: f64,
    pub lye: LyeAmounts,
    /// Liquid implied by the water setting
    pub water_required: f64,
    /// Water to add once water-replacing additives are subtracted
    pub water_mass: f64,
    pub additive_weight: f64,
    pub total_batch_weight: f64,
    pub lye_concentration: f64,
    pub water_lye_ratio: f64,
    pub lye_percent_of_oils: f64,
    pub water_percent_of_oils: f64,
    pub qualities: Qualities,
    pub fatty_acids: FattyAcidProfile,
    pub lines: Vec<OilLineResult>,
    pub trace: TraceSpeed,
    pub cost: Option<CostBreakdown>,
}
