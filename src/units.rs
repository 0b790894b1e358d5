//! Weight units and quantity parsing
//!
//! Everything inside the crate is stored in grams. Units only matter at the
//! edges: parsing user input and formatting reports.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SoapError};

pub const GRAMS_PER_OUNCE: f64 = 28.3495;
pub const GRAMS_PER_POUND: f64 = 453.592;
pub const GRAMS_PER_KILOGRAM: f64 = 1000.0;

// Pattern: "500", "500g", "1.5 lb", "12 oz"
static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d*)?|\.\d+)\s*([A-Za-z]*)\s*$").expect("Invalid quantity regex")
});

// Pattern: "Olive Oil=500g", "Castor Oil = 5%"
static OIL_SPEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(.+?)\s*=\s*(.+?)\s*$").expect("Invalid oil spec regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Grams,
    Ounces,
    Pounds,
    Kilograms,
}

impl WeightUnit {
    fn grams_per_unit(self) -> f64 {
        match self {
            WeightUnit::Grams => 1.0,
            WeightUnit::Ounces => GRAMS_PER_OUNCE,
            WeightUnit::Pounds => GRAMS_PER_POUND,
            WeightUnit::Kilograms => GRAMS_PER_KILOGRAM,
        }
    }

    pub fn to_grams(self, amount: f64) -> f64 {
        amount * self.grams_per_unit()
    }

    pub fn from_grams(self, grams: f64) -> f64 {
        grams / self.grams_per_unit()
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            WeightUnit::Grams => "g",
            WeightUnit::Ounces => "oz",
            WeightUnit::Pounds => "lbs",
            WeightUnit::Kilograms => "kg",
        }
    }
}

impl FromStr for WeightUnit {
    type Err = SoapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(WeightUnit::Grams),
            "oz" | "ounce" | "ounces" => Ok(WeightUnit::Ounces),
            "lb" | "lbs" | "pound" | "pounds" => Ok(WeightUnit::Pounds),
            "kg" | "kilogram" | "kilograms" => Ok(WeightUnit::Kilograms),
            _ => Err(SoapError::InvalidQuantity(s.to_string())),
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Parse a weight like `500g` or `1.5 lb` into grams.
///
/// A bare number is read in `default_unit`.
pub fn parse_weight(input: &str, default_unit: WeightUnit) -> Result<f64> {
    let caps = QUANTITY_RE
        .captures(input)
        .ok_or_else(|| SoapError::InvalidQuantity(input.to_string()))?;

    let amount: f64 = caps[1]
        .parse()
        .map_err(|_| SoapError::InvalidQuantity(input.to_string()))?;

    let unit = match &caps[2] {
        "" => default_unit,
        suffix => suffix
            .parse()
            .map_err(|_| SoapError::InvalidQuantity(input.to_string()))?,
    };

    Ok(unit.to_grams(amount))
}

/// Amount attached to an oil on the command line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OilAmount {
    Grams(f64),
    Percent(f64),
}

/// `NAME=AMOUNT` where AMOUNT is a weight (`500g`, `1 lb`) or a percentage (`40%`)
#[derive(Debug, Clone, PartialEq)]
pub struct OilSpec {
    pub oil_id: String,
    pub amount: OilAmount,
}

impl OilSpec {
    pub fn parse(input: &str, default_unit: WeightUnit) -> Result<Self> {
        let caps = OIL_SPEC_RE
            .captures(input)
            .ok_or_else(|| SoapError::InvalidQuantity(input.to_string()))?;

        let oil_id = caps[1].to_string();
        let raw = &caps[2];

        let amount = match raw.strip_suffix('%') {
            Some(pct) => OilAmount::Percent(
                pct.trim()
                    .parse()
                    .map_err(|_| SoapError::InvalidQuantity(input.to_string()))?,
            ),
            None => OilAmount::Grams(parse_weight(raw, default_unit)?),
        };

        Ok(OilSpec { oil_id, amount })
    }
}
