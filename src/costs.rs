//! Ingredient purchase prices
//!
//! A small JSON ledger of what each ingredient cost to buy, reduced to a
//! price per gram for recipe costing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SoapError};
use crate::models::{LyeType, Recipe};
use crate::units::{GRAMS_PER_KILOGRAM, GRAMS_PER_OUNCE, GRAMS_PER_POUND};

const GRAMS_PER_LITER: f64 = 1000.0; // volumes assume 1 g/ml
const GRAMS_PER_GALLON: f64 = 3785.41;
const GRAMS_PER_FLUID_OUNCE: f64 = 29.5735;

/// Convert a purchase quantity to grams. Volumes are treated as 1 g/ml.
pub fn purchase_to_grams(amount: f64, unit: &str) -> Result<f64> {
    let factor = match unit.trim().to_lowercase().as_str() {
        "g" | "gram" | "grams" | "ml" | "milliliters" => 1.0,
        "oz" | "ounce" | "ounces" => GRAMS_PER_OUNCE,
        "lb" | "lbs" | "pound" | "pounds" => GRAMS_PER_POUND,
        "kg" | "kilogram" | "kilograms" => GRAMS_PER_KILOGRAM,
        "l" | "liter" | "liters" => GRAMS_PER_LITER,
        "gal" | "gallon" | "gallons" => GRAMS_PER_GALLON,
        "fl oz" | "fluid ounces" => GRAMS_PER_FLUID_OUNCE,
        _ => return Err(SoapError::InvalidQuantity(format!("{amount} {unit}"))),
    };
    Ok(amount * factor)
}

/// Price paid for a quantity of one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub price: f64,
    pub quantity: f64,
    pub unit: String,
}

impl Purchase {
    pub fn cost_per_gram(&self) -> Result<f64> {
        let grams = purchase_to_grams(self.quantity, &self.unit)?;
        if grams <= 0.0 {
            return Err(SoapError::invalid(format!(
                "purchase quantity must be positive, got {} {}",
                self.quantity, self.unit
            )));
        }
        Ok(self.price / grams)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    entries: BTreeMap<String, Purchase>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger; a missing file gives an empty table
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No cost table at {}", path.display());
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
        serde_json::from_str(&json).map_err(|e| SoapError::serialization(path, e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SoapError::serialization(path, e))?;
        fs::write(path, json).map_err(|e| SoapError::io(path, e))
    }

    pub fn set_cost(&mut self, name: &str, price: f64, quantity: f64, unit: &str) -> Result<()> {
        let purchase = Purchase {
            price,
            quantity,
            unit: unit.to_string(),
        };
        // reject units we cannot price before storing them
        purchase.cost_per_gram()?;
        self.entries.insert(name.to_string(), purchase);
        Ok(())
    }

    /// Add stock at a new price; the stored price becomes the weighted average
    pub fn add_stock(&mut self, name: &str, price: f64, quantity: f64, unit: &str) -> Result<()> {
        let Some(current) = self.entries.get(name) else {
            return self.set_cost(name, price, quantity, unit);
        };

        let current_grams = purchase_to_grams(current.quantity, &current.unit)?;
        let added_grams = purchase_to_grams(quantity, unit)?;
        let merged = Purchase {
            price: current.price + price,
            quantity: current_grams + added_grams,
            unit: "grams".to_string(),
        };
        self.entries.insert(name.to_string(), merged);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Purchase> {
        self.entries.get(name)
    }

    pub fn cost_per_gram(&self, name: &str) -> Option<f64> {
        self.entries.get(name).and_then(|p| p.cost_per_gram().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Purchase)> + '_ {
        self.entries.iter()
    }

    /// Fill in prices the recipe does not set itself.
    ///
    /// NaOH is priced under "NaOH"; KOH under "KOH", or "90% KOH" first for recipes using it.
    pub fn apply_to(&self, recipe: &Recipe) -> Recipe {
        let mut priced = recipe.clone();
        for line in &mut priced.oils {
            if line.price_per_unit.is_none() {
                line.price_per_unit = self.cost_per_gram(&line.oil_id);
            }
        }
        for additive in &mut priced.additives {
            if additive.price_per_unit.is_none() {
                additive.price_per_unit = self.cost_per_gram(&additive.name);
            }
        }
        if priced.naoh_price_per_unit.is_none() {
            priced.naoh_price_per_unit = self.cost_per_gram(LyeType::Naoh.label());
        }
        if priced.koh_price_per_unit.is_none() {
            priced.koh_price_per_unit = match recipe.lye_type {
                LyeType::Koh90 => self.cost_per_gram(LyeType::Koh90.label()),
                _ => None,
            }
            .or_else(|| self.cost_per_gram(LyeType::Koh.label()));
        }
        if priced.water_price_per_unit.is_none() {
            priced.water_price_per_unit = self.cost_per_gram("Water");
        }
        priced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_per_gram_across_units() {
        let mut table = CostTable::new();
        table.set_cost("Olive Oil", 20.0, 1.0, "kg").unwrap();
        table.set_cost("NaOH", 9.07184, 2.0, "lbs").unwrap();

        assert!((table.cost_per_gram("Olive Oil").unwrap() - 0.02).abs() < 1e-12);
        assert!((table.cost_per_gram("NaOH").unwrap() - 0.01).abs() < 1e-12);
        assert!(table.cost_per_gram("Shea Butter").is_none());
        assert!(table.set_cost("Honey", 5.0, 1.0, "jar").is_err());
    }

    #[test]
    fn test_add_stock_weighted_average() {
        let mut table = CostTable::new();
        table.add_stock("Coconut Oil", 10.0, 1000.0, "g").unwrap();
        table.add_stock("Coconut Oil", 30.0, 1.0, "kg").unwrap();

        let stock = table.get("Coconut Oil").unwrap();
        assert_eq!(stock.quantity, 2000.0);
        assert_eq!(stock.price, 40.0);
        assert!((table.cost_per_gram("Coconut Oil").unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_apply_to_keeps_explicit_prices() {
        let mut table = CostTable::new();
        table.set_cost("Olive Oil", 10.0, 1000.0, "g").unwrap();
        table.set_cost("Castor Oil", 30.0, 1000.0, "g").unwrap();
        table.set_cost("NaOH", 5.0, 1000.0, "g").unwrap();

        let mut recipe = Recipe::new("Priced")
            .with_oil("Olive Oil", 500.0)
            .with_oil("Castor Oil", 50.0);
        recipe.oils[1].price_per_unit = Some(0.05);

        let priced = table.apply_to(&recipe);
        assert_eq!(priced.oils[0].price_per_unit, Some(0.01));
        assert_eq!(priced.oils[1].price_per_unit, Some(0.05));
        assert_eq!(priced.naoh_price_per_unit, Some(0.005));
        assert_eq!(priced.koh_price_per_unit, None);
        assert_eq!(priced.water_price_per_unit, None);
    }

    #[test]
    fn test_apply_to_prices_both_lyes_for_dual() {
        let mut table = CostTable::new();
        table.set_cost("NaOH", 5.0, 1.0, "kg").unwrap();
        table.set_cost("KOH", 8.0, 1.0, "kg").unwrap();

        let mut recipe = Recipe::new("Dual").with_oil("Olive Oil", 1000.0).with_lye(LyeType::Dual);
        recipe.lye_split_percent = Some(50.0);

        let priced = table.apply_to(&recipe);
        assert_eq!(priced.naoh_price_per_unit, Some(0.005));
        assert_eq!(priced.koh_price_per_unit, Some(0.008));

        table.set_cost("90% KOH", 9.0, 1.0, "kg").unwrap();
        let flakes = table.apply_to(&Recipe::new("Liquid").with_lye(LyeType::Koh90));
        assert_eq!(flakes.koh_price_per_unit, Some(0.009));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingredient_costs.json");
        assert_eq!(CostTable::load(&path).unwrap(), CostTable::new());

        let mut table = CostTable::new();
        table.set_cost("Olive Oil", 15.99, 16.0, "oz").unwrap();
        table.save(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["Olive Oil"]["unit"], "oz");
        assert_eq!(CostTable::load(&path).unwrap(), table);
    }
}
