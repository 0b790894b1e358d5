//! Bar yield and production costing for a calculated batch

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoapError};
use crate::models::CalculationResult;
use crate::units::GRAMS_PER_OUNCE;

/// A 4.5 oz bar
pub const DEFAULT_BAR_WEIGHT: f64 = 4.5 * GRAMS_PER_OUNCE;

/// Wholesale is quoted at half of retail
const WHOLESALE_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarYield {
    pub bar_weight: f64,
    /// Fractional; the last bar may be short
    pub bars: f64,
    /// Material cost per bar, when the batch is priced
    pub cost_per_bar: Option<f64>,
}

/// Estimate how many bars a batch makes
pub fn bar_yield(result: &CalculationResult, bar_weight: f64) -> Result<BarYield> {
    if !(bar_weight.is_finite() && bar_weight > 0.0) {
        return Err(SoapError::invalid(format!("bar weight must be positive, got {bar_weight}")));
    }

    let bars = result.total_batch_weight / bar_weight;
    let cost_per_bar = match &result.cost {
        Some(cost) if bars > 0.0 => Some(cost.total / bars),
        _ => None,
    };

    Ok(BarYield {
        bar_weight,
        bars,
        cost_per_bar,
    })
}

/// Labor, waste, packaging and margin assumptions for pricing a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionCosts {
    /// Per hour
    pub labor_rate: f64,
    pub labor_hours: f64,
    /// Batter left in the bowl, spills and cure shrinkage, charged on materials
    pub waste_percent: f64,
    pub packaging_per_bar: f64,
    /// Charged on materials plus labor
    pub overhead_percent: f64,
    pub profit_margin_percent: f64,
}

impl Default for ProductionCosts {
    fn default() -> Self {
        Self {
            labor_rate: 20.0,
            labor_hours: 1.0,
            waste_percent: 5.0,
            packaging_per_bar: 0.50,
            overhead_percent: 10.0,
            profit_margin_percent: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pricing {
    pub labor_cost: f64,
    /// Materials with waste, labor and overhead
    pub batch_cost: f64,
    pub packaging_cost: f64,
    pub total_cogs: f64,
    pub cogs_per_bar: f64,
    pub retail_price: f64,
    pub wholesale_price: f64,
    pub profit_per_batch: f64,
}

impl ProductionCosts {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("labor rate", self.labor_rate),
            ("labor hours", self.labor_hours),
            ("waste percent", self.waste_percent),
            ("packaging cost", self.packaging_per_bar),
            ("overhead percent", self.overhead_percent),
            ("profit margin", self.profit_margin_percent),
        ];
        for (label, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SoapError::invalid(format!("{label} must not be negative, got {value}")));
            }
        }
        Ok(())
    }

    /// Price a batch from its material cost and bar count
    pub fn price(&self, material_cost: f64, bars: f64) -> Result<Pricing> {
        self.validate()?;
        if !(material_cost.is_finite() && material_cost >= 0.0) {
            return Err(SoapError::invalid(format!(
                "material cost must not be negative, got {material_cost}"
            )));
        }
        if !(bars.is_finite() && bars >= 0.0) {
            return Err(SoapError::invalid(format!("bar count must not be negative, got {bars}")));
        }

        let labor_cost = self.labor_rate * self.labor_hours;
        let materials = material_cost * (1.0 + self.waste_percent / 100.0);
        let batch_cost = (materials + labor_cost) * (1.0 + self.overhead_percent / 100.0);

        let packaging_cost = self.packaging_per_bar * bars;
        let total_cogs = batch_cost + packaging_cost;
        let cogs_per_bar = if bars > 0.0 { total_cogs / bars } else { 0.0 };

        let retail_price = cogs_per_bar * (1.0 + self.profit_margin_percent / 100.0);

        Ok(Pricing {
            labor_cost,
            batch_cost,
            packaging_cost,
            total_cogs,
            cogs_per_bar,
            retail_price,
            wholesale_price: retail_price * WHOLESALE_FRACTION,
            profit_per_batch: retail_price * bars - total_cogs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate;
    use crate::models::Recipe;
    use crate::oils::OilRegistry;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_bar_yield() {
        let registry = OilRegistry::builtin().unwrap();
        let mut recipe = Recipe::new("Bars").with_oil("Olive Oil", 1000.0);

        let result = calculate(&recipe, &registry).unwrap();
        let estimate = bar_yield(&result, 100.0).unwrap();
        assert!((estimate.bars - result.total_batch_weight / 100.0).abs() < EPS);
        assert_eq!(estimate.cost_per_bar, None);

        recipe.oils[0].price_per_unit = Some(0.01);
        let priced = calculate(&recipe, &registry).unwrap();
        let estimate = bar_yield(&priced, 100.0).unwrap();
        let per_bar = estimate.cost_per_bar.unwrap();
        assert!((per_bar * estimate.bars - 10.0).abs() < EPS);

        assert!(bar_yield(&priced, 0.0).is_err());
        assert!(bar_yield(&priced, f64::NAN).is_err());
    }

    #[test]
    fn test_pricing_defaults() {
        // 20 bars from 30.00 of materials
        let pricing = ProductionCosts::default().price(30.0, 20.0).unwrap();

        assert!((pricing.labor_cost - 20.0).abs() < EPS);
        assert!((pricing.batch_cost - (30.0 * 1.05 + 20.0) * 1.10).abs() < EPS);
        assert!((pricing.packaging_cost - 10.0).abs() < EPS);
        assert!((pricing.total_cogs - (pricing.batch_cost + 10.0)).abs() < EPS);
        assert!((pricing.cogs_per_bar - pricing.total_cogs / 20.0).abs() < EPS);
        assert!((pricing.retail_price - pricing.cogs_per_bar * 1.5).abs() < EPS);
        assert!((pricing.wholesale_price - pricing.retail_price / 2.0).abs() < EPS);
        assert!((pricing.profit_per_batch - pricing.total_cogs * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_pricing_edge_cases() {
        let costs = ProductionCosts::default();
        let none = costs.price(30.0, 0.0).unwrap();
        assert_eq!(none.cogs_per_bar, 0.0);
        assert_eq!(none.retail_price, 0.0);

        assert!(costs.price(-1.0, 10.0).is_err());
        let bad = ProductionCosts {
            waste_percent: -5.0,
            ..ProductionCosts::default()
        };
        assert!(bad.price(30.0, 10.0).is_err());
    }
}
