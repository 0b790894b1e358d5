//! Recipe scaling
//!
//! Scaling multiplies the extensive parts of a recipe (oil and additive
//! weights) by one factor. Superfat, lye type, water setting and prices are
//! intensive and stay as they are. Lye and water are never scaled directly;
//! run `calculate` on the scaled recipe instead.

use crate::calculator::calculate;
use crate::error::{Result, SoapError};
use crate::models::Recipe;
use crate::oils::OilRegistry;

/// What the new size refers to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleTarget {
    /// Total weight of the oils only
    OilWeight(f64),
    /// Oils + lye + water + additives
    BatchWeight(f64),
}

impl ScaleTarget {
    pub fn value(self) -> f64 {
        match self {
            ScaleTarget::OilWeight(v) | ScaleTarget::BatchWeight(v) => v,
        }
    }
}

fn validate_positive(value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SoapError::InvalidScale(value))
    }
}

/// Scale a recipe to a new oil or batch weight.
///
/// The registry is only consulted for batch targets, where the current batch
/// weight has to be calculated first.
pub fn scale(recipe: &Recipe, registry: &OilRegistry, target: ScaleTarget) -> Result<Recipe> {
    if recipe.oils.is_empty() {
        return Err(SoapError::EmptyRecipe);
    }
    if let Some(line) = recipe.oils.iter().find(|l| !(l.weight.is_finite() && l.weight > 0.0)) {
        return Err(SoapError::invalid(format!(
            "weight of '{}' must be positive, got {}",
            line.oil_id, line.weight
        )));
    }
    validate_positive(target.value())?;

    let current_oil = recipe.total_oil_weight();

    let mut scaled = match target {
        ScaleTarget::OilWeight(new_oil) => scale_by_factor(recipe, new_oil / current_oil)?,
        ScaleTarget::BatchWeight(new_batch) => {
            // every batch component is linear in the oil weights
            let current_batch = calculate(recipe, registry)?.total_batch_weight;
            scale_by_factor(recipe, new_batch / current_batch)?
        }
    };

    if let ScaleTarget::BatchWeight(new_batch) = target {
        scaled.batch_weight = Some(new_batch);
    }
    Ok(scaled)
}

/// Multiply every oil and additive weight by `factor`
pub fn scale_by_factor(recipe: &Recipe, factor: f64) -> Result<Recipe> {
    validate_positive(factor)?;

    let mut scaled = recipe.clone();
    for line in &mut scaled.oils {
        line.weight *= factor;
    }
    for additive in &mut scaled.additives {
        additive.weight *= factor;
    }
    scaled.batch_weight = recipe.batch_weight.map(|w| w * factor);
    Ok(scaled)
}

/// Scale to the recipe's own `batch_weight`, if it declares one
pub fn fit_to_batch_weight(recipe: &Recipe, registry: &OilRegistry) -> Result<Recipe> {
    match recipe.batch_weight {
        Some(target) => scale(recipe, registry, ScaleTarget::BatchWeight(target)),
        None => Ok(recipe.clone()),
    }
}
