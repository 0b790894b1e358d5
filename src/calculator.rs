//! Lye, water and soap quality calculation
//!
//! `calculate` is a pure function of the recipe and the registry: no I/O, no
//! logging, nothing cached between calls.

use std::fmt;

use crate::error::{Result, SoapError};
use crate::models::{
    CalculationResult, CostBreakdown, FattyAcidProfile, Lye, LyeAmounts, LyeType, OilEntry,
    OilLineResult, Qualities, Recipe, TraceSpeed, WaterSetting,
};
use crate::oils::OilRegistry;
use crate::units::WeightUnit;

/// Lye concentration above which batter tends to trace faster
const FAST_TRACE_CONCENTRATION: f64 = 35.0;

/// Calculate lye, water, batch weight and qualities for a recipe.
pub fn calculate(recipe: &Recipe, registry: &OilRegistry) -> Result<CalculationResult> {
    validate(recipe)?;
    let oils = resolve_oils(recipe, registry)?;

    let total_oil_weight = recipe.total_oil_weight();

    // Share of saponification done by each lye
    let (naoh_share, koh_share) = match recipe.lye_type {
        LyeType::Naoh => (1.0, 0.0),
        LyeType::Koh | LyeType::Koh90 => (0.0, 1.0),
        LyeType::Dual => {
            let split = recipe.lye_split_percent.unwrap_or_default() / 100.0;
            (split, 1.0 - split)
        }
    };

    // Superfat is a percentage; the lye discount is a fraction of 1
    let superfat_factor = 1.0 - recipe.superfat_percent / 100.0;
    let koh_purity = recipe.lye_type.koh_purity();

    let mut lines = Vec::with_capacity(oils.len());
    let mut qualities = Qualities::default();
    let mut fatty_acids = FattyAcidProfile::default();

    for (line, oil) in recipe.oils.iter().zip(&oils) {
        let fraction = line.weight / total_oil_weight;
        let naoh = line.weight * oil.sap(Lye::Naoh) * naoh_share * superfat_factor;
        let koh = line.weight * oil.sap(Lye::Koh) * koh_share * superfat_factor / koh_purity;

        qualities.accumulate(&oil.qualities, fraction);
        if let Some(profile) = &oil.fatty_acids {
            fatty_acids.accumulate(profile, fraction);
        }

        lines.push(OilLineResult {
            oil_id: line.oil_id.clone(),
            display_name: oil.display_name.clone(),
            weight: line.weight,
            percent: fraction * 100.0,
            naoh,
            koh,
        });
    }

    let naoh: f64 = lines.iter().map(|l| l.naoh).sum();
    let koh: f64 = lines.iter().map(|l| l.koh).sum();
    let lye = LyeAmounts {
        naoh,
        koh,
        total: naoh + koh,
    };

    let water_required = water_for(recipe.water, lye.total, total_oil_weight);
    let replaced: f64 = recipe
        .additives
        .iter()
        .filter(|a| a.replaces_water)
        .map(|a| a.weight)
        .sum();
    let water_mass = (water_required - replaced).max(0.0);

    let additive_weight = recipe.additive_weight();
    let total_batch_weight = total_oil_weight + lye.total + water_mass + additive_weight;

    let lye_concentration = percent_of(lye.total, lye.total + water_required);
    let water_lye_ratio = if lye.total > 0.0 { water_required / lye.total } else { 0.0 };

    let mut trace = trace_from_hardness(qualities.hardness);
    if lye_concentration > FAST_TRACE_CONCENTRATION {
        trace = trace.faster();
    }

    let cost = cost_breakdown(recipe, &oils, &lye, water_mass);

    Ok(CalculationResult {
        total_oil_weight,
        lye,
        water_required,
        water_mass,
        additive_weight,
        total_batch_weight,
        lye_concentration,
        water_lye_ratio,
        lye_percent_of_oils: percent_of(lye.total, total_oil_weight),
        water_percent_of_oils: percent_of(water_required, total_oil_weight),
        qualities,
        fatty_acids,
        lines,
        trace,
        cost,
    })
}

/// Water implied by the active water setting for a given adjusted lye mass
pub fn water_for(setting: WaterSetting, lye_mass: f64, total_oil_weight: f64) -> f64 {
    match setting {
        WaterSetting::Ratio(ratio) => lye_mass * ratio,
        WaterSetting::PercentOfOils(percent) => total_oil_weight * percent / 100.0,
        // concentration = lye / (lye + water) * 100, solved for water
        WaterSetting::Concentration(concentration) => lye_mass * (100.0 / concentration - 1.0),
    }
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

fn trace_from_hardness(hardness: f64) -> TraceSpeed {
    if hardness < 35.0 {
        TraceSpeed::Slow
    } else if hardness <= 50.0 {
        TraceSpeed::Moderate
    } else {
        TraceSpeed::Fast
    }
}

fn validate(recipe: &Recipe) -> Result<()> {
    if recipe.oils.is_empty() {
        return Err(SoapError::EmptyRecipe);
    }

    for line in &recipe.oils {
        if !(line.weight.is_finite() && line.weight > 0.0) {
            return Err(SoapError::invalid(format!(
                "weight of '{}' must be positive, got {}",
                line.oil_id, line.weight
            )));
        }
    }

    let sf = recipe.superfat_percent;
    if !(sf.is_finite() && (0.0..100.0).contains(&sf)) {
        return Err(SoapError::invalid(format!(
            "superfat must be at least 0 and below 100 percent, got {sf}"
        )));
    }

    match (recipe.lye_type, recipe.lye_split_percent) {
        (LyeType::Dual, None) => {
            return Err(SoapError::invalid("dual lye recipe needs a NaOH split percentage"));
        }
        (LyeType::Dual, Some(split)) if !(split.is_finite() && (0.0..=100.0).contains(&split)) => {
            return Err(SoapError::invalid(format!(
                "NaOH split must be between 0 and 100 percent, got {split}"
            )));
        }
        _ => {}
    }

    match recipe.water {
        WaterSetting::Ratio(r) if !(r.is_finite() && r > 0.0) => {
            return Err(SoapError::invalid(format!("water:lye ratio must be positive, got {r}")));
        }
        WaterSetting::PercentOfOils(p) if !(p.is_finite() && p >= 0.0) => {
            return Err(SoapError::invalid(format!(
                "water percent of oils must not be negative, got {p}"
            )));
        }
        WaterSetting::Concentration(c) if !(c.is_finite() && c > 0.0 && c < 100.0) => {
            return Err(SoapError::invalid(format!(
                "lye concentration must be between 0 and 100 percent (exclusive), got {c}"
            )));
        }
        _ => {}
    }

    for additive in &recipe.additives {
        if !(additive.weight.is_finite() && additive.weight >= 0.0) {
            return Err(SoapError::invalid(format!(
                "weight of additive '{}' must not be negative, got {}",
                additive.name, additive.weight
            )));
        }
    }

    Ok(())
}

/// Resolve every oil line, reporting all unknown ids together
fn resolve_oils<'r>(recipe: &Recipe, registry: &'r OilRegistry) -> Result<Vec<&'r OilEntry>> {
    let mut resolved = Vec::with_capacity(recipe.oils.len());
    let mut missing: Vec<String> = Vec::new();

    for line in &recipe.oils {
        match registry.get(&line.oil_id) {
            Some(oil) => resolved.push(oil),
            None => {
                if !missing.contains(&line.oil_id) {
                    missing.push(line.oil_id.clone());
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(SoapError::UnknownOil { ids: missing })
    }
}

fn cost_breakdown(
    recipe: &Recipe,
    oils: &[&OilEntry],
    lye: &LyeAmounts,
    water_mass: f64,
) -> Option<CostBreakdown> {
    let mut breakdown = CostBreakdown::default();
    let mut priced = false;

    for (line, oil) in recipe.oils.iter().zip(oils) {
        match line.price_per_unit.or(oil.price_per_unit) {
            Some(price) => {
                breakdown.oils += line.weight * price;
                priced = true;
            }
            None => breakdown.unpriced_oils.push(line.oil_id.clone()),
        }
    }

    for (label, mass, price) in [
        ("NaOH", lye.naoh, recipe.naoh_price_per_unit),
        ("KOH", lye.koh, recipe.koh_price_per_unit),
    ] {
        if mass <= 0.0 {
            continue;
        }
        match price {
            Some(price) => {
                breakdown.lye += mass * price;
                priced = true;
            }
            None => breakdown.unpriced_lye.push(label.to_string()),
        }
    }
    if let Some(price) = recipe.water_price_per_unit {
        breakdown.water = water_mass * price;
        priced = true;
    }
    for additive in &recipe.additives {
        if let Some(price) = additive.price_per_unit {
            breakdown.additives += additive.weight * price;
            priced = true;
        }
    }

    if !priced {
        return None;
    }

    breakdown.total = breakdown.oils + breakdown.lye + breakdown.water + breakdown.additives;
    Some(breakdown)
}

/// Printable calculation report
pub struct Report<'a> {
    pub recipe: &'a Recipe,
    pub result: &'a CalculationResult,
    pub unit: WeightUnit,
    pub verbose: bool,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;
        let unit = self.unit;
        let w = |grams: f64| format!("{:.2} {}", unit.from_grams(grams), unit);

        writeln!(f, "=== {} ===", self.recipe.name)?;
        writeln!(
            f,
            "Lye: {}, superfat {}%, {}",
            self.recipe.lye_type, self.recipe.superfat_percent, self.recipe.water
        )?;
        writeln!(f)?;

        writeln!(f, "Oils:")?;
        for line in &r.lines {
            writeln!(f, "  {:<36} {:>12} {:>6.1}%", line.display_name, w(line.weight), line.percent)?;
            if self.verbose {
                if line.naoh > 0.0 {
                    writeln!(f, "      needs {} NaOH", w(line.naoh))?;
                }
                if line.koh > 0.0 {
                    writeln!(f, "      needs {} KOH", w(line.koh))?;
                }
            }
        }
        writeln!(f)?;

        writeln!(f, "Weights:")?;
        writeln!(f, "  Total oils:   {}", w(r.total_oil_weight))?;
        if r.lye.naoh > 0.0 {
            writeln!(f, "  NaOH:         {}", w(r.lye.naoh))?;
        }
        if r.lye.koh > 0.0 {
            writeln!(f, "  KOH:          {}", w(r.lye.koh))?;
        }
        writeln!(f, "  Water:        {}", w(r.water_mass))?;
        if r.water_mass != r.water_required {
            writeln!(f, "  (liquid total {} incl. water replacements)", w(r.water_required))?;
        }
        if r.additive_weight > 0.0 {
            writeln!(f, "  Additives:    {}", w(r.additive_weight))?;
        }
        writeln!(f, "  Batch total:  {}", w(r.total_batch_weight))?;
        writeln!(f)?;

        writeln!(
            f,
            "Lye concentration {:.1}%, water:lye {:.2}:1, trace expected {}",
            r.lye_concentration, r.water_lye_ratio, r.trace
        )?;
        writeln!(f)?;

        writeln!(f, "Qualities:")?;
        for (label, value, (low, high)) in r.qualities.rows() {
            let flag = if value < low || value > high { "  (out of range)" } else { "" };
            writeln!(f, "  {:<14} {:>6.1}   [{:.0} - {:.0}]{}", label, value, low, high, flag)?;
        }

        if self.verbose {
            writeln!(f)?;
            writeln!(f, "Fatty acids:")?;
            for (label, value) in r.fatty_acids.rows() {
                writeln!(f, "  {:<14} {:>6.1}%", label, value)?;
            }
        }

        if let Some(cost) = &r.cost {
            writeln!(f)?;
            writeln!(f, "Cost:")?;
            writeln!(f, "  Oils:      {:.2}", cost.oils)?;
            writeln!(f, "  Lye:       {:.2}", cost.lye)?;
            writeln!(f, "  Water:     {:.2}", cost.water)?;
            writeln!(f, "  Additives: {:.2}", cost.additives)?;
            writeln!(f, "  Total:     {:.2}", cost.total)?;
            let unpriced: Vec<&str> = cost
                .unpriced_oils
                .iter()
                .chain(&cost.unpriced_lye)
                .map(String::as_str)
                .collect();
            if !unpriced.is_empty() {
                writeln!(f, "  No price for: {}", unpriced.join(", "))?;
            }
        }

        Ok(())
    }
}
