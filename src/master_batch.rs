//! Master batches: pre-mixed oil blends and stock lye solutions

use crate::error::{Result, SoapError};
use crate::models::{FattyAcidProfile, OilEntry, PERCENT_TOLERANCE, Qualities};
use crate::oils::OilRegistry;

/// Combine oils (id, percent) into one composite oil.
///
/// SAP values, coefficients and fatty acids are percentage-weighted averages,
/// so a recipe using the blend calculates exactly like one using its parts.
pub fn blend_oils(name: &str, parts: &[(String, f64)], registry: &OilRegistry) -> Result<OilEntry> {
    if parts.is_empty() {
        return Err(SoapError::EmptyRecipe);
    }
    if let Some((id, pct)) = parts.iter().find(|(_, pct)| !(pct.is_finite() && *pct > 0.0)) {
        return Err(SoapError::invalid(format!("share of '{id}' must be positive, got {pct}")));
    }

    let total: f64 = parts.iter().map(|(_, pct)| pct).sum();
    if (total - 100.0).abs() > PERCENT_TOLERANCE {
        return Err(SoapError::invalid(format!(
            "blend percentages must add up to 100, got {total}"
        )));
    }

    let missing: Vec<String> = parts
        .iter()
        .filter(|(id, _)| registry.get(id).is_none())
        .map(|(id, _)| id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(SoapError::UnknownOil { ids: missing });
    }

    let mut sap_naoh = 0.0;
    let mut sap_koh = 0.0;
    let mut qualities = Qualities::default();
    let mut fatty_acids = FattyAcidProfile::default();
    let mut has_fatty_acids = false;

    for (id, pct) in parts {
        let oil = registry.lookup(id)?;
        let fraction = pct / total;
        sap_naoh += oil.sap_naoh * fraction;
        sap_koh += oil.sap_koh * fraction;
        qualities.accumulate(&oil.qualities, fraction);
        if let Some(profile) = &oil.fatty_acids {
            fatty_acids.accumulate(profile, fraction);
            has_fatty_acids = true;
        }
    }

    Ok(OilEntry {
        id: name.to_string(),
        display_name: name.to_string(),
        sap_naoh,
        sap_koh,
        qualities,
        fatty_acids: has_fatty_acids.then_some(fatty_acids),
        price_per_unit: None,
    })
}

/// Lye and water making up a stock solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LyeSolution {
    pub lye: f64,
    pub water: f64,
}

fn validate_concentration(concentration: f64) -> Result<()> {
    if concentration.is_finite() && concentration > 0.0 && concentration < 100.0 {
        Ok(())
    } else {
        Err(SoapError::invalid(format!(
            "solution concentration must be between 0 and 100 percent (exclusive), got {concentration}"
        )))
    }
}

/// Split a target solution weight into lye and water
pub fn lye_solution_mix(solution_weight: f64, concentration: f64) -> Result<LyeSolution> {
    validate_concentration(concentration)?;
    if !(solution_weight.is_finite() && solution_weight > 0.0) {
        return Err(SoapError::invalid(format!(
            "solution weight must be positive, got {solution_weight}"
        )));
    }

    let lye = solution_weight * concentration / 100.0;
    Ok(LyeSolution {
        lye,
        water: solution_weight - lye,
    })
}

/// How to use a stock solution for one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterBatchLye {
    /// Solution to weigh out for the batch's lye
    pub solution_weight: f64,
    /// Water still to add on top; negative means the solution already carries too much
    pub additional_water: f64,
}

/// Replace a batch's lye and water with a stock solution of `concentration` percent
pub fn master_batch_lye(lye_mass: f64, water_mass: f64, concentration: f64) -> Result<MasterBatchLye> {
    validate_concentration(concentration)?;

    let solution_weight = lye_mass / (concentration / 100.0);
    let water_in_solution = solution_weight - lye_mass;

    Ok(MasterBatchLye {
        solution_weight,
        additional_water: water_mass - water_in_solution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate;
    use crate::models::{KOH_PER_NAOH, Recipe};

    fn registry() -> OilRegistry {
        let oil = |id: &str, sap: f64, hardness: f64, oleic: f64| OilEntry {
            id: id.to_string(),
            display_name: id.to_string(),
            sap_naoh: sap,
            sap_koh: sap * KOH_PER_NAOH,
            qualities: Qualities {
                hardness,
                ..Qualities::default()
            },
            fatty_acids: Some(FattyAcidProfile {
                oleic,
                ..FattyAcidProfile::default()
            }),
            price_per_unit: None,
        };
        OilRegistry::from_entries(vec![
            oil("Olive Oil", 0.134, 17.0, 69.0),
            oil("Coconut Oil", 0.183, 79.0, 8.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_blend_is_weighted_average() {
        let parts = vec![("Olive Oil".to_string(), 60.0), ("Coconut Oil".to_string(), 40.0)];
        let blend = blend_oils("Master Batch #1", &parts, &registry()).unwrap();

        assert!((blend.sap_naoh - (0.6 * 0.134 + 0.4 * 0.183)).abs() < 1e-12);
        assert!((blend.qualities.hardness - (0.6 * 17.0 + 0.4 * 79.0)).abs() < 1e-9);
        assert!((blend.fatty_acids.unwrap().oleic - (0.6 * 69.0 + 0.4 * 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_blend_calculates_like_its_parts() {
        let mut reg = registry();
        let parts = vec![("Olive Oil".to_string(), 60.0), ("Coconut Oil".to_string(), 40.0)];
        reg.add_custom(blend_oils("MB", &parts, &reg).unwrap()).unwrap();

        let separate = calculate(
            &Recipe::new("Separate").with_oil("Olive Oil", 600.0).with_oil("Coconut Oil", 400.0),
            &reg,
        )
        .unwrap();
        let blended = calculate(&Recipe::new("Blended").with_oil("MB", 1000.0), &reg).unwrap();

        assert!((separate.lye.total - blended.lye.total).abs() < 1e-9);
        assert!((separate.qualities.hardness - blended.qualities.hardness).abs() < 1e-9);
    }

    #[test]
    fn test_blend_validation() {
        let reg = registry();
        let short = vec![("Olive Oil".to_string(), 60.0)];
        assert!(matches!(blend_oils("X", &short, &reg), Err(SoapError::InvalidRatio(_))));

        let unknown = vec![("Olive Oil".to_string(), 50.0), ("Emu Oil".to_string(), 50.0)];
        assert!(matches!(blend_oils("X", &unknown, &reg), Err(SoapError::UnknownOil { .. })));

        assert!(matches!(blend_oils("X", &[], &reg), Err(SoapError::EmptyRecipe)));
    }

    #[test]
    fn test_lye_solution_mix() {
        let mix = lye_solution_mix(1000.0, 50.0).unwrap();
        assert_eq!(mix, LyeSolution { lye: 500.0, water: 500.0 });

        assert!(lye_solution_mix(1000.0, 0.0).is_err());
        assert!(lye_solution_mix(0.0, 50.0).is_err());
    }

    #[test]
    fn test_master_batch_lye() {
        let usage = master_batch_lye(150.0, 300.0, 50.0).unwrap();
        assert_eq!(usage.solution_weight, 300.0);
        assert_eq!(usage.additional_water, 150.0);

        // a weak solution brings more water than the recipe wants
        let weak = master_batch_lye(150.0, 100.0, 25.0).unwrap();
        assert!(weak.additional_water < 0.0);
    }
}
