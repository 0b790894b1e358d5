use soapcalc::additives::AdditiveSpec;
use soapcalc::costs::CostTable;
use soapcalc::models::{Additive, LyeType, WaterSetting};
use soapcalc::production::{ProductionCosts, bar_yield};
use soapcalc::storage::RecipeStore;
use soapcalc::units::WeightUnit;
use soapcalc::{
    AdditiveTable, OilRegistry, Recipe, ScaleTarget, SoapError, calculate, load_recipe, save_recipe, scale,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn castile_blend() -> Recipe {
    Recipe::new("Olive Coconut")
        .with_oil("Olive Oil", 700.0)
        .with_oil("Coconut Oil, 76 deg", 300.0)
}

#[test]
fn builtin_registry_calculates_a_blend() {
    let registry = OilRegistry::builtin().unwrap();
    assert!(registry.len() > 100);

    let result = calculate(&castile_blend(), &registry).unwrap();

    // (700 * 0.135 + 300 * 0.183) * 0.95
    assert!(close(result.lye.naoh, 141.93));
    assert!(close(result.water_required, 283.86));
    assert!(close(result.total_batch_weight, 1425.79));
    assert!(close(result.qualities.hardness, 0.7 * 17.0 + 0.3 * 79.0));
}

#[test]
fn saved_recipe_recalculates_identically() {
    let registry = OilRegistry::builtin().unwrap();
    let mut recipe = castile_blend()
        .with_oil("Castor Oil", 50.0)
        .with_superfat(7.0)
        .with_water(WaterSetting::Concentration(30.0));
    recipe.additives.push(Additive::new("Goat Milk", 100.0).replacing_water());
    recipe.notes = "Soap at room temperature".to_string();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("goat_milk.json");
    save_recipe(&recipe, &path).unwrap();
    let loaded = load_recipe(&path).unwrap();

    assert_eq!(loaded, recipe);
    assert_eq!(
        calculate(&loaded, &registry).unwrap(),
        calculate(&recipe, &registry).unwrap()
    );
}

#[test]
fn scaled_recipe_hits_batch_target() {
    let registry = OilRegistry::builtin().unwrap();
    let recipe = castile_blend().with_lye(LyeType::Koh);

    let scaled = scale(&recipe, &registry, ScaleTarget::BatchWeight(3000.0)).unwrap();
    let result = calculate(&scaled, &registry).unwrap();

    assert!((result.total_batch_weight - 3000.0).abs() < 1e-6);
    assert_eq!(scaled.batch_weight, Some(3000.0));

    // proportions survive scaling
    let before = recipe.oil_percentages();
    for ((id_a, pct_a), (id_b, pct_b)) in before.iter().zip(scaled.oil_percentages()) {
        assert_eq!(id_a, &id_b);
        assert!((pct_a - pct_b).abs() < 1e-9);
    }
}

#[test]
fn unknown_oils_are_reported_together() {
    let registry = OilRegistry::builtin().unwrap();
    let recipe = castile_blend()
        .with_oil("Dragon Fat", 100.0)
        .with_oil("Unicorn Butter", 100.0);

    match calculate(&recipe, &registry) {
        Err(SoapError::UnknownOil { ids }) => {
            assert_eq!(ids, vec!["Dragon Fat".to_string(), "Unicorn Butter".to_string()])
        }
        other => panic!("expected unknown oil error, got {other:?}"),
    }
}

#[test]
fn recipe_store_lists_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecipeStore::open(dir.path().join("recipes")).unwrap();

    store.save(&castile_blend()).unwrap();
    store.save(&Recipe::new("Bastille").with_oil("Olive Oil", 800.0)).unwrap();

    let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Bastille", "Olive Coconut"]);

    assert!(store.delete("olive_coconut").unwrap());
    assert!(!store.delete("olive_coconut").unwrap());
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn cost_table_prices_a_loaded_recipe() {
    let registry = OilRegistry::builtin().unwrap();
    let mut costs = CostTable::new();
    costs.set_cost("Olive Oil", 10.0, 1.0, "kg").unwrap();
    costs.set_cost("Coconut Oil, 76 deg", 6.0, 1.0, "kg").unwrap();

    let priced = costs.apply_to(&castile_blend());
    let cost = calculate(&priced, &registry).unwrap().cost.unwrap();

    assert!(close(cost.oils, 7.0 + 1.8));
    assert!(cost.unpriced_oils.is_empty());
}

#[test]
fn dual_lye_recipe_is_costed_per_lye() {
    let registry = OilRegistry::builtin().unwrap();
    let mut costs = CostTable::new();
    costs.set_cost("Olive Oil", 10.0, 1.0, "kg").unwrap();
    costs.set_cost("NaOH", 5.0, 1.0, "kg").unwrap();
    costs.set_cost("KOH", 8.0, 1.0, "kg").unwrap();

    let mut recipe = Recipe::new("Dual").with_oil("Olive Oil", 1000.0).with_lye(LyeType::Dual);
    recipe.lye_split_percent = Some(50.0);

    let result = calculate(&costs.apply_to(&recipe), &registry).unwrap();
    let cost = result.cost.unwrap();

    // 1000 g at 0.135 / 0.19 SAP, 5 % superfat, half each
    assert!(close(result.lye.naoh, 64.125));
    assert!(close(result.lye.koh, 90.25));
    assert!((cost.lye - (64.125 * 0.005 + 90.25 * 0.008)).abs() < 1e-9);
    assert!(cost.unpriced_lye.is_empty());
    assert!((cost.total - (10.0 + cost.lye)).abs() < 1e-9);
}

#[test]
fn additives_resolved_from_table() {
    let registry = OilRegistry::builtin().unwrap();
    let table = AdditiveTable::builtin().unwrap();
    let mut recipe = castile_blend();
    let total_oil = recipe.total_oil_weight();

    for raw in ["Sodium Lactate", "Goat Milk (Liquid)=100g", "Fragrance / Essential Oil=0.7oz/lb"] {
        let spec = AdditiveSpec::parse(raw, WeightUnit::Grams).unwrap();
        recipe.set_additive(table.resolve(&spec, total_oil).unwrap());
    }
    let plain = calculate(&castile_blend(), &registry).unwrap();
    let result = calculate(&recipe, &registry).unwrap();

    assert!(close(recipe.additives[0].weight, 30.0));
    assert!((result.water_mass - (plain.water_mass - 100.0)).abs() < 1e-9);
    assert!(close(result.additive_weight, recipe.additive_weight()));

    // the water flag is stored with the recipe
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("milk.json");
    save_recipe(&recipe, &path).unwrap();
    assert!(load_recipe(&path).unwrap().additives[1].replaces_water);
}

#[test]
fn yield_and_pricing_for_a_priced_batch() {
    let registry = OilRegistry::builtin().unwrap();
    let mut costs = CostTable::new();
    costs.set_cost("Olive Oil", 10.0, 1.0, "kg").unwrap();
    costs.set_cost("Coconut Oil, 76 deg", 6.0, 1.0, "kg").unwrap();
    costs.set_cost("NaOH", 5.0, 1.0, "kg").unwrap();

    let result = calculate(&costs.apply_to(&castile_blend()), &registry).unwrap();
    let estimate = bar_yield(&result, 100.0).unwrap();
    assert!(close(estimate.bars, 14.2579));

    let material = result.cost.as_ref().unwrap().total;
    let pricing = ProductionCosts::default().price(material, estimate.bars).unwrap();
    assert!((pricing.cogs_per_bar * estimate.bars - pricing.total_cogs).abs() < 1e-9);
    assert!(pricing.retail_price > pricing.cogs_per_bar);
}
