//! Soap Recipe Calculator
//!
//! Command line front end for the soapcalc library.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use soapcalc::additives::{AdditiveInfo, AdditiveSpec, AdditiveTable};
use soapcalc::calculator::{self, Report};
use soapcalc::config::Settings;
use soapcalc::costs::CostTable;
use soapcalc::master_batch;
use soapcalc::models::{CalculationResult, LyeType, Recipe, WaterSetting};
use soapcalc::oils::OilRegistry;
use soapcalc::production;
use soapcalc::scaling::{self, ScaleTarget};
use soapcalc::storage::{self, RecipeStore};
use soapcalc::units::{OilAmount, OilSpec, WeightUnit, parse_weight};

#[derive(Parser)]
#[command(name = "soapcalc")]
#[command(about = "Lye, water and soap quality calculator for soap recipes")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, env = "SOAPCALC_CONFIG", default_value = "soapcalc.json")]
    config: PathBuf,

    /// Oil database; the built-in table is used when omitted
    #[arg(long, env = "SOAPCALC_OILS")]
    oils: Option<PathBuf>,

    /// Custom oils file
    #[arg(long, env = "SOAPCALC_CUSTOM_OILS")]
    custom_oils: Option<PathBuf>,

    /// Custom additives file
    #[arg(long, env = "SOAPCALC_CUSTOM_ADDITIVES")]
    custom_additives: Option<PathBuf>,

    /// Directory holding saved recipes
    #[arg(long, env = "SOAPCALC_RECIPES")]
    recipes_dir: Option<PathBuf>,

    /// Ingredient cost table
    #[arg(long, env = "SOAPCALC_COSTS")]
    costs: Option<PathBuf>,

    /// Weight unit for output and bare numbers (g, oz, lb, kg)
    #[arg(short, long)]
    unit: Option<WeightUnit>,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Bar yield and production pricing options
#[derive(Args)]
struct YieldArgs {
    /// Estimate bars, cost per bar and production pricing
    #[arg(long = "yield")]
    show_yield: bool,

    /// Bar weight, e.g. 4.5oz; implies --yield
    #[arg(long)]
    bar_weight: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate lye, water and qualities for a recipe file
    Calc {
        recipe: PathBuf,

        /// Show per-oil lye and the fatty acid profile
        #[arg(short, long)]
        verbose: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Fill missing prices from the cost table
        #[arg(long)]
        price: bool,

        /// Concentration of a stock lye solution to use instead of dry lye
        #[arg(long = "master-batch")]
        stock_concentration: Option<f64>,

        #[command(flatten)]
        yield_args: YieldArgs,
    },

    /// Build a recipe from the command line and calculate it
    Quick {
        /// Oil as NAME=AMOUNT, e.g. "Olive Oil=500g" or "Olive Oil=70%"
        #[arg(short, long = "oil", required = true)]
        oils: Vec<String>,

        /// Total oil weight, required when oils are given in percent
        #[arg(long)]
        total: Option<String>,

        #[arg(long, default_value = "Quick Recipe")]
        name: String,

        /// Superfat percent
        #[arg(long)]
        superfat: Option<f64>,

        /// NaOH, KOH, "90% KOH" or dual
        #[arg(long)]
        lye: Option<LyeType>,

        /// Percent NaOH for dual lye recipes
        #[arg(long)]
        split: Option<f64>,

        /// Water as a multiple of the lye weight
        #[arg(long, conflicts_with_all = ["water_percent", "concentration"])]
        water_ratio: Option<f64>,

        /// Water as percent of the oil weight
        #[arg(long, conflicts_with = "concentration")]
        water_percent: Option<f64>,

        /// Lye concentration percent
        #[arg(long)]
        concentration: Option<f64>,

        /// Additive as NAME, NAME=WEIGHT or NAME=RATE (3%, 0.7oz/lb, 30g/kg);
        /// a bare name uses the additive's usual rate
        #[arg(short, long = "additive")]
        additives: Vec<String>,

        /// Save the recipe to the recipes directory
        #[arg(long)]
        save: bool,

        /// Overwrite a different recipe stored under the same file name
        #[arg(long, requires = "save")]
        force: bool,

        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        yield_args: YieldArgs,
    },

    /// Scale a recipe to a new oil or batch weight
    Scale {
        recipe: PathBuf,

        /// New total oil weight, e.g. 2kg
        #[arg(long, conflicts_with = "batch_weight", required_unless_present = "batch_weight")]
        oil_weight: Option<String>,

        /// New total batch weight (oils, lye, water and additives)
        #[arg(long)]
        batch_weight: Option<String>,

        /// Where to write the scaled recipe; printed only when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List oils
    Oils {
        /// Only custom oils
        #[arg(long)]
        custom: bool,
    },

    /// Show details for one oil
    Oil { id: String },

    /// List known additives
    Additives,

    /// Add or update a custom additive
    AdditiveAdd {
        name: String,

        /// Subtract this additive from the water
        #[arg(long)]
        replaces_water: bool,

        /// Usual amount in percent of the oil weight
        #[arg(long, default_value = "0")]
        percent: f64,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List saved recipes
    Recipes,

    /// Delete a saved recipe
    Delete { name: String },

    /// Save a blend of oils as a custom oil
    Blend {
        #[arg(long)]
        name: String,

        /// Oil share as NAME=PERCENT, e.g. "Olive Oil=60%"
        #[arg(short, long = "oil", required = true)]
        oils: Vec<String>,
    },

    /// Lye and water needed for a stock lye solution
    LyeSolution {
        /// Total solution weight, e.g. 1000g
        #[arg(long)]
        weight: String,

        /// Lye concentration percent
        #[arg(long, default_value = "50")]
        concentration: f64,
    },

    /// Manage ingredient costs
    Cost {
        #[command(subcommand)]
        action: CostAction,
    },
}

#[derive(Subcommand)]
enum CostAction {
    /// Set the purchase price of an ingredient
    Set {
        name: String,
        price: f64,
        quantity: f64,
        unit: String,
    },

    /// Add stock at a new price (weighted average)
    Add {
        name: String,
        price: f64,
        quantity: f64,
        unit: String,
    },

    /// Show the cost table
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(Some(&cli.config))
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    if let Some(path) = cli.oils {
        settings.paths.oils = Some(path);
    }
    if let Some(path) = cli.custom_oils {
        settings.paths.custom_oils = path;
    }
    if let Some(path) = cli.custom_additives {
        settings.paths.custom_additives = path;
    }
    if let Some(dir) = cli.recipes_dir {
        settings.paths.recipes_dir = dir;
    }
    if let Some(path) = cli.costs {
        settings.paths.costs = path;
    }
    if let Some(unit) = cli.unit {
        settings.unit = unit;
    }

    let mut registry = load_registry(&settings)?;
    let mut additive_table = load_additives(&settings)?;
    let unit = settings.unit;

    match cli.command {
        Commands::Calc {
            recipe,
            verbose,
            json,
            price,
            stock_concentration,
            yield_args,
        } => {
            let mut loaded = storage::load_recipe(&recipe)
                .with_context(|| format!("Failed to load recipe {}", recipe.display()))?;
            loaded = additive_table.mark_water_replacements(&loaded);
            if price {
                let costs = CostTable::load(&settings.paths.costs)?;
                loaded = costs.apply_to(&loaded);
            }

            let result = calculator::calculate(&loaded, &registry)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!(
                    "{}",
                    Report {
                        recipe: &loaded,
                        result: &result,
                        unit,
                        verbose,
                    }
                );
            }

            if let Some(concentration) = stock_concentration {
                let usage = master_batch::master_batch_lye(
                    result.lye.total,
                    result.water_mass,
                    concentration,
                )?;
                println!("\nUsing {concentration}% lye solution:");
                println!(
                    "  Solution:         {:.1} {}",
                    unit.from_grams(usage.solution_weight),
                    unit
                );
                if usage.additional_water >= 0.0 {
                    println!(
                        "  Additional water: {:.1} {}",
                        unit.from_grams(usage.additional_water),
                        unit
                    );
                } else {
                    println!(
                        "  Solution carries {:.1} {} more water than the recipe calls for",
                        unit.from_grams(-usage.additional_water),
                        unit
                    );
                }
            }

            print_yield(&result, &yield_args, &settings)?;
        }

        Commands::Quick {
            oils,
            total,
            name,
            superfat,
            lye,
            split,
            water_ratio,
            water_percent,
            concentration,
            additives,
            save,
            force,
            verbose,
            yield_args,
        } => {
            let total = total.map(|t| parse_weight(&t, unit)).transpose()?;
            let mut recipe = recipe_from_specs(&name, &oils, total, unit)?;

            let defaults = &settings.defaults;
            recipe.superfat_percent = superfat.unwrap_or(defaults.superfat_percent);
            recipe.lye_type = lye.unwrap_or(defaults.lye_type);
            recipe.lye_split_percent = split;
            recipe.water = match (water_ratio, water_percent, concentration) {
                (Some(r), _, _) => WaterSetting::Ratio(r),
                (_, Some(p), _) => WaterSetting::PercentOfOils(p),
                (_, _, Some(c)) => WaterSetting::Concentration(c),
                _ => defaults.water(),
            };

            let total_oil = recipe.total_oil_weight();
            for raw in &additives {
                let spec = AdditiveSpec::parse(raw, unit)?;
                recipe.set_additive(additive_table.resolve(&spec, total_oil)?);
            }

            let result = calculator::calculate(&recipe, &registry)?;
            print!(
                "{}",
                Report {
                    recipe: &recipe,
                    result: &result,
                    unit,
                    verbose,
                }
            );

            print_yield(&result, &yield_args, &settings)?;

            if save {
                let store = RecipeStore::open(&settings.paths.recipes_dir)?;
                let path = if force {
                    store.replace(&recipe)?
                } else {
                    store.save(&recipe).context("Use --force to overwrite it")?
                };
                println!("\nSaved to {}", path.display());
            }
        }

        Commands::Scale {
            recipe,
            oil_weight,
            batch_weight,
            output,
        } => {
            let loaded = storage::load_recipe(&recipe)
                .with_context(|| format!("Failed to load recipe {}", recipe.display()))?;

            let target = match (oil_weight, batch_weight) {
                (Some(w), _) => ScaleTarget::OilWeight(parse_weight(&w, unit)?),
                (None, Some(w)) => ScaleTarget::BatchWeight(parse_weight(&w, unit)?),
                (None, None) => bail!("Give either --oil-weight or --batch-weight"),
            };

            let scaled = scaling::scale(&loaded, &registry, target)?;
            let result = calculator::calculate(&scaled, &registry)?;

            match output {
                Some(path) => {
                    storage::save_recipe(&scaled, &path)?;
                    info!("Scaled recipe written to {}", path.display());
                }
                None => print!(
                    "{}",
                    Report {
                        recipe: &scaled,
                        result: &result,
                        unit,
                        verbose: false,
                    }
                ),
            }
        }

        Commands::Oils { custom } => {
            println!(
                "{:<44} {:>8} {:>8} {:>6} {:>6}",
                "Oil", "NaOH", "KOH", "Iodine", "INS"
            );
            println!("{}", "-".repeat(76));
            for oil in registry.list_oils() {
                if custom && !registry.is_custom(&oil.id) {
                    continue;
                }
                println!(
                    "{:<44} {:>8.3} {:>8.3} {:>6.0} {:>6.0}",
                    oil.display_name, oil.sap_naoh, oil.sap_koh, oil.qualities.iodine, oil.qualities.ins
                );
            }
        }

        Commands::Oil { id } => {
            let oil = registry.lookup(&id)?;
            println!("Oil: {}", oil.display_name);
            println!("  ID: {}", oil.id);
            if registry.is_custom(&oil.id) {
                println!("  (custom)");
            }
            println!("  SAP NaOH: {}", oil.sap_naoh);
            println!("  SAP KOH:  {}", oil.sap_koh);
            for (label, value, _) in oil.qualities.rows() {
                println!("  {label}: {value}");
            }
            if let Some(fa) = &oil.fatty_acids {
                println!("  Fatty acids:");
                for (label, value) in fa.rows() {
                    if value > 0.0 {
                        println!("    {label}: {value}%");
                    }
                }
            }
            if let Some(price) = oil.price_per_unit {
                println!("  Price: {price} per g");
            }
        }

        Commands::Additives => {
            println!("{:<28} {:>8} {:>8}  {}", "Additive", "Usual", "Water", "Description");
            println!("{}", "-".repeat(76));
            for info in additive_table.iter() {
                let usual = if info.default_percent_of_oils > 0.0 {
                    format!("{}%", info.default_percent_of_oils)
                } else {
                    "-".to_string()
                };
                let water = if info.is_water_replacement { "replaces" } else { "" };
                println!("{:<28} {:>8} {:>8}  {}", info.name, usual, water, info.description);
            }
        }

        Commands::AdditiveAdd {
            name,
            replaces_water,
            percent,
            description,
        } => {
            additive_table.insert(AdditiveInfo {
                name: name.clone(),
                description,
                is_water_replacement: replaces_water,
                default_percent_of_oils: percent,
            })?;
            additive_table.save_file(&settings.paths.custom_additives)?;
            println!(
                "Saved '{}' to {}",
                name,
                settings.paths.custom_additives.display()
            );
        }

        Commands::Recipes => {
            let store = RecipeStore::open(&settings.paths.recipes_dir)?;
            let recipes = store.list()?;
            if recipes.is_empty() {
                println!("No recipes in {}", store.dir().display());
            } else {
                for r in recipes {
                    let modified = r
                        .modified_date
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("  {:<32} {:<16} {}", r.name, modified, r.path.display());
                }
            }
        }

        Commands::Delete { name } => {
            let store = RecipeStore::open(&settings.paths.recipes_dir)?;
            if store.delete(&name)? {
                println!("Deleted '{}'", name);
            } else {
                println!("Recipe '{}' not found", name);
            }
        }

        Commands::Blend { name, oils } => {
            let mut parts = Vec::with_capacity(oils.len());
            for raw in &oils {
                match OilSpec::parse(raw, unit)? {
                    OilSpec {
                        oil_id,
                        amount: OilAmount::Percent(pct),
                    } => parts.push((oil_id, pct)),
                    _ => bail!("Blend shares must be percentages: '{}'", raw),
                }
            }

            let blend = master_batch::blend_oils(&name, &parts, &registry)?;
            registry.add_custom(blend)?;
            registry.save_custom_file(&settings.paths.custom_oils)?;
            println!(
                "Saved '{}' to {}",
                name,
                settings.paths.custom_oils.display()
            );
        }

        Commands::LyeSolution {
            weight,
            concentration,
        } => {
            let mix = master_batch::lye_solution_mix(parse_weight(&weight, unit)?, concentration)?;
            println!("Mix:");
            println!("  {:.1} {} lye", unit.from_grams(mix.lye), unit);
            println!("  {:.1} {} water", unit.from_grams(mix.water), unit);
        }

        Commands::Cost { action } => {
            let path = &settings.paths.costs;
            let mut costs = CostTable::load(path)?;
            match action {
                CostAction::Set {
                    name,
                    price,
                    quantity,
                    unit,
                } => {
                    costs.set_cost(&name, price, quantity, &unit)?;
                    costs.save(path)?;
                }
                CostAction::Add {
                    name,
                    price,
                    quantity,
                    unit,
                } => {
                    costs.add_stock(&name, price, quantity, &unit)?;
                    costs.save(path)?;
                }
                CostAction::Show => {
                    for (name, purchase) in costs.iter() {
                        let per_gram = purchase
                            .cost_per_gram()
                            .map(|c| format!("{c:.4}/g"))
                            .unwrap_or_else(|_| "?".to_string());
                        println!(
                            "  {:<32} {:>8.2} for {} {} ({})",
                            name, purchase.price, purchase.quantity, purchase.unit, per_gram
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Oil database plus custom oils, built once per run
fn load_registry(settings: &Settings) -> Result<OilRegistry> {
    let mut registry = match &settings.paths.oils {
        Some(path) => OilRegistry::from_file(path)
            .with_context(|| format!("Failed to load oil database {}", path.display()))?,
        None => OilRegistry::builtin()?,
    };

    let custom = registry
        .merge_custom_file(&settings.paths.custom_oils)
        .with_context(|| {
            format!(
                "Failed to load custom oils from {}",
                settings.paths.custom_oils.display()
            )
        })?;
    debug!("{} oils available ({} custom)", registry.len(), custom);

    Ok(registry)
}

/// Built-in additives plus the user's own
fn load_additives(settings: &Settings) -> Result<AdditiveTable> {
    let mut table = AdditiveTable::builtin()?;
    table
        .merge_file(&settings.paths.custom_additives)
        .with_context(|| {
            format!(
                "Failed to load custom additives from {}",
                settings.paths.custom_additives.display()
            )
        })?;
    Ok(table)
}

/// Bars, cost per bar and production pricing, when asked for
fn print_yield(result: &CalculationResult, args: &YieldArgs, settings: &Settings) -> Result<()> {
    if !args.show_yield && args.bar_weight.is_none() {
        return Ok(());
    }

    let unit = settings.unit;
    let bar_weight = match &args.bar_weight {
        Some(raw) => parse_weight(raw, unit)?,
        None => settings.defaults.bar_weight,
    };
    let estimate = production::bar_yield(result, bar_weight)?;

    println!("\nYield:");
    println!(
        "  {:.1} bars of {:.2} {}",
        estimate.bars,
        unit.from_grams(bar_weight),
        unit
    );

    let (Some(cost), Some(per_bar)) = (&result.cost, estimate.cost_per_bar) else {
        return Ok(());
    };
    println!("  Materials per bar: {:.2}", per_bar);

    let pricing = settings.production.price(cost.total, estimate.bars)?;
    println!("\nProduction:");
    println!("  Labor:           {:.2}", pricing.labor_cost);
    println!("  Batch cost:      {:.2}", pricing.batch_cost);
    println!("  Packaging:       {:.2}", pricing.packaging_cost);
    println!("  Total COGS:      {:.2}", pricing.total_cogs);
    println!("  COGS per bar:    {:.2}", pricing.cogs_per_bar);
    println!("  Retail price:    {:.2}", pricing.retail_price);
    println!("  Wholesale price: {:.2}", pricing.wholesale_price);
    println!("  Profit / batch:  {:.2}", pricing.profit_per_batch);
    Ok(())
}

/// Turn NAME=AMOUNT arguments into a recipe; all weights or all percentages
fn recipe_from_specs(
    name: &str,
    specs: &[String],
    total: Option<f64>,
    unit: WeightUnit,
) -> Result<Recipe> {
    let parsed = specs
        .iter()
        .map(|s| OilSpec::parse(s, unit))
        .collect::<soapcalc::Result<Vec<_>>>()?;

    let percentages: Vec<(String, f64)> = parsed
        .iter()
        .filter_map(|spec| match spec.amount {
            OilAmount::Percent(pct) => Some((spec.oil_id.clone(), pct)),
            OilAmount::Grams(_) => None,
        })
        .collect();

    if percentages.is_empty() {
        let mut recipe = Recipe::new(name);
        for spec in parsed {
            if let OilAmount::Grams(grams) = spec.amount {
                recipe.set_oil(spec.oil_id, grams);
            }
        }
        return Ok(recipe);
    }

    if percentages.len() != parsed.len() {
        bail!("Give every oil as a weight or every oil as a percentage, not a mix");
    }
    let Some(total) = total else {
        bail!("--total is required when oils are given in percent");
    };
    Ok(Recipe::from_percentages(name, total, &percentages)?)
}
