//! Soap recipe calculator
//!
//! Turns a list of oils plus superfat, lye and water settings into lye and
//! water amounts and soap quality scores, scales recipes, and reads/writes
//! recipe files.

pub mod additives;
pub mod calculator;
pub mod config;
pub mod costs;
pub mod error;
pub mod master_batch;
pub mod models;
pub mod oils;
pub mod production;
pub mod scaling;
pub mod storage;
pub mod units;

pub use additives::AdditiveTable;
pub use calculator::calculate;
pub use error::{Result, SoapError};
pub use models::{CalculationResult, LyeType, OilEntry, Recipe, RecipeOilLine, WaterSetting};
pub use oils::OilRegistry;
pub use scaling::{ScaleTarget, scale};
pub use storage::{load_recipe, save_recipe};
