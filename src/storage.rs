//! Recipe files: JSON on disk <-> `Recipe`
//!
//! The file layout is owned here; the rest of the crate only sees `Recipe`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SoapError};
use crate::models::{Additive, LyeType, Recipe, RecipeOilLine, WaterMode, WaterSetting};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OilLineFile {
    oil_id: String,
    weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdditiveFile {
    name: String,
    weight: f64,
    #[serde(default)]
    replaces_water: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_per_unit: Option<f64>,
}

/// On-disk recipe layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeFile {
    name: String,
    oils: Vec<OilLineFile>,
    #[serde(default)]
    lye_type: LyeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lye_split_percent: Option<f64>,
    superfat_percent: f64,
    water_mode: WaterMode,
    water_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    naoh_price_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    koh_price_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    water_price_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    additives: Vec<AdditiveFile>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified_date: Option<DateTime<Utc>>,
}

impl From<&Recipe> for RecipeFile {
    fn from(recipe: &Recipe) -> Self {
        RecipeFile {
            name: recipe.name.clone(),
            oils: recipe
                .oils
                .iter()
                .map(|line| OilLineFile {
                    oil_id: line.oil_id.clone(),
                    weight: line.weight,
                    price_per_unit: line.price_per_unit,
                })
                .collect(),
            lye_type: recipe.lye_type,
            lye_split_percent: recipe.lye_split_percent,
            superfat_percent: recipe.superfat_percent,
            water_mode: recipe.water.mode(),
            water_value: recipe.water.value(),
            batch_weight: recipe.batch_weight,
            naoh_price_per_unit: recipe.naoh_price_per_unit,
            koh_price_per_unit: recipe.koh_price_per_unit,
            water_price_per_unit: recipe.water_price_per_unit,
            additives: recipe
                .additives
                .iter()
                .map(|a| AdditiveFile {
                    name: a.name.clone(),
                    weight: a.weight,
                    replaces_water: a.replaces_water,
                    price_per_unit: a.price_per_unit,
                })
                .collect(),
            notes: recipe.notes.clone(),
            created_date: recipe.created_date,
            modified_date: recipe.modified_date,
        }
    }
}

impl From<RecipeFile> for Recipe {
    fn from(file: RecipeFile) -> Self {
        Recipe {
            name: file.name,
            oils: file
                .oils
                .into_iter()
                .map(|line| RecipeOilLine {
                    oil_id: line.oil_id,
                    weight: line.weight,
                    price_per_unit: line.price_per_unit,
                })
                .collect(),
            lye_type: file.lye_type,
            lye_split_percent: file.lye_split_percent,
            superfat_percent: file.superfat_percent,
            water: WaterSetting::from_parts(file.water_mode, file.water_value),
            batch_weight: file.batch_weight,
            naoh_price_per_unit: file.naoh_price_per_unit,
            koh_price_per_unit: file.koh_price_per_unit,
            water_price_per_unit: file.water_price_per_unit,
            additives: file
                .additives
                .into_iter()
                .map(|a| Additive {
                    name: a.name,
                    weight: a.weight,
                    replaces_water: a.replaces_water,
                    price_per_unit: a.price_per_unit,
                })
                .collect(),
            notes: file.notes,
            created_date: file.created_date,
            modified_date: file.modified_date,
        }
    }
}

pub fn recipe_to_json(recipe: &Recipe) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&RecipeFile::from(recipe))
}

pub fn recipe_from_json(json: &str) -> serde_json::Result<Recipe> {
    serde_json::from_str::<RecipeFile>(json).map(Recipe::from)
}

pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let json = fs::read_to_string(path).map_err(|e| SoapError::io(path, e))?;
    let recipe = recipe_from_json(&json).map_err(|e| SoapError::serialization(path, e))?;
    debug!("Loaded recipe '{}' from {}", recipe.name, path.display());
    Ok(recipe)
}

pub fn save_recipe(recipe: &Recipe, path: &Path) -> Result<()> {
    let json = recipe_to_json(recipe).map_err(|e| SoapError::serialization(path, e))?;
    fs::write(path, json).map_err(|e| SoapError::io(path, e))?;
    debug!("Saved recipe '{}' to {}", recipe.name, path.display());
    Ok(())
}

/// File stem for a recipe name: lower case, spaces to `_`, only `[a-z0-9_-]` kept
pub fn file_stem_for(name: &str) -> String {
    let stem: String = name
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if stem.is_empty() { "untitled".to_string() } else { stem }
}

/// A single file stem, with no path components
fn is_bare_stem(stem: &str) -> bool {
    !stem.is_empty() && stem != "." && stem != ".." && !stem.contains(['/', '\\'])
}

/// A directory of recipe files
#[derive(Debug, Clone)]
pub struct RecipeStore {
    dir: PathBuf,
}

/// A recipe found in the store
#[derive(Debug, Clone)]
pub struct StoredRecipe {
    pub stem: String,
    pub name: String,
    pub path: PathBuf,
    pub modified_date: Option<DateTime<Utc>>,
}

impl RecipeStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SoapError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem_for(name)))
    }

    /// Save under a file name derived from the recipe name and stamp its dates.
    ///
    /// Fails with `RecipeExists` when the file already holds a recipe with a
    /// different name; saving the same recipe again updates it.
    pub fn save(&self, recipe: &Recipe) -> Result<PathBuf> {
        self.write(recipe, false)
    }

    /// Like `save`, but overwrites whatever the file holds
    pub fn replace(&self, recipe: &Recipe) -> Result<PathBuf> {
        self.write(recipe, true)
    }

    fn write(&self, recipe: &Recipe, overwrite: bool) -> Result<PathBuf> {
        let path = self.path_for(&recipe.name);
        let mut stamped = recipe.clone();

        if path.exists() {
            match load_recipe(&path) {
                Ok(existing) if existing.name != recipe.name && !overwrite => {
                    return Err(SoapError::RecipeExists {
                        existing: existing.name,
                        path,
                    });
                }
                Ok(existing) if existing.name == recipe.name => {
                    stamped.created_date = stamped.created_date.or(existing.created_date);
                }
                Ok(existing) => {
                    warn!("Replacing recipe '{}' in {}", existing.name, path.display());
                }
                Err(e) => warn!("Overwriting unreadable {}: {}", path.display(), e),
            }
        }

        stamped.touch(Utc::now());
        save_recipe(&stamped, &path)?;
        Ok(path)
    }

    /// All readable recipes, sorted by recipe name. Broken files are skipped.
    pub fn list(&self) -> Result<Vec<StoredRecipe>> {
        let mut recipes = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match load_recipe(path) {
                Ok(recipe) => recipes.push(StoredRecipe {
                    stem: path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string(),
                    name: recipe.name,
                    path: path.to_path_buf(),
                    modified_date: recipe.modified_date,
                }),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recipes)
    }

    /// Delete a stored recipe by file stem or recipe name; returns false when it did not exist.
    ///
    /// An exact stem as shown by `list` wins over the name-derived file.
    pub fn delete(&self, stem: &str) -> Result<bool> {
        let exact = self.dir.join(format!("{stem}.json"));
        let path = if is_bare_stem(stem) && exact.is_file() {
            exact
        } else {
            self.path_for(stem)
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SoapError::io(&path, e)),
        }
    }
}
