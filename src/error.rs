//! Error type shared by the registry, engines and file adapters

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SoapError>;

#[derive(Debug, Error)]
pub enum SoapError {
    /// One or more oil ids in a recipe are not in the registry
    #[error("unknown oil(s): {}", ids.join(", "))]
    UnknownOil { ids: Vec<String> },

    #[error("recipe has no oils")]
    EmptyRecipe,

    /// A numeric input is outside its domain (superfat >= 100, concentration <= 0, ...)
    #[error("invalid value: {0}")]
    InvalidRatio(String),

    #[error("invalid scale target {0}: must be a positive number")]
    InvalidScale(f64),

    #[error("invalid oil '{id}': {reason}")]
    InvalidOil { id: String, reason: String },

    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),

    /// Saving would overwrite a differently named recipe that maps to the same file
    #[error("{} already holds recipe '{existing}'", path.display())]
    RecipeExists { existing: String, path: PathBuf },

    #[error("malformed file {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SoapError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRatio(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}
