//! Error type shared by the loaders, the aggregator and the ensemble runner.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CostError {
    #[error("Accident dataset '{name}' not found at {path}")]
    MissingDataset { name: String, path: PathBuf },
    #[error("Dataset '{dataset}' is missing required columns: {columns:?}")]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),
    #[error("Unsupported policy: {0}")]
    UnsupportedPolicy(String),
    #[error("Mode '{mode}' is not supported with policy '{policy}' for scenario ensembles")]
    UnsupportedCombination { mode: String, policy: String },
    #[error("Mode '{0}' has zero combined annual mileage")]
    ZeroMileage(String),
    #[error("Mode '{mode}' has a non-positive occupancy rate: {occupancy_rate}")]
    InvalidOccupancy { mode: String, occupancy_rate: f64 },
    #[error("Fleet mileage for {0} cannot be split into private and shared shares")]
    InvalidFleet(String),
    #[error("Scenario ensemble is empty")]
    EmptyEnsemble,
    #[error("Scenario name '{0}' appears more than once in the ensemble")]
    DuplicateScenario(String),
    #[error("Failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CostError::Io {
            path: path.into(),
            source,
        }
    }
}
