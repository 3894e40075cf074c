use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::CostError;
use crate::mode::{FleetMileage, ModeProfiles, OccupancyRates};
use crate::tables::{Code, CostTables};

/// Study constants for one run.
///
/// Stored as a JSON object on disk; every field may be omitted and falls
/// back to the built-in values:
/// ```json
/// {
///   "bicycle_fleet": { "private": 1103210000.0, "shared": 1487992.064, "shared_citywide": 2066574.21 },
///   "pedelec_codes": ["3.0", "72.0"],
///   "fallback_accidents": "csv/accidents_dummy_processed.csv"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub bicycle_fleet: FleetMileage,
    pub pedelec_fleet: FleetMileage,
    pub occupancy: OccupancyRates,
    pub tables: CostTables,
    pub bicycle_codes: BTreeSet<Code>,
    pub pedelec_codes: BTreeSet<Code>,
    /// Loaded instead of the primary accident table when that is missing.
    pub fallback_accidents: Option<PathBuf>,
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig {
            bicycle_fleet: FleetMileage {
                private: 1_103_210_000.0,
                shared: 1_487_992.064,
                shared_citywide: 2_066_574.21,
            },
            pedelec_fleet: FleetMileage {
                private: 28_290_000.0,
                shared: 200_096.408,
                shared_citywide: 299_626.408,
            },
            occupancy: OccupancyRates::default(),
            tables: CostTables::default(),
            bicycle_codes: [Code::numeric(71.0)].into_iter().collect(),
            pedelec_codes: [Code::numeric(3.0), Code::numeric(72.0)]
                .into_iter()
                .collect(),
            fallback_accidents: None,
        }
    }
}

impl CostConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {path}"))?;
        let config: CostConfig =
            serde_json::from_str(&content).with_context(|| format!("parsing config {path}"))?;
        Ok(config)
    }

    /// Loads from `path`, else from `COST_CONFIG_PATH`, else the defaults.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path
            .map(str::to_string)
            .or_else(|| std::env::var("COST_CONFIG_PATH").ok())
        {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn mode_profiles(&self) -> Result<ModeProfiles, CostError> {
        ModeProfiles::build(
            &self.bicycle_fleet,
            &self.pedelec_fleet,
            &self.occupancy,
            &self.bicycle_codes,
            &self.pedelec_codes,
        )
    }
}
