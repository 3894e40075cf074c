//! Data types used by the collision cost pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collisions::utility::{mean, stddev};
use crate::costs::{CostCategory, CostResult};
use crate::error::CostError;
use crate::mode::{Mode, Policy};
use crate::record::RawAccidentRow;

/// One alternative accident table, e.g. a simulated infrastructure change.
#[derive(Debug, Clone, Default)]
pub struct ScenarioDataset {
    pub name: String,
    pub rows: Vec<RawAccidentRow>,
}

/// Mean collision cost over a scenario ensemble, with the per-scenario
/// results kept for distributional reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEnsembleResult {
    pub mode: Mode,
    pub policy: Policy,
    pub computed_at: DateTime<Utc>,
    pub result: CostResult,
    pub scenario_results: BTreeMap<String, CostResult>,
}

impl ScenarioEnsembleResult {
    /// Averages per-scenario results. An empty collection has no mean.
    pub fn from_scenarios(
        mode: Mode,
        policy: Policy,
        scenario_results: BTreeMap<String, CostResult>,
    ) -> Result<Self, CostError> {
        let column = |f: fn(&CostResult) -> f64| -> Result<f64, CostError> {
            let values: Vec<f64> = scenario_results.values().map(f).collect();
            mean(&values).ok_or(CostError::EmptyEnsemble)
        };

        let result = CostResult {
            cost_per_vkm: column(|r| r.cost_per_vkm)?,
            cost_per_pkm: column(|r| r.cost_per_pkm)?,
            cost_per_year: column(|r| r.cost_per_year)?,
        };

        Ok(ScenarioEnsembleResult {
            mode,
            policy,
            computed_at: Utc::now(),
            result,
            scenario_results,
        })
    }

    /// Spread of `cost per pkm` across scenarios. `None` without scenarios.
    pub fn summary(&self) -> Option<DistributionSummary> {
        let values: Vec<f64> = self
            .scenario_results
            .values()
            .map(|r| r.cost_per_pkm)
            .collect();
        let avg = mean(&values)?;

        Some(DistributionSummary {
            count: values.len(),
            mean: avg,
            stddev: stddev(&values, avg),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl CostCategory for ScenarioEnsembleResult {
    fn tag(&self) -> &str {
        "Collisions"
    }

    fn calc_costs(&self) -> Result<CostResult, CostError> {
        Ok(self.result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}
