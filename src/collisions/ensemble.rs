use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::collisions::aggregate::aggregate;
use crate::collisions::cache::{CacheKey, ScenarioCache};
use crate::collisions::types::{ScenarioDataset, ScenarioEnsembleResult};
use crate::error::CostError;
use crate::mode::{Mode, ModeProfiles, Policy, VehicleModeProfile};
use crate::record::preprocess;
use crate::tables::CostTables;

/// Preprocesses and aggregates every scenario independently, then averages.
///
/// # Errors
///
/// [`CostError::EmptyEnsemble`] when `scenarios` is empty,
/// [`CostError::DuplicateScenario`] when two scenarios share a name, or any
/// error from [`aggregate`].
pub fn run_ensemble(
    scenarios: &[ScenarioDataset],
    profile: &VehicleModeProfile,
    policy: Policy,
    tables: &CostTables,
) -> Result<ScenarioEnsembleResult, CostError> {
    if scenarios.is_empty() {
        return Err(CostError::EmptyEnsemble);
    }

    let mut scenario_results = BTreeMap::new();
    for scenario in scenarios {
        let records = preprocess(&scenario.rows, tables);
        let result = aggregate(&records, profile, policy)?;
        debug!(
            scenario = %scenario.name,
            rows = scenario.rows.len(),
            cost_per_pkm = result.cost_per_pkm,
            "Scenario aggregated"
        );
        if scenario_results
            .insert(scenario.name.clone(), result)
            .is_some()
        {
            return Err(CostError::DuplicateScenario(scenario.name.clone()));
        }
    }

    ScenarioEnsembleResult::from_scenarios(profile.mode, policy, scenario_results)
}

/// Runs scenario ensembles through a [`ScenarioCache`].
///
/// Scenario datasets are only loaded on a cache miss.
pub struct EnsembleRunner<'a> {
    tables: &'a CostTables,
    profiles: &'a ModeProfiles,
    cache: &'a dyn ScenarioCache,
}

impl<'a> EnsembleRunner<'a> {
    pub fn new(
        tables: &'a CostTables,
        profiles: &'a ModeProfiles,
        cache: &'a dyn ScenarioCache,
    ) -> Self {
        Self {
            tables,
            profiles,
            cache,
        }
    }

    #[tracing::instrument(skip(self, load), fields(mode = %mode, policy = %policy))]
    pub fn run<F>(&self, mode: Mode, policy: Policy, load: F) -> Result<ScenarioEnsembleResult, CostError>
    where
        F: FnOnce() -> Result<Vec<ScenarioDataset>, CostError>,
    {
        if !mode.supports_ensemble() {
            return Err(CostError::UnsupportedCombination {
                mode: mode.to_string(),
                policy: policy.to_string(),
            });
        }

        let key = CacheKey::new(mode, policy);
        if let Some(cached) = self.cache.load(&key) {
            info!(scenarios = cached.scenario_results.len(), "Using cached ensemble result");
            return Ok(cached);
        }

        let scenarios = load()?;
        info!(scenarios = scenarios.len(), "Computing scenario ensemble");

        let result = run_ensemble(&scenarios, self.profiles.get(mode), policy, self.tables)?;

        if let Err(e) = self.cache.store(&key, &result) {
            warn!(error = %e, "Failed to cache ensemble result");
        }

        Ok(result)
    }

    /// Drops the cached result so the next [`run`](Self::run) recomputes.
    pub fn invalidate(&self, mode: Mode, policy: Policy) -> Result<(), CostError> {
        self.cache.invalidate(&CacheKey::new(mode, policy))
    }
}
