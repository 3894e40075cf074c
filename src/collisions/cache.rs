//! Persistence of ensemble results keyed by mode and policy.
//!
//! [`ScenarioCache`] is the port the [`EnsembleRunner`](super::ensemble::EnsembleRunner)
//! consults before recomputing. [`JsonFileCache`] stores one JSON file per key,
//! [`MemoryCache`] keeps results for the lifetime of the process, and
//! [`NoCache`] always misses.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::collisions::types::ScenarioEnsembleResult;
use crate::error::CostError;
use crate::mode::{Mode, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mode: Mode,
    pub policy: Policy,
}

impl CacheKey {
    pub fn new(mode: Mode, policy: Policy) -> Self {
        Self { mode, policy }
    }

    pub fn file_name(&self) -> String {
        format!("infrastructure_results_{}_{}.json", self.mode, self.policy)
    }

    fn matches(&self, result: &ScenarioEnsembleResult) -> bool {
        result.mode == self.mode && result.policy == self.policy
    }
}

pub trait ScenarioCache {
    /// Returns a previously stored result. Any failure to read is a miss.
    fn load(&self, key: &CacheKey) -> Option<ScenarioEnsembleResult>;

    fn store(&self, key: &CacheKey, result: &ScenarioEnsembleResult) -> Result<(), CostError>;

    /// Drops the entry for `key`, if any.
    fn invalidate(&self, key: &CacheKey) -> Result<(), CostError>;
}

pub struct NoCache;

impl ScenarioCache for NoCache {
    fn load(&self, _key: &CacheKey) -> Option<ScenarioEnsembleResult> {
        None
    }

    fn store(&self, _key: &CacheKey, _result: &ScenarioEnsembleResult) -> Result<(), CostError> {
        Ok(())
    }

    fn invalidate(&self, _key: &CacheKey) -> Result<(), CostError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<CacheKey, ScenarioEnsembleResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ScenarioCache for MemoryCache {
    fn load(&self, key: &CacheKey) -> Option<ScenarioEnsembleResult> {
        self.entries.borrow().get(key).cloned()
    }

    fn store(&self, key: &CacheKey, result: &ScenarioEnsembleResult) -> Result<(), CostError> {
        self.entries.borrow_mut().insert(*key, result.clone());
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CostError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Stores each key as `infrastructure_results_{mode}_{policy}.json` in `dir`.
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ScenarioCache for JsonFileCache {
    fn load(&self, key: &CacheKey) -> Option<ScenarioEnsembleResult> {
        let path = self.path(key);
        if !path.exists() {
            debug!(path = %path.display(), "No cached ensemble result");
            return None;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| CostError::io(&path, e))
            .and_then(|content| {
                serde_json::from_str::<ScenarioEnsembleResult>(&content).map_err(CostError::from)
            });

        match parsed {
            Ok(result) if result.scenario_results.is_empty() => {
                warn!(path = %path.display(), "Cached ensemble result has no scenarios, ignoring");
                None
            }
            Ok(result) if key.matches(&result) => {
                info!(path = %path.display(), "Loaded cached ensemble result");
                Some(result)
            }
            Ok(_) => {
                warn!(path = %path.display(), "Cached ensemble result belongs to another key, ignoring");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache entry, recomputing");
                None
            }
        }
    }

    fn store(&self, key: &CacheKey, result: &ScenarioEnsembleResult) -> Result<(), CostError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CostError::io(&self.dir, e))?;
        let path = self.path(key);
        let body = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, body).map_err(|e| CostError::io(&path, e))?;
        info!(path = %path.display(), "Stored ensemble result");
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CostError> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| CostError::io(&path, e))?;
            info!(path = %path.display(), "Invalidated cached ensemble result");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CostResult;
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn sample(mode: Mode, policy: Policy) -> ScenarioEnsembleResult {
        let scenarios: BTreeMap<String, CostResult> = [(
            "CSV_1".to_string(),
            CostResult {
                cost_per_vkm: 1.0,
                cost_per_pkm: 1.0,
                cost_per_year: 100.0,
            },
        )]
        .into_iter()
        .collect();
        ScenarioEnsembleResult::from_scenarios(mode, policy, scenarios).unwrap()
    }

    #[test]
    fn test_file_name() {
        let key = CacheKey::new(Mode::AllBicycle, Policy::DamagePotential);
        assert_eq!(
            key.file_name(),
            "infrastructure_results_all_bicycle_damage_potential.json"
        );
    }

    #[test]
    fn test_json_cache_round_trip_and_invalidate() {
        let dir = temp_dir("micromobility_costs_test_cache_round_trip");
        let _ = fs::remove_dir_all(&dir);
        let cache = JsonFileCache::new(&dir);
        let key = CacheKey::new(Mode::AllPedelec, Policy::CauserPays);
        let result = sample(Mode::AllPedelec, Policy::CauserPays);

        assert!(cache.load(&key).is_none());
        cache.store(&key, &result).unwrap();
        assert_eq!(cache.load(&key), Some(result));

        cache.invalidate(&key).unwrap();
        assert!(cache.load(&key).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_cache_corrupt_entry_is_a_miss() {
        let dir = temp_dir("micromobility_costs_test_cache_corrupt");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let cache = JsonFileCache::new(&dir);
        let key = CacheKey::new(Mode::AllBicycle, Policy::CauserPays);
        fs::write(cache.path(&key), "not json").unwrap();

        assert!(cache.load(&key).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_cache_rejects_mismatched_key() {
        let dir = temp_dir("micromobility_costs_test_cache_mismatch");
        let _ = fs::remove_dir_all(&dir);
        let cache = JsonFileCache::new(&dir);
        let key = CacheKey::new(Mode::AllBicycle, Policy::CauserPays);
        let other = sample(Mode::AllPedelec, Policy::CauserPays);
        fs::create_dir_all(&dir).unwrap();
        fs::write(cache.path(&key), serde_json::to_string(&other).unwrap()).unwrap();

        assert!(cache.load(&key).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_json_cache_entry_without_scenarios_is_a_miss() {
        let dir = temp_dir("micromobility_costs_test_cache_empty");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let cache = JsonFileCache::new(&dir);
        let key = CacheKey::new(Mode::AllBicycle, Policy::CauserPays);
        let mut emptied = sample(Mode::AllBicycle, Policy::CauserPays);
        emptied.scenario_results.clear();
        fs::write(cache.path(&key), serde_json::to_string(&emptied).unwrap()).unwrap();

        assert!(cache.load(&key).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        let key = CacheKey::new(Mode::AllBicycle, Policy::DamagePotential);
        let result = sample(Mode::AllBicycle, Policy::DamagePotential);

        cache.store(&key, &result).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.load(&key), Some(result));

        cache.invalidate(&key).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_cache_always_misses() {
        let key = CacheKey::new(Mode::AllBicycle, Policy::DamagePotential);
        NoCache
            .store(&key, &sample(Mode::AllBicycle, Policy::DamagePotential))
            .unwrap();
        assert!(NoCache.load(&key).is_none());
    }
}
