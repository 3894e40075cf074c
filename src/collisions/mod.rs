//! Collision cost attribution.
//!
//! Preprocessed accident records are filtered by a mode's vehicle codes,
//! attributed under a damage-potential or causer-pays policy, and normalised
//! by mileage and occupancy. The same aggregation is repeated over scenario
//! ensembles and averaged, with results optionally cached per mode and policy.

pub mod aggregate;
pub mod cache;
pub mod ensemble;
pub mod types;
pub mod utility;

pub use aggregate::{CollisionsCalculator, aggregate, annual_cost};
pub use cache::{CacheKey, JsonFileCache, MemoryCache, NoCache, ScenarioCache};
pub use ensemble::{EnsembleRunner, run_ensemble};
pub use types::{DistributionSummary, ScenarioDataset, ScenarioEnsembleResult};
