use tracing::debug;

use crate::costs::{CollisionCostResult, CostCategory, CostResult};
use crate::error::CostError;
use crate::mode::{Policy, VehicleModeProfile};
use crate::record::{AccidentRecord, PARTICIPANT_SLOTS};

/// Annual collision cost in € attributed to the profile's mode.
///
/// Under [`Policy::DamagePotential`] every slot whose code belongs to the mode
/// contributes `epsilon × monetized cost`; one accident can contribute through
/// several slots. Under [`Policy::CauserPays`] only slot 1 is inspected and the
/// full monetized cost is attributed, without epsilon weighting.
pub fn annual_cost(records: &[AccidentRecord], profile: &VehicleModeProfile, policy: Policy) -> f64 {
    let codes = &profile.vehicle_codes;

    let attributed: f64 = match policy {
        Policy::DamagePotential => (0..PARTICIPANT_SLOTS)
            .map(|slot| {
                records
                    .iter()
                    .filter(|record| record.slot_matches(slot, codes))
                    .map(|record| record.epsilon[slot] * record.monetized_cost)
                    .sum::<f64>()
            })
            .sum(),
        Policy::CauserPays => records
            .iter()
            .filter(|record| record.slot_matches(0, codes))
            .map(|record| record.monetized_cost)
            .sum(),
    };

    attributed * profile.factor
}

/// Aggregates preprocessed records into cost per vkm, per pkm and per year.
///
/// # Errors
///
/// Fails when the profile's combined mileage or occupancy rate is not
/// positive, since the normalised costs would be undefined.
pub fn aggregate(
    records: &[AccidentRecord],
    profile: &VehicleModeProfile,
    policy: Policy,
) -> Result<CollisionCostResult, CostError> {
    profile.validate()?;

    let cost_per_year = annual_cost(records, profile, policy);
    let mileage = profile.combined_mileage();

    let result = CostResult {
        cost_per_vkm: cost_per_year * 100.0 / mileage,
        cost_per_pkm: cost_per_year * 100.0 / (mileage * profile.occupancy_rate),
        cost_per_year,
    };

    debug!(
        mode = %profile.mode,
        policy = %policy,
        records = records.len(),
        cost_per_year,
        "Collision costs aggregated"
    );

    Ok(result)
}

/// Collision costs of one mode over a single accident dataset.
pub struct CollisionsCalculator<'a> {
    pub records: &'a [AccidentRecord],
    pub profile: &'a VehicleModeProfile,
    pub policy: Policy,
}

impl CostCategory for CollisionsCalculator<'_> {
    fn tag(&self) -> &str {
        "Collisions"
    }

    fn calc_costs(&self) -> Result<CostResult, CostError> {
        aggregate(self.records, self.profile, self.policy)
    }
}
