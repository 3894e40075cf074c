//! Transport modes, attribution policies and the per-mode profile table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CostError;
use crate::tables::Code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    PrivateBicycle,
    SharedBicycle,
    PrivatePedelec,
    SharedPedelec,
    AllBicycle,
    AllPedelec,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::PrivateBicycle,
        Mode::SharedBicycle,
        Mode::PrivatePedelec,
        Mode::SharedPedelec,
        Mode::AllBicycle,
        Mode::AllPedelec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::PrivateBicycle => "private_bicycle",
            Mode::SharedBicycle => "shared_bicycle",
            Mode::PrivatePedelec => "private_pedelec",
            Mode::SharedPedelec => "shared_pedelec",
            Mode::AllBicycle => "all_bicycle",
            Mode::AllPedelec => "all_pedelec",
        }
    }

    pub fn vehicle_class(&self) -> VehicleClass {
        match self {
            Mode::PrivateBicycle | Mode::SharedBicycle | Mode::AllBicycle => VehicleClass::Bicycle,
            Mode::PrivatePedelec | Mode::SharedPedelec | Mode::AllPedelec => VehicleClass::Pedelec,
        }
    }

    /// Scenario datasets only describe whole vehicle classes, so only the
    /// aggregate views can be run as an ensemble.
    pub fn supports_ensemble(&self) -> bool {
        matches!(self, Mode::AllBicycle | Mode::AllPedelec)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CostError::UnsupportedMode(s.to_string()))
    }
}

/// How an accident's monetized cost is attributed to a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Every participant carries its kinetic-energy share of the cost.
    DamagePotential,
    /// The causer (participant slot 1) carries the full cost.
    CauserPays,
}

impl Policy {
    pub const ALL: [Policy; 2] = [Policy::DamagePotential, Policy::CauserPays];

    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::DamagePotential => "damage_potential",
            Policy::CauserPays => "causer_pays",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "damage_potential" => Ok(Policy::DamagePotential),
            "causer_pays" | "causer" => Ok(Policy::CauserPays),
            other => Err(CostError::UnsupportedPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Bicycle,
    Pedelec,
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleClass::Bicycle => f.write_str("bicycle"),
            VehicleClass::Pedelec => f.write_str("pedelec"),
        }
    }
}

/// Annual mileage of one vehicle class in vkm/year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FleetMileage {
    pub private: f64,
    /// Shared fleet as observed in the operator database.
    pub shared: f64,
    /// Shared fleet extrapolated to every operator in the city.
    pub shared_citywide: f64,
}

impl FleetMileage {
    fn combined(&self) -> f64 {
        self.private + self.shared_citywide
    }
}

/// Persons per vehicle for each sub-fleet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyRates {
    pub private_bicycle: f64,
    pub shared_bicycle: f64,
    pub private_pedelec: f64,
    pub shared_pedelec: f64,
}

impl Default for OccupancyRates {
    fn default() -> Self {
        OccupancyRates {
            private_bicycle: 1.0,
            shared_bicycle: 1.0,
            private_pedelec: 1.0,
            shared_pedelec: 1.0,
        }
    }
}

/// Everything the aggregator needs to know about one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleModeProfile {
    pub mode: Mode,
    pub annual_mileage_private: f64,
    pub annual_mileage_shared: f64,
    pub occupancy_rate: f64,
    /// Share of the class-wide cost carried by this mode.
    pub factor: f64,
    /// Vehicle-type codes that count as "this participant is the mode".
    pub vehicle_codes: BTreeSet<Code>,
}

impl VehicleModeProfile {
    pub fn combined_mileage(&self) -> f64 {
        self.annual_mileage_private + self.annual_mileage_shared
    }

    /// Rejects profiles whose per-vkm or per-pkm cost would be undefined.
    pub fn validate(&self) -> Result<(), CostError> {
        let mileage = self.combined_mileage();
        if !(mileage.is_finite() && mileage > 0.0) {
            return Err(CostError::ZeroMileage(self.mode.to_string()));
        }
        if !(self.occupancy_rate.is_finite() && self.occupancy_rate > 0.0) {
            return Err(CostError::InvalidOccupancy {
                mode: self.mode.to_string(),
                occupancy_rate: self.occupancy_rate,
            });
        }
        Ok(())
    }
}

/// One profile per [`Mode`], built once from the fleet constants.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeProfiles {
    profiles: [VehicleModeProfile; 6],
}

impl ModeProfiles {
    pub fn build(
        bicycle: &FleetMileage,
        pedelec: &FleetMileage,
        occupancy: &OccupancyRates,
        bicycle_codes: &BTreeSet<Code>,
        pedelec_codes: &BTreeSet<Code>,
    ) -> Result<Self, CostError> {
        for (class, fleet) in [
            (VehicleClass::Bicycle, bicycle),
            (VehicleClass::Pedelec, pedelec),
        ] {
            let combined = fleet.combined();
            if !(combined.is_finite() && combined > 0.0) {
                return Err(CostError::InvalidFleet(class.to_string()));
            }
        }

        let profile = |mode: Mode| {
            let (fleet, codes) = match mode.vehicle_class() {
                VehicleClass::Bicycle => (bicycle, bicycle_codes),
                VehicleClass::Pedelec => (pedelec, pedelec_codes),
            };
            let private_share = fleet.private / fleet.combined();
            let shared_share = fleet.shared_citywide / fleet.combined();

            let (annual_mileage_private, annual_mileage_shared, occupancy_rate, factor) =
                match mode {
                    Mode::PrivateBicycle => (
                        fleet.private,
                        fleet.shared,
                        occupancy.private_bicycle,
                        private_share,
                    ),
                    Mode::SharedBicycle => (
                        fleet.shared,
                        fleet.shared,
                        occupancy.shared_bicycle,
                        shared_share,
                    ),
                    Mode::PrivatePedelec => (
                        fleet.private,
                        fleet.shared,
                        occupancy.private_pedelec,
                        private_share,
                    ),
                    Mode::SharedPedelec => (
                        fleet.shared_citywide,
                        fleet.shared_citywide,
                        occupancy.shared_pedelec,
                        shared_share,
                    ),
                    Mode::AllBicycle => (
                        fleet.private,
                        fleet.shared_citywide,
                        occupancy.private_bicycle,
                        1.0,
                    ),
                    Mode::AllPedelec => (
                        fleet.private,
                        fleet.shared_citywide,
                        occupancy.private_pedelec,
                        1.0,
                    ),
                };

            VehicleModeProfile {
                mode,
                annual_mileage_private,
                annual_mileage_shared,
                occupancy_rate,
                factor,
                vehicle_codes: codes.clone(),
            }
        };

        Ok(ModeProfiles {
            profiles: Mode::ALL.map(profile),
        })
    }

    pub fn get(&self, mode: Mode) -> &VehicleModeProfile {
        &self.profiles[mode.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehicleModeProfile> {
        self.profiles.iter()
    }
}
