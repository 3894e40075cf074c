//! Static lookup tables: characteristic kinetic energy per vehicle type and
//! monetized injury costs.
//!
//! Both tables are keyed by [`Code`], the canonical string form of a
//! categorical code from the police accident export. Lookups never fail: a
//! code missing from a table contributes zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical categorical code (vehicle type or injury severity).
///
/// Numeric codes are normalized to a fixed-decimal form so that `71`, `71.0`
/// and ` 71.00 ` all become `"71.0"`. Non-numeric codes are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Code(String);

impl Code {
    /// Parses a raw cell. Returns `None` for empty cells and `NaN`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(Self::numeric(value)),
            _ => Some(Code(trimmed.to_string())),
        }
    }

    pub fn numeric(value: f64) -> Self {
        Code(format!("{value:?}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Code {
    fn from(raw: String) -> Self {
        Code::parse(&raw).unwrap_or(Code(raw))
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Characteristic kinetic energy per vehicle type, based on the 2019 police
/// categorisation.
static ENERGY_VALUES: &[(f64, f64)] = &[
    (1.0, 8695.0),    // moped
    (2.0, 8695.0),    // moped
    (3.0, 754.0),     // pedelec
    (4.0, 8695.0),    // moped
    (5.0, 818.0),     // e-scooter
    (6.0, 591680.0),  // other
    (8.0, 591680.0),  // other
    (11.0, 13393.0),  // motorcycle
    (12.0, 13393.0),  // motorcycle
    (13.0, 13393.0),  // motorcycle
    (15.0, 13393.0),  // motorcycle
    (21.0, 74690.0),  // car
    (22.0, 129430.0), // van
    (31.0, 385719.0), // bus
    (32.0, 385719.0), // bus
    (33.0, 385719.0), // bus
    (34.0, 385719.0), // bus
    (40.0, 129430.0), // van
    (42.0, 129430.0), // van
    (44.0, 591680.0), // truck
    (46.0, 591680.0), // truck
    (48.0, 591680.0), // truck
    (51.0, 591680.0), // truck
    (53.0, 591680.0), // truck
    (54.0, 591680.0), // truck
    (58.0, 591680.0), // truck
    (59.0, 591680.0), // truck
    (61.0, 850091.0), // tram
    (71.0, 704.0),    // bicycle
    (72.0, 754.0),    // pedelec
    (81.0, 84.0),     // pedestrian
    (83.0, 84.0),     // pedestrian
    (84.0, 84.0),     // pedestrian
    (92.0, 591680.0), // other
    (93.0, 84.0),     // pedestrian
];

/// Maps a vehicle-type code to its characteristic kinetic energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnergyTable(HashMap<Code, f64>);

impl EnergyTable {
    pub fn new(entries: HashMap<Code, f64>) -> Self {
        EnergyTable(entries)
    }

    /// Energy for a participant slot. Absent or unknown codes yield `0.0`.
    pub fn energy(&self, code: Option<&Code>) -> f64 {
        code.and_then(|c| self.0.get(c)).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, code: &Code) -> bool {
        self.0.contains_key(code)
    }
}

impl Default for EnergyTable {
    fn default() -> Self {
        EnergyTable(
            ENERGY_VALUES
                .iter()
                .map(|&(code, energy)| (Code::numeric(code), energy))
                .collect(),
        )
    }
}

impl FromIterator<(Code, f64)> for EnergyTable {
    fn from_iter<I: IntoIterator<Item = (Code, f64)>>(iter: I) -> Self {
        EnergyTable(iter.into_iter().collect())
    }
}

/// Monetized unit costs per casualty and the deduction applied for the
/// causer's own injury level, in €.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjuryCostTable {
    pub fatality: f64,
    pub severely_injured: f64,
    pub lightly_injured: f64,
    pub causer_deductions: HashMap<Code, f64>,
}

impl InjuryCostTable {
    /// Deduction for the causer's injury code; `0.0` when absent or unknown.
    pub fn deduction(&self, code: Option<&Code>) -> f64 {
        code.and_then(|c| self.causer_deductions.get(c))
            .copied()
            .unwrap_or(0.0)
    }

    /// `fatalities×F + severe×S + light×L − deduction(causer code)`.
    pub fn monetize(
        &self,
        fatalities: u32,
        severely_injured: u32,
        lightly_injured: u32,
        causer_injury: Option<&Code>,
    ) -> f64 {
        fatalities as f64 * self.fatality
            + severely_injured as f64 * self.severely_injured
            + lightly_injured as f64 * self.lightly_injured
            - self.deduction(causer_injury)
    }
}

impl Default for InjuryCostTable {
    fn default() -> Self {
        InjuryCostTable {
            fatality: 4_904_583.106,
            severely_injured: 688_699.75,
            lightly_injured: 44_573.84,
            causer_deductions: [
                (4.0, 4_147_816.27),
                (3.0, 551_527.60),
                (2.0, 41_471.69),
                (1.0, 0.0),
            ]
            .into_iter()
            .map(|(code, cost)| (Code::numeric(code), cost))
            .collect(),
        }
    }
}

/// Both lookup tables, built once and shared read-only by every pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTables {
    pub energy: EnergyTable,
    pub injury: InjuryCostTable,
}
