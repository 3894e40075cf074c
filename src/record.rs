//! Accident rows as read from the police export, and the derived records the
//! cost aggregation works on.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

use crate::tables::{Code, CostTables};

/// Participant slots per accident. Slot 1 is the legal causer.
pub const PARTICIPANT_SLOTS: usize = 3;

/// Police export columns the preprocessor reads.
pub const RAW_COLUMNS: [&str; 7] = ["BArt01", "BArt02", "BArt03", "Verl01", "tot", "svl", "lvl"];

/// Columns the preprocessor appends to the processed table.
pub const DERIVED_COLUMNS: [&str; 5] = [
    "Ekin Accident",
    "Epsilon Participant 1",
    "Epsilon Participant 2",
    "Epsilon Participant 3",
    "Accident Costs",
];

/// One raw accident row. Null cells are tolerated and zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAccidentRow {
    #[serde(rename = "BArt01", default, deserialize_with = "code_cell")]
    pub participant_1: Option<Code>,
    #[serde(rename = "BArt02", default, deserialize_with = "code_cell")]
    pub participant_2: Option<Code>,
    #[serde(rename = "BArt03", default, deserialize_with = "code_cell")]
    pub participant_3: Option<Code>,
    #[serde(rename = "Verl01", default, deserialize_with = "code_cell")]
    pub causer_injury: Option<Code>,
    #[serde(rename = "tot", default, deserialize_with = "count_cell")]
    pub fatalities: u32,
    #[serde(rename = "svl", default, deserialize_with = "count_cell")]
    pub severely_injured: u32,
    #[serde(rename = "lvl", default, deserialize_with = "count_cell")]
    pub lightly_injured: u32,
    /// Every source cell as `(header, value)` in file order, derived columns
    /// excluded. Empty when the row was not read from a table.
    #[serde(skip)]
    pub columns: Vec<(String, String)>,
}

impl RawAccidentRow {
    pub fn participants(&self) -> [Option<&Code>; PARTICIPANT_SLOTS] {
        [
            self.participant_1.as_ref(),
            self.participant_2.as_ref(),
            self.participant_3.as_ref(),
        ]
    }
}

fn code_cell<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Code>, D::Error> {
    let cell = Option::<String>::deserialize(deserializer)?;
    Ok(cell.as_deref().and_then(Code::parse))
}

/// Casualty counts arrive as `"2"` or `"2.0"`; empty means zero.
fn count_cell<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let Some(cell) = Option::<String>::deserialize(deserializer)? else {
        return Ok(0);
    };
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(0);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid casualty count '{cell}'")))?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "casualty count must be a non-negative integer, got '{cell}'"
        )));
    }
    Ok(value as u32)
}

/// An accident with its energy shares and monetized cost computed once.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentRecord {
    pub participants: [Option<Code>; PARTICIPANT_SLOTS],
    pub causer_injury: Option<Code>,
    pub fatalities: u32,
    pub severely_injured: u32,
    pub lightly_injured: u32,
    pub total_kinetic_energy: f64,
    pub epsilon: [f64; PARTICIPANT_SLOTS],
    pub monetized_cost: f64,
    pub columns: Vec<(String, String)>,
}

impl AccidentRecord {
    pub fn from_row(row: &RawAccidentRow, tables: &CostTables) -> Self {
        let participants = row.participants();
        let energies = participants.map(|code| tables.energy.energy(code));
        let total_kinetic_energy: f64 = energies.iter().sum();

        let mut epsilon = [0.0; PARTICIPANT_SLOTS];
        if total_kinetic_energy != 0.0 {
            for (slot, code) in participants.iter().enumerate() {
                if code.is_some() {
                    epsilon[slot] = energies[slot] / total_kinetic_energy;
                }
            }
        }

        let monetized_cost = tables.injury.monetize(
            row.fatalities,
            row.severely_injured,
            row.lightly_injured,
            row.causer_injury.as_ref(),
        );

        AccidentRecord {
            participants: participants.map(|code| code.cloned()),
            causer_injury: row.causer_injury.clone(),
            fatalities: row.fatalities,
            severely_injured: row.severely_injured,
            lightly_injured: row.lightly_injured,
            total_kinetic_energy,
            epsilon,
            monetized_cost,
            columns: row.columns.clone(),
        }
    }

    /// Whether the participant in `slot` (0-based) has one of `codes`.
    pub fn slot_matches(&self, slot: usize, codes: &BTreeSet<Code>) -> bool {
        self.participants
            .get(slot)
            .and_then(Option::as_ref)
            .is_some_and(|code| codes.contains(code))
    }

    pub fn epsilon_sum(&self) -> f64 {
        self.epsilon.iter().sum()
    }

    /// Header of the processed table: the source columns, or the police
    /// columns when the source layout is unknown, followed by the derived ones.
    pub fn processed_header(&self) -> Vec<&str> {
        let mut header: Vec<&str> = if self.columns.is_empty() {
            RAW_COLUMNS.to_vec()
        } else {
            self.columns.iter().map(|(name, _)| name.as_str()).collect()
        };
        header.extend(DERIVED_COLUMNS);
        header
    }

    /// Cells matching [`processed_header`](Self::processed_header).
    pub fn processed_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = if self.columns.is_empty() {
            let code = |c: &Option<Code>| c.as_ref().map(|c| c.as_str().to_string()).unwrap_or_default();
            let [p1, p2, p3] = &self.participants;
            vec![
                code(p1),
                code(p2),
                code(p3),
                code(&self.causer_injury),
                self.fatalities.to_string(),
                self.severely_injured.to_string(),
                self.lightly_injured.to_string(),
            ]
        } else {
            self.columns.iter().map(|(_, value)| value.clone()).collect()
        };
        fields.push(format!("{:?}", self.total_kinetic_energy));
        fields.extend(self.epsilon.iter().map(|e| format!("{e:?}")));
        fields.push(format!("{:?}", self.monetized_cost));
        fields
    }
}

/// Derives one record per row. Rows are independent of each other.
pub fn preprocess(rows: &[RawAccidentRow], tables: &CostTables) -> Vec<AccidentRecord> {
    rows.iter()
        .map(|row| AccidentRecord::from_row(row, tables))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{EnergyTable, InjuryCostTable};
    use std::collections::HashMap;

    fn code(value: f64) -> Option<Code> {
        Some(Code::numeric(value))
    }

    fn toy_tables() -> CostTables {
        CostTables {
            energy: [(Code::numeric(71.0), 100.0), (Code::numeric(21.0), 900.0)]
                .into_iter()
                .collect::<EnergyTable>(),
            injury: InjuryCostTable {
                fatality: 1000.0,
                severely_injured: 100.0,
                lightly_injured: 10.0,
                causer_deductions: HashMap::new(),
            },
        }
    }

    #[test]
    fn test_car_bicycle_collision() {
        let row = RawAccidentRow {
            participant_1: code(21.0),
            participant_2: code(71.0),
            fatalities: 1,
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());

        assert_eq!(record.total_kinetic_energy, 1000.0);
        assert!((record.epsilon[0] - 0.9).abs() < 1e-12);
        assert!((record.epsilon[1] - 0.1).abs() < 1e-12);
        assert_eq!(record.epsilon[2], 0.0);
        assert_eq!(record.monetized_cost, 1000.0);
    }

    #[test]
    fn test_all_participants_absent() {
        let row = RawAccidentRow {
            severely_injured: 2,
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());

        assert_eq!(record.total_kinetic_energy, 0.0);
        assert_eq!(record.epsilon, [0.0; PARTICIPANT_SLOTS]);
        assert_eq!(record.monetized_cost, 200.0);
    }

    #[test]
    fn test_single_known_participant_takes_full_share() {
        let row = RawAccidentRow {
            participant_2: code(71.0),
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());
        assert_eq!(record.epsilon[1], 1.0);
    }

    #[test]
    fn test_unknown_code_gets_zero_share() {
        let row = RawAccidentRow {
            participant_1: code(21.0),
            participant_2: code(71.0),
            participant_3: code(99.0),
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());

        assert_eq!(record.epsilon[2], 0.0);
        assert!((record.epsilon_sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_only_unknown_codes_sum_to_zero() {
        let row = RawAccidentRow {
            participant_1: code(98.0),
            participant_2: code(99.0),
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());
        assert_eq!(record.total_kinetic_energy, 0.0);
        assert_eq!(record.epsilon_sum(), 0.0);
    }

    #[test]
    fn test_epsilon_sums_to_one_with_study_tables() {
        let tables = CostTables::default();
        let combos = [
            [code(71.0), code(21.0), None],
            [code(72.0), code(61.0), code(81.0)],
            [code(3.0), None, code(44.0)],
            [None, code(5.0), code(31.0)],
        ];
        for [p1, p2, p3] in combos {
            let row = RawAccidentRow {
                participant_1: p1,
                participant_2: p2,
                participant_3: p3,
                ..Default::default()
            };
            let record = AccidentRecord::from_row(&row, &tables);
            assert!((record.epsilon_sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_causer_deduction_applied() {
        let row = RawAccidentRow {
            participant_1: code(71.0),
            causer_injury: code(3.0),
            severely_injured: 1,
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &CostTables::default());
        assert!((record.monetized_cost - (688_699.75 - 551_527.60)).abs() < 1e-6);
    }

    #[test]
    fn test_slot_matches() {
        let row = RawAccidentRow {
            participant_1: code(21.0),
            participant_2: code(71.0),
            ..Default::default()
        };
        let record = AccidentRecord::from_row(&row, &toy_tables());
        let bicycle: BTreeSet<Code> = [Code::numeric(71.0)].into_iter().collect();

        assert!(!record.slot_matches(0, &bicycle));
        assert!(record.slot_matches(1, &bicycle));
        assert!(!record.slot_matches(2, &bicycle));
        assert!(!record.slot_matches(7, &bicycle));
    }

    #[test]
    fn test_deserialize_with_null_cells() {
        let data = "BArt01,BArt02,BArt03,Verl01,tot,svl,lvl\n71.0,21,,,,1.0,\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let row: RawAccidentRow = rdr.deserialize().next().unwrap().unwrap();

        assert_eq!(row.participant_1, code(71.0));
        assert_eq!(row.participant_2, code(21.0));
        assert_eq!(row.participant_3, None);
        assert_eq!(row.causer_injury, None);
        assert_eq!(row.fatalities, 0);
        assert_eq!(row.severely_injured, 1);
        assert_eq!(row.lightly_injured, 0);
    }

    #[test]
    fn test_deserialize_rejects_fractional_count() {
        let data = "BArt01,BArt02,BArt03,Verl01,tot,svl,lvl\n71.0,,,,0.5,,\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let result: Option<Result<RawAccidentRow, csv::Error>> = rdr.deserialize().next();
        assert!(result.unwrap().is_err());
    }
}
