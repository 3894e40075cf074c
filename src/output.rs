//! Output formatting and persistence for cost results.
//!
//! Supports pretty-printing, JSON files, processed-table export and CSV append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::costs::CostResult;
use crate::mode::{Mode, Policy};
use crate::record::{AccidentRecord, DERIVED_COLUMNS, RAW_COLUMNS};
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::Path;

/// One row of the results log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    pub policy: Policy,
    /// Scenario name, or empty for a single-dataset run.
    pub scenario: Option<String>,
    #[serde(rename = "cost per vkm")]
    pub cost_per_vkm: f64,
    #[serde(rename = "cost per pkm")]
    pub cost_per_pkm: f64,
    #[serde(rename = "cost per year")]
    pub cost_per_year: f64,
}

impl ResultRow {
    pub fn new(mode: Mode, policy: Policy, result: &CostResult) -> Self {
        ResultRow {
            timestamp: Utc::now(),
            mode,
            policy,
            scenario: None,
            cost_per_vkm: result.cost_per_vkm,
            cost_per_pkm: result.cost_per_pkm,
            cost_per_year: result.cost_per_year,
        }
    }

    pub fn with_scenario(mut self, scenario: &str) -> Self {
        self.scenario = Some(scenario.to_string());
        self
    }
}

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs the three cost figures of one mode and policy.
pub fn print_report(mode: Mode, policy: Policy, result: &CostResult) {
    info!(%mode, %policy, "Collision costs");
    info!("  cost per vkm:  {:>14.4} €-ct/vkm", result.cost_per_vkm);
    info!("  cost per pkm:  {:>14.4} €-ct/pkm", result.cost_per_pkm);
    info!("  cost per year: {:>14.2} €/year", result.cost_per_year);
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {path}"))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Writes the processed accident table, replacing any existing file.
///
/// Source columns are kept as read and the derived columns appended. All
/// records must come from the same table.
pub fn write_processed(path: &str, records: &[AccidentRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {path}"))?;
    let header = match records.first() {
        Some(first) => first.processed_header(),
        None => RAW_COLUMNS.into_iter().chain(DERIVED_COLUMNS).collect(),
    };
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(record.processed_fields())?;
    }
    writer.flush()?;
    info!(path, rows = records.len(), "Processed accident table written");
    Ok(())
}

/// Appends a [`ResultRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, row: &ResultRow) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawAccidentRow;
    use crate::tables::{Code, CostTables};
    use std::env;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn row() -> ResultRow {
        let result = CostResult {
            cost_per_vkm: 1.25,
            cost_per_pkm: 1.25,
            cost_per_year: 5000.0,
        };
        ResultRow::new(Mode::AllBicycle, Policy::DamagePotential, &result)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&row());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&row()).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("micromobility_costs_test_create.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &row()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,mode,policy,scenario,cost per vkm"));
        assert!(content.contains("all_bicycle,damage_potential,,1.25,1.25,5000.0"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("micromobility_costs_test_header.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &row()).unwrap();
        append_record(&path, &row().with_scenario("CSV_1")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.contains("timestamp")).count(), 1);
        assert!(lines[2].contains(",CSV_1,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_json_creates_parent_dirs() {
        let dir = temp_path("micromobility_costs_test_json_dir");
        let _ = fs::remove_dir_all(&dir);
        let path = format!("{dir}/nested/result.json");

        write_json(&path, &CostResult::default()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["cost per year"], 0.0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_processed_columns() {
        let path = temp_path("micromobility_costs_test_processed.csv");
        let rows = vec![RawAccidentRow {
            participant_1: Some(Code::numeric(71.0)),
            participant_2: Some(Code::numeric(21.0)),
            lightly_injured: 1,
            ..Default::default()
        }];
        let records = crate::record::preprocess(&rows, &CostTables::default());

        write_processed(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "BArt01,BArt02,BArt03,Verl01,tot,svl,lvl,Ekin Accident,\
             Epsilon Participant 1,Epsilon Participant 2,Epsilon Participant 3,Accident Costs"
        );
        assert!(lines.next().unwrap().starts_with("71.0,21.0,,,0,0,1,75394.0,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_processed_keeps_source_columns() {
        let path = temp_path("micromobility_costs_test_processed_source.csv");
        let data = "Datum,BArt01,BArt02,BArt03,Verl01,tot,svl,lvl,Ortslage\n\
                    2022-03-01,71,21,,2,0,0,1,innerorts\n";
        let rows = crate::dataset::read_accident_rows(
            data.as_bytes(),
            "source",
            &crate::dataset::LoadOptions::default(),
        )
        .unwrap();
        let records = crate::record::preprocess(&rows, &CostTables::default());

        write_processed(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Datum,BArt01,BArt02,BArt03,Verl01,tot,svl,lvl,Ortslage,Ekin Accident,\
             Epsilon Participant 1,Epsilon Participant 2,Epsilon Participant 3,Accident Costs"
        );
        assert!(lines.next().unwrap().starts_with("2022-03-01,71,21,,2,0,0,1,innerorts,75394.0,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_processed_empty_table_has_header() {
        let path = temp_path("micromobility_costs_test_processed_empty.csv");

        write_processed(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("BArt01,BArt02,BArt03,Verl01,tot,svl,lvl,Ekin Accident,"));

        fs::remove_file(&path).unwrap();
    }
}
