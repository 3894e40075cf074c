//! CSV loaders for accident tables and scenario directories.

use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::collisions::types::ScenarioDataset;
use crate::error::CostError;
use crate::record::{DERIVED_COLUMNS, RAW_COLUMNS, RawAccidentRow};

/// Columns every accident table must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = RAW_COLUMNS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    /// Preamble lines before the header row.
    pub skip_rows: usize,
    /// Column whose empty cells mark a row as invalid. Ignored when the
    /// table has no such column.
    pub discriminator: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            delimiter: b',',
            skip_rows: 0,
            discriminator: Some("Datum".to_string()),
        }
    }
}

/// Parses an accident table from any reader.
///
/// # Errors
///
/// Returns [`CostError::MissingColumns`] if a required column is absent, or a
/// CSV error for malformed rows.
pub fn read_accident_rows<R: Read>(
    reader: R,
    dataset: &str,
    options: &LoadOptions,
) -> Result<Vec<RawAccidentRow>, CostError> {
    let mut reader = BufReader::new(reader);
    let mut skipped = String::new();
    for _ in 0..options.skip_rows {
        skipped.clear();
        reader
            .read_line(&mut skipped)
            .map_err(|e| CostError::io(dataset, e))?;
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CostError::MissingColumns {
            dataset: dataset.to_string(),
            columns: missing,
        });
    }

    let discriminator = options
        .discriminator
        .as_deref()
        .and_then(|name| headers.iter().position(|h| h == name));

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for result in rdr.records() {
        let record = result?;
        if let Some(idx) = discriminator {
            if record.get(idx).map(str::trim).unwrap_or("").is_empty() {
                dropped += 1;
                continue;
            }
        }
        let mut row: RawAccidentRow = record.deserialize(Some(&headers))?;
        row.columns = headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !DERIVED_COLUMNS.contains(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    info!(dataset, rows = rows.len(), dropped, "Accident table loaded");
    Ok(rows)
}

/// Opens a file, gunzipping it when the name ends in `.gz`.
fn open(path: &Path) -> Result<Box<dyn Read>, CostError> {
    let file = File::open(path).map_err(|e| CostError::io(path, e))?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Loads one accident table from disk.
#[tracing::instrument(skip(options), fields(path = %path.display()))]
pub fn load_accident_table(path: &Path, options: &LoadOptions) -> Result<Vec<RawAccidentRow>, CostError> {
    if !path.exists() {
        return Err(CostError::MissingDataset {
            name: dataset_name(path),
            path: path.to_path_buf(),
        });
    }
    read_accident_rows(open(path)?, &dataset_name(path), options)
}

/// Loads `primary`, or `fallback` if one is configured and `primary` is missing.
pub fn load_with_fallback(
    primary: &Path,
    fallback: Option<&Path>,
    options: &LoadOptions,
) -> Result<Vec<RawAccidentRow>, CostError> {
    match (primary.exists(), fallback) {
        (false, Some(fallback)) => {
            warn!(
                primary = %primary.display(),
                fallback = %fallback.display(),
                "Primary accident table missing, using configured fallback"
            );
            load_accident_table(fallback, options)
        }
        _ => load_accident_table(primary, options),
    }
}

/// Loads every `.csv` / `.csv.gz` file in `dir` as one scenario, in name order.
///
/// Simulated scenario rows carry no valid date, so the discriminator column
/// is not applied. Two files with the same stem (`a.csv` and `a.csv.gz`) are
/// a [`CostError::DuplicateScenario`].
#[tracing::instrument(skip(options), fields(dir = %dir.display()))]
pub fn load_scenario_dir(dir: &Path, options: &LoadOptions) -> Result<Vec<ScenarioDataset>, CostError> {
    if !dir.is_dir() {
        return Err(CostError::MissingDataset {
            name: "scenarios".to_string(),
            path: dir.to_path_buf(),
        });
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CostError::io(dir, e))? {
        let path = entry.map_err(|e| CostError::io(dir, e))?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if path.is_file() && (name.ends_with(".csv") || name.ends_with(".csv.gz")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut names = HashSet::new();
    for path in &paths {
        let name = dataset_name(path);
        if !names.insert(name.clone()) {
            return Err(CostError::DuplicateScenario(name));
        }
    }

    let options = LoadOptions {
        discriminator: None,
        ..options.clone()
    };
    let mut scenarios = Vec::with_capacity(paths.len());
    for path in paths {
        debug!(path = %path.display(), "Loading scenario");
        let rows = load_accident_table(&path, &options)?;
        scenarios.push(ScenarioDataset {
            name: dataset_name(&path),
            rows,
        });
    }

    info!(scenarios = scenarios.len(), "Scenario directory loaded");
    Ok(scenarios)
}

/// File name without `.csv` / `.csv.gz`.
fn dataset_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.strip_suffix(".csv").unwrap_or(name).to_string()
}
