//! The three-key cost shape shared by every cost category, and the
//! composition of categories into a total.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::CostError;

/// Costs of one category in €-ct/vkm, €-ct/pkm and €/year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    #[serde(rename = "cost per vkm")]
    pub cost_per_vkm: f64,
    #[serde(rename = "cost per pkm")]
    pub cost_per_pkm: f64,
    #[serde(rename = "cost per year")]
    pub cost_per_year: f64,
}

pub type CollisionCostResult = CostResult;

/// A calculator for one external cost category.
pub trait CostCategory {
    fn tag(&self) -> &str;
    fn calc_costs(&self) -> Result<CostResult, CostError>;
}

/// A category whose costs were computed elsewhere and are taken as given.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCategory {
    pub tag: String,
    pub result: CostResult,
}

impl CostCategory for StaticCategory {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn calc_costs(&self) -> Result<CostResult, CostError> {
        Ok(self.result)
    }
}

/// Loads externally computed categories from a JSON object
/// `{ "<tag>": { "cost per vkm": .., "cost per pkm": .., "cost per year": .. } }`.
pub fn load_static_categories(path: &str) -> Result<Vec<StaticCategory>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading categories from {path}"))?;
    let entries: BTreeMap<String, CostResult> = serde_json::from_str(&content)
        .with_context(|| format!("parsing categories from {path}"))?;
    Ok(entries
        .into_iter()
        .map(|(tag, result)| StaticCategory { tag, result })
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalCost {
    #[serde(rename = "total cost per vkm")]
    pub total_cost_per_vkm: f64,
    #[serde(rename = "total cost per pkm")]
    pub total_cost_per_pkm: f64,
    #[serde(rename = "total cost per year")]
    pub total_cost_per_year: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    #[serde(rename = "Cost by Category")]
    pub by_category: BTreeMap<String, CostResult>,
    #[serde(rename = "Total Cost")]
    pub total: TotalCost,
}

/// Collects cost categories and sums them into a [`CostReport`].
///
/// Categories are keyed by tag; appending a second category with the same
/// tag replaces the first.
#[derive(Default)]
pub struct ExternalCostsCalculator<'a> {
    calculators: BTreeMap<String, Box<dyn CostCategory + 'a>>,
}

impl<'a> ExternalCostsCalculator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, calculator: impl CostCategory + 'a) {
        self.calculators
            .insert(calculator.tag().to_string(), Box::new(calculator));
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    pub fn evaluate(&self) -> Result<CostReport, CostError> {
        let mut report = CostReport::default();

        for (tag, calculator) in &self.calculators {
            let result = calculator.calc_costs()?;
            debug!(category = %tag, cost_per_vkm = result.cost_per_vkm, "Category evaluated");

            report.total.total_cost_per_vkm += result.cost_per_vkm;
            report.total.total_cost_per_pkm += result.cost_per_pkm;
            report.total.total_cost_per_year += result.cost_per_year;
            report.by_category.insert(tag.clone(), result);
        }

        Ok(report)
    }
}
