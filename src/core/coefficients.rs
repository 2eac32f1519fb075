use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::CostError;

// Rates are fractions (0.03 = 3%).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Coefficients {
    pub yield_m3_per_kg: f64,
    pub labor_yen_per_person_year: f64,
    pub persons_per_location_pe: f64,
    pub repair_rate: f64,
    pub expense_rate: f64,
    pub land_tax_rate: f64,
    pub asset_tax_rate: f64,
    pub reduction_factor: f64,
    pub remuneration_rate: f64,
    pub self_capital_ratio: f64,
    pub corp_tax_coeff: f64,
    pub local_corp_tax_rate: f64,
    pub inhabitant_tax_rate: f64,
    pub business_tax_rate: f64,
}

pub const DEFAULT_REGION: &str = "kanto";

const KANTO: Coefficients = Coefficients {
    yield_m3_per_kg: 0.482,
    labor_yen_per_person_year: 5_880_000.0,
    persons_per_location_pe: 0.0068,
    repair_rate: 0.0188,
    expense_rate: 0.1137,
    land_tax_rate: 0.017,
    asset_tax_rate: 0.014,
    reduction_factor: 0.46,
    remuneration_rate: 0.0326,
    self_capital_ratio: 0.35,
    corp_tax_coeff: 0.232,
    local_corp_tax_rate: 0.103,
    inhabitant_tax_rate: 0.07,
    business_tax_rate: 0.0105,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSet {
    regions: BTreeMap<String, Coefficients>,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CoefficientSet {
    pub fn builtin() -> Self {
        Self {
            regions: BTreeMap::from([(DEFAULT_REGION.to_string(), KANTO)]),
        }
    }

    pub fn insert(&mut self, region: &str, coefficients: Coefficients) {
        self.regions.insert(normalize_region(region), coefficients);
    }

    /// Merges `{ "<region>": { ...coefficients } }` over the current set.
    pub fn merge_json_str(&mut self, json: &str) -> Result<(), CostError> {
        let overrides: BTreeMap<String, Coefficients> =
            serde_json::from_str(json).map_err(CostError::InvalidCoefficients)?;
        for (region, coefficients) in overrides {
            self.insert(&region, coefficients);
        }
        Ok(())
    }

    pub fn lookup(&self, region: &str) -> Result<&Coefficients, CostError> {
        self.regions
            .get(&normalize_region(region))
            .ok_or_else(|| CostError::UnsupportedRegion {
                region: region.trim().to_string(),
                supported: self.regions().join(", "),
            })
    }

    pub fn regions(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }
}

fn normalize_region(region: &str) -> String {
    region.trim().to_lowercase()
}
