use std::collections::BTreeMap;

use serde::Serialize;

use super::types::Summary;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub integral: f64,
    pub fractional: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            integral: 0.5,
            fractional: 0.01,
        }
    }
}

impl Tolerance {
    pub fn for_reference(&self, expected: f64) -> f64 {
        if expected.fract() == 0.0 {
            self.integral
        } else {
            self.fractional
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRow {
    pub key: String,
    pub expected: f64,
    pub computed: f64,
    pub difference: f64,
    pub tolerance: f64,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub rows: Vec<ValidationRow>,
    pub skipped: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.rows.iter().all(|row| row.matched)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &ValidationRow> {
        self.rows.iter().filter(|row| !row.matched)
    }
}

/// Compares every reference key the summary knows about. Reference keys
/// outside the summary vocabulary are listed as skipped, never failed.
pub fn validate(
    summary: &Summary,
    reference: &BTreeMap<String, f64>,
    tolerance: Tolerance,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (key, &expected) in reference {
        let Some(computed) = summary.get(key) else {
            report.skipped.push(key.clone());
            continue;
        };

        let allowed = tolerance.for_reference(expected);
        let difference = computed - expected;
        let matched = difference.abs() <= allowed + f64::EPSILON * expected.abs().max(1.0);
        if !matched {
            tracing::warn!(key = key.as_str(), expected, computed, "reference mismatch");
        }
        report.rows.push(ValidationRow {
            key: key.clone(),
            expected,
            computed,
            difference,
            tolerance: allowed,
            matched,
        });
    }

    report
}
