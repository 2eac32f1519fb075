use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CostError;
use super::rounding::{lenient_number, lenient_rows, lenient_text, null_as_default};
use super::trace::Trace;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicParams {
    #[serde(deserialize_with = "lenient_text")]
    pub region: String,
    #[serde(deserialize_with = "lenient_number")]
    pub permit_locations: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub raw_unit_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SalesRow {
    #[serde(deserialize_with = "lenient_text")]
    pub demand: String,
    #[serde(deserialize_with = "lenient_number")]
    pub volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LandParcel {
    #[serde(deserialize_with = "lenient_number")]
    pub acquisition_area: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub acquisition_price: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub assessed_value: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub required_area: f64,
}

impl LandParcel {
    pub fn unit_price(&self) -> f64 {
        per_area(self.acquisition_price, self.acquisition_area)
    }

    pub fn unit_assessed_value(&self) -> f64 {
        per_area(self.assessed_value, self.acquisition_area)
    }
}

fn per_area(amount: f64, area: f64) -> f64 {
    if area == 0.0 { 0.0 } else { amount / area }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetRow {
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(deserialize_with = "lenient_number")]
    pub investment_1: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub investment_2: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub depreciation_rate: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub repair_rate: f64,
}

impl AssetRow {
    pub fn investment_total(&self) -> f64 {
        self.investment_1 + self.investment_2
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoadRow {
    #[serde(deserialize_with = "lenient_number")]
    pub joint_count: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub joint_unit_price: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub single_count: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub single_unit_price: f64,
}

impl RoadRow {
    pub fn fee(&self) -> f64 {
        self.joint_count * self.joint_unit_price + self.single_count * self.single_unit_price
    }
}

// Absent or null tables are empty and absent columns read as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryData {
    #[serde(deserialize_with = "null_as_default")]
    pub basic: BasicParams,
    #[serde(deserialize_with = "lenient_rows")]
    pub sales: Vec<SalesRow>,
    #[serde(deserialize_with = "lenient_rows")]
    pub land: Vec<LandParcel>,
    #[serde(deserialize_with = "lenient_rows")]
    pub assets: Vec<AssetRow>,
    #[serde(deserialize_with = "lenient_rows")]
    pub road: Vec<RoadRow>,
}

impl EntryData {
    pub fn from_json_str(json: &str) -> Result<Self, CostError> {
        serde_json::from_str(json).map_err(CostError::InvalidEntry)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Unit {
    #[serde(rename = "yen")]
    Yen,
    #[serde(rename = "m3")]
    CubicMeter,
    #[serde(rename = "yen/m3")]
    YenPerCubicMeter,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Yen => "yen",
            Unit::CubicMeter => "m3",
            Unit::YenPerCubicMeter => "yen/m3",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub label: &'static str,
    pub trace_key: &'static str,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub raw_cost: f64,
    pub labor_cost: f64,
    pub repair_cost: f64,
    pub property_tax: f64,
    pub business_tax: f64,
    pub road_occupancy: f64,
    pub depreciation: f64,
    pub other_expenses: f64,
    pub subtotal: f64,
    pub remuneration: f64,
    pub corp_tax: f64,
    pub local_corp_tax: f64,
    pub inhabitant_tax: f64,
    pub total_cost: f64,
    pub sales_m3: f64,
    pub unit_yen_per_m3: f64,
}

impl Summary {
    /// Summary key and the trace key of the step that derived it.
    pub const TRACE_KEYS: [(&'static str, &'static str); 16] = [
        ("raw_cost", "C"),
        ("labor_cost", "D"),
        ("repair_cost", "E"),
        ("property_tax", "F"),
        ("business_tax", "G"),
        ("road_occupancy", "H"),
        ("depreciation", "I"),
        ("other_expenses", "J"),
        ("subtotal", "subtotal"),
        ("remuneration", "L"),
        ("corp_tax", "K①"),
        ("local_corp_tax", "K②"),
        ("inhabitant_tax", "K③"),
        ("total_cost", "total"),
        ("sales_m3", "A"),
        ("unit_yen_per_m3", "unit"),
    ];

    pub fn get(&self, key: &str) -> Option<f64> {
        let value = match key {
            "raw_cost" => self.raw_cost,
            "labor_cost" => self.labor_cost,
            "repair_cost" => self.repair_cost,
            "property_tax" => self.property_tax,
            "business_tax" => self.business_tax,
            "road_occupancy" => self.road_occupancy,
            "depreciation" => self.depreciation,
            "other_expenses" => self.other_expenses,
            "subtotal" => self.subtotal,
            "remuneration" => self.remuneration,
            "corp_tax" => self.corp_tax,
            "local_corp_tax" => self.local_corp_tax,
            "inhabitant_tax" => self.inhabitant_tax,
            "total_cost" => self.total_cost,
            "sales_m3" => self.sales_m3,
            "unit_yen_per_m3" => self.unit_yen_per_m3,
            _ => return None,
        };
        Some(value)
    }

    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        Self::TRACE_KEYS
            .iter()
            .filter_map(|(key, _)| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    pub fn corp_tax_total(&self) -> f64 {
        self.corp_tax + self.local_corp_tax + self.inhabitant_tax
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationResult {
    pub lines: Vec<CostLine>,
    pub summary: Summary,
    pub trace: Trace,
}
