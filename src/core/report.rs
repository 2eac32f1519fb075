use serde::Serialize;

use super::engine::percentage_of;
use super::types::Summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCell {
    pub key: &'static str,
    pub amount_cell: &'static str,
    pub percent_cell: Option<&'static str>,
}

const fn cell(
    key: &'static str,
    amount_cell: &'static str,
    percent_cell: Option<&'static str>,
) -> ReportCell {
    ReportCell {
        key,
        amount_cell,
        percent_cell,
    }
}

pub const REPORT_CELLS: [ReportCell; 16] = [
    cell("sales_m3", "D6", None),
    cell("raw_cost", "D10", Some("E10")),
    cell("labor_cost", "D11", Some("E11")),
    cell("repair_cost", "D12", Some("E12")),
    cell("property_tax", "D13", Some("E13")),
    cell("road_occupancy", "D14", Some("E14")),
    cell("depreciation", "D15", Some("E15")),
    cell("other_expenses", "D16", Some("E16")),
    cell("subtotal", "D17", Some("E17")),
    cell("remuneration", "D18", Some("E18")),
    cell("corp_tax", "D19", Some("E19")),
    cell("local_corp_tax", "D20", Some("E20")),
    cell("inhabitant_tax", "D21", Some("E21")),
    cell("business_tax", "D22", Some("E22")),
    cell("total_cost", "D23", Some("E23")),
    cell("unit_yen_per_m3", "D25", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWrite {
    pub cell: &'static str,
    pub key: &'static str,
    pub value: f64,
}

pub fn map_report_cells(summary: &Summary) -> Vec<CellWrite> {
    let mut writes = Vec::with_capacity(REPORT_CELLS.len() * 2);
    for layout in REPORT_CELLS {
        let value = summary.get(layout.key).unwrap_or(0.0);
        writes.push(CellWrite {
            cell: layout.amount_cell,
            key: layout.key,
            value,
        });
        if let Some(percent_cell) = layout.percent_cell {
            writes.push(CellWrite {
                cell: percent_cell,
                key: layout.key,
                value: percentage_of(value, summary.total_cost),
            });
        }
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn every_summary_key_has_a_cell() {
        let mapped: BTreeSet<&str> = REPORT_CELLS.iter().map(|c| c.key).collect();
        let vocabulary: BTreeSet<&str> = Summary::TRACE_KEYS.iter().map(|(k, _)| *k).collect();
        assert_eq!(mapped, vocabulary);

        let mut cells = BTreeSet::new();
        for layout in REPORT_CELLS {
            assert!(cells.insert(layout.amount_cell), "{} reused", layout.amount_cell);
            if let Some(percent) = layout.percent_cell {
                assert!(cells.insert(percent), "{percent} reused");
            }
        }
    }

    #[test]
    fn percent_cells_use_share_of_total() {
        let summary = Summary {
            raw_cost: 250.0,
            total_cost: 1_000.0,
            ..Summary::default()
        };
        let writes = map_report_cells(&summary);
        let get = |cell: &str| writes.iter().find(|w| w.cell == cell).map(|w| w.value);
        assert_eq!(get("D10"), Some(250.0));
        assert_eq!(get("E10"), Some(25.0));
        assert_eq!(get("E23"), Some(100.0));
        assert_eq!(writes.len(), 30);
    }

    #[test]
    fn zero_total_maps_to_zero_percentages() {
        let summary = Summary {
            raw_cost: 250.0,
            ..Summary::default()
        };
        let writes = map_report_cells(&summary);
        assert!(
            writes
                .iter()
                .filter(|w| w.cell.starts_with('E'))
                .all(|w| w.value == 0.0)
        );
    }
}
