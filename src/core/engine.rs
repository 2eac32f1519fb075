use super::coefficients::{CoefficientSet, Coefficients};
use super::error::CostError;
use super::rounding::{round_half_away_from_zero, round0};
use super::trace::{Step, Trace};
use super::types::{ComputationResult, CostLine, EntryData, Summary, Unit};

#[derive(Debug, Clone, Copy)]
struct AssetTotals {
    investment_1: f64,
    investment_2: f64,
    total: f64,
}

#[derive(Debug, Clone, Copy)]
struct LandTotals {
    investment: f64,
    assessed_for_required_area: f64,
}

#[derive(Debug, Clone, Copy)]
struct CorporateTaxes {
    corp_tax: f64,
    local_corp_tax: f64,
    inhabitant_tax: f64,
    total: f64,
}

#[derive(Debug, Clone, Copy)]
struct CostBreakdown {
    raw: f64,
    labor: f64,
    repair: f64,
    property_tax: f64,
    road: f64,
    depreciation: f64,
    other: f64,
    remuneration: f64,
    corporate: f64,
    business_tax: f64,
    total: f64,
}

// An unsupported region fails here, before any step is recorded.
pub fn compute_for_region(
    entry: &EntryData,
    coefficient_set: &CoefficientSet,
    region_override: Option<&str>,
) -> Result<ComputationResult, CostError> {
    let region = region_override.unwrap_or(&entry.basic.region);
    let coefficients = coefficient_set.lookup(region)?;
    let result = compute(entry, coefficients);
    tracing::info!(
        region = region.trim(),
        total_cost = result.summary.total_cost,
        unit_yen_per_m3 = result.summary.unit_yen_per_m3,
        "computed total cost of service"
    );
    Ok(result)
}

/// Runs every step of the cost form in its fixed order. Each value is
/// recorded in the trace before any later step reads it.
pub fn compute(entry: &EntryData, coefficients: &Coefficients) -> ComputationResult {
    let mut trace = Trace::new();

    let sales_m3 = sales_volume(entry, &mut trace);
    let assets = asset_totals(entry, &mut trace);
    let raw = raw_material_cost(entry, coefficients, sales_m3, &mut trace);
    let labor = labor_cost(entry, coefficients, &mut trace);
    let repair = repair_cost(entry, coefficients, assets, &mut trace);
    let depreciation = depreciation(entry, &mut trace);
    let land = land_totals(entry, &mut trace);
    let property_tax = property_tax(coefficients, assets, land, &mut trace);
    let road = road_occupancy(entry, &mut trace);
    let other = other_expenses(
        coefficients,
        [raw, labor, repair, property_tax, road, depreciation],
        &mut trace,
    );
    let subtotal = subtotal(
        [raw, labor, repair, property_tax, road, depreciation, other],
        &mut trace,
    );
    let remuneration = remuneration(coefficients, land, assets, &mut trace);
    let corporate = corporate_taxes(coefficients, remuneration, &mut trace);
    let business_tax = business_tax(coefficients, remuneration, &mut trace);
    let total = total_cost(subtotal, remuneration, corporate.total, business_tax, &mut trace);
    let unit = unit_cost(total, sales_m3, &mut trace);

    let lines = build_lines(CostBreakdown {
        raw,
        labor,
        repair,
        property_tax,
        road,
        depreciation,
        other,
        remuneration,
        corporate: corporate.total,
        business_tax,
        total,
    });

    let summary = Summary {
        raw_cost: raw,
        labor_cost: labor,
        repair_cost: repair,
        property_tax,
        business_tax,
        road_occupancy: road,
        depreciation,
        other_expenses: other,
        subtotal,
        remuneration,
        corp_tax: corporate.corp_tax,
        local_corp_tax: corporate.local_corp_tax,
        inhabitant_tax: corporate.inhabitant_tax,
        total_cost: total,
        sales_m3,
        unit_yen_per_m3: unit,
    };

    ComputationResult {
        lines,
        summary,
        trace,
    }
}

fn sales_volume(entry: &EntryData, trace: &mut Trace) -> f64 {
    let volumes = entry.sales.iter().map(|row| row.volume);
    let step = column_inputs(
        Step::new("A", "Annual sales volume", "SUM(sales.volume)", Unit::CubicMeter),
        "volume",
        volumes.clone(),
    );
    trace.record(step, column_sum(volumes)).value
}

fn asset_totals(entry: &EntryData, trace: &mut Trace) -> AssetTotals {
    let first = entry.assets.iter().map(|row| row.investment_1);
    let second = entry.assets.iter().map(|row| row.investment_2);

    let investment_1 = trace
        .record(
            column_inputs(
                Step::new("B②", "Asset investment ①", "SUM(assets.investment_1)", Unit::Yen),
                "investment_1",
                first.clone(),
            ),
            column_sum(first),
        )
        .value;
    let investment_2 = trace
        .record(
            column_inputs(
                Step::new("B③", "Asset investment ②", "SUM(assets.investment_2)", Unit::Yen),
                "investment_2",
                second.clone(),
            ),
            column_sum(second),
        )
        .value;
    let total = trace
        .record(
            Step::new("B⑦", "Depreciable asset investment", "B② + B③", Unit::Yen)
                .input("B②", investment_1)
                .input("B③", investment_2),
            investment_1 + investment_2,
        )
        .value;

    AssetTotals {
        investment_1,
        investment_2,
        total,
    }
}

fn raw_material_cost(
    entry: &EntryData,
    coefficients: &Coefficients,
    sales_m3: f64,
    trace: &mut Trace,
) -> f64 {
    let yield_ratio = coefficients.yield_m3_per_kg;
    let price = entry.basic.raw_unit_price;
    let (quantity, notes) = if yield_ratio == 0.0 {
        (0.0, "yield ratio is 0; raw-material quantity treated as 0")
    } else {
        (sales_m3 / yield_ratio, "")
    };

    trace
        .record(
            Step::new(
                "C",
                "Raw material cost",
                "ROUND((A / yield_ratio) × raw_unit_price, 0)",
                Unit::Yen,
            )
            .input("A", sales_m3)
            .input("yield_ratio", yield_ratio)
            .input("raw_quantity_kg", quantity)
            .input("raw_unit_price", price)
            .notes(notes),
            round0(quantity * price),
        )
        .value
}

fn labor_cost(entry: &EntryData, coefficients: &Coefficients, trace: &mut Trace) -> f64 {
    let persons = coefficients.persons_per_location_pe * entry.basic.permit_locations;
    trace
        .record(
            Step::new(
                "D",
                "Labor cost",
                "ROUND((persons_per_location × permitted_locations) × labor_rate, 0)",
                Unit::Yen,
            )
            .input("persons_per_location", coefficients.persons_per_location_pe)
            .input("permitted_locations", entry.basic.permit_locations)
            .input("persons", persons)
            .input("labor_rate", coefficients.labor_yen_per_person_year),
            round0(persons * coefficients.labor_yen_per_person_year),
        )
        .value
}

fn repair_cost(
    entry: &EntryData,
    coefficients: &Coefficients,
    assets: AssetTotals,
    trace: &mut Trace,
) -> f64 {
    let rate_sum = column_sum(entry.assets.iter().map(|row| row.repair_rate));

    let (step, value) = if rate_sum > 0.0 {
        let weighted = column_sum(
            entry
                .assets
                .iter()
                .map(|row| row.investment_total() * row.repair_rate),
        );
        let step = Step::new(
            "E",
            "Repair cost",
            "ROUND(Σ((investment_1 + investment_2) × repair_rate), 0)",
            Unit::Yen,
        )
        .input("Σ(investment × repair_rate)", weighted)
        .input("Σ(repair_rate)", rate_sum)
        .notes("per-row repair rates");
        (step, round0(weighted))
    } else {
        let step = Step::new("E", "Repair cost", "ROUND(B⑦ × repair_rate, 0)", Unit::Yen)
            .input("B⑦", assets.total)
            .input("repair_rate", coefficients.repair_rate)
            .notes("no per-row repair rates; default repair rate applied to B⑦");
        (step, round0(assets.total * coefficients.repair_rate))
    };

    trace.record(step, value).value
}

fn depreciation(entry: &EntryData, trace: &mut Trace) -> f64 {
    let weighted = column_sum(
        entry
            .assets
            .iter()
            .map(|row| row.investment_total() * row.depreciation_rate),
    );
    trace
        .record(
            Step::new(
                "I",
                "Depreciation",
                "ROUND(Σ((investment_1 + investment_2) × depreciation_rate), 0)",
                Unit::Yen,
            )
            .input("Σ(investment × depreciation_rate)", weighted),
            round0(weighted),
        )
        .value
}

fn land_totals(entry: &EntryData, trace: &mut Trace) -> LandTotals {
    let zero_area = entry
        .land
        .iter()
        .filter(|parcel| parcel.acquisition_area == 0.0)
        .count();
    let notes = if zero_area > 0 {
        format!("{zero_area} parcel(s) with zero acquisition area valued at 0 per m2")
    } else {
        String::new()
    };

    let priced = column_sum(
        entry
            .land
            .iter()
            .map(|parcel| parcel.unit_price() * parcel.required_area),
    );
    let assessed = column_sum(
        entry
            .land
            .iter()
            .map(|parcel| parcel.unit_assessed_value() * parcel.required_area),
    );
    let required_area = column_sum(entry.land.iter().map(|parcel| parcel.required_area));

    let investment = trace
        .record(
            Step::new(
                "B①",
                "Land investment",
                "ROUND(Σ((acquisition_price / acquisition_area) × required_area), 0)",
                Unit::Yen,
            )
            .input("Σ(unit_price × required_area)", priced)
            .input("required_area", required_area)
            .notes(notes.clone()),
            round0(priced),
        )
        .value;
    let assessed_for_required_area = trace
        .record(
            Step::new(
                "f1",
                "Assessed land value for required area",
                "ROUND(Σ((assessed_value / acquisition_area) × required_area), 0)",
                Unit::Yen,
            )
            .input("Σ(unit_assessed_value × required_area)", assessed)
            .input("required_area", required_area)
            .notes(notes),
            round0(assessed),
        )
        .value;

    LandTotals {
        investment,
        assessed_for_required_area,
    }
}

fn property_tax(
    coefficients: &Coefficients,
    assets: AssetTotals,
    land: LandTotals,
    trace: &mut Trace,
) -> f64 {
    let land_tax = trace
        .record(
            Step::new("F①", "Land property tax", "ROUND(f1 × land_tax_rate, 0)", Unit::Yen)
                .input("f1", land.assessed_for_required_area)
                .input("land_tax_rate", coefficients.land_tax_rate),
            round0(land.assessed_for_required_area * coefficients.land_tax_rate),
        )
        .value;

    let asset_base =
        assets.investment_1 * 0.5 + assets.investment_2 * coefficients.reduction_factor * 0.5;
    let asset_tax = trace
        .record(
            Step::new(
                "F②",
                "Depreciable asset tax",
                "ROUND(((B② × 0.5) + (B③ × reduction_factor × 0.5)) × asset_tax_rate, 0)",
                Unit::Yen,
            )
            .input("B②", assets.investment_1)
            .input("B③", assets.investment_2)
            .input("reduction_factor", coefficients.reduction_factor)
            .input("asset_tax_base", asset_base)
            .input("asset_tax_rate", coefficients.asset_tax_rate),
            round0(asset_base * coefficients.asset_tax_rate),
        )
        .value;

    trace
        .record(
            Step::new("F", "Property tax", "F① + F②", Unit::Yen)
                .input("F①", land_tax)
                .input("F②", asset_tax)
                .notes(format!("land tax {land_tax} + asset tax {asset_tax}")),
            land_tax + asset_tax,
        )
        .value
}

fn road_occupancy(entry: &EntryData, trace: &mut Trace) -> f64 {
    let joint = column_sum(
        entry
            .road
            .iter()
            .map(|row| row.joint_count * row.joint_unit_price),
    );
    let single = column_sum(
        entry
            .road
            .iter()
            .map(|row| row.single_count * row.single_unit_price),
    );
    let fees = column_sum(entry.road.iter().map(|row| row.fee()));

    trace
        .record(
            Step::new(
                "H",
                "Road occupancy",
                "ROUND(Σ(joint_count × joint_price + single_count × single_price), 0)",
                Unit::Yen,
            )
            .input("Σ(joint_count × joint_price)", joint)
            .input("Σ(single_count × single_price)", single),
            round0(fees),
        )
        .value
}

fn other_expenses(coefficients: &Coefficients, base_terms: [f64; 6], trace: &mut Trace) -> f64 {
    let [raw, labor, repair, property_tax, road, depreciation] = base_terms;
    let base = column_sum(base_terms.into_iter());
    trace
        .record(
            Step::new(
                "J",
                "Other expenses",
                "ROUND((C + D + E + F + H + I) × expense_rate, 0)",
                Unit::Yen,
            )
            .input("C", raw)
            .input("D", labor)
            .input("E", repair)
            .input("F", property_tax)
            .input("H", road)
            .input("I", depreciation)
            .input("expense_rate", coefficients.expense_rate),
            round0(base * coefficients.expense_rate),
        )
        .value
}

fn subtotal(terms: [f64; 7], trace: &mut Trace) -> f64 {
    let [raw, labor, repair, property_tax, road, depreciation, other] = terms;
    trace
        .record(
            Step::new("subtotal", "Subtotal", "ROUND(C + D + E + F + H + I + J, 0)", Unit::Yen)
                .input("C", raw)
                .input("D", labor)
                .input("E", repair)
                .input("F", property_tax)
                .input("H", road)
                .input("I", depreciation)
                .input("J", other),
            round0(column_sum(terms.into_iter())),
        )
        .value
}

fn remuneration(
    coefficients: &Coefficients,
    land: LandTotals,
    assets: AssetTotals,
    trace: &mut Trace,
) -> f64 {
    let rate_base = land.investment + assets.total;
    trace
        .record(
            Step::new("L", "Remuneration", "ROUND((B① + B⑦) × remuneration_rate, 0)", Unit::Yen)
                .input("B①", land.investment)
                .input("B⑦", assets.total)
                .input("remuneration_rate", coefficients.remuneration_rate),
            round0(rate_base * coefficients.remuneration_rate),
        )
        .value
}

fn corporate_taxes(
    coefficients: &Coefficients,
    remuneration: f64,
    trace: &mut Trace,
) -> CorporateTaxes {
    let corp_tax = trace
        .record(
            Step::new(
                "K①",
                "Corporate tax",
                "ROUND(L × self_capital_ratio × corp_tax_coeff, 0)",
                Unit::Yen,
            )
            .input("L", remuneration)
            .input("self_capital_ratio", coefficients.self_capital_ratio)
            .input("corp_tax_coeff", coefficients.corp_tax_coeff),
            round0(remuneration * coefficients.self_capital_ratio * coefficients.corp_tax_coeff),
        )
        .value;
    let local_corp_tax = trace
        .record(
            Step::new("K②", "Local corporate tax", "ROUND(K① × local_rate, 0)", Unit::Yen)
                .input("K①", corp_tax)
                .input("local_rate", coefficients.local_corp_tax_rate),
            round0(corp_tax * coefficients.local_corp_tax_rate),
        )
        .value;
    let inhabitant_tax = trace
        .record(
            Step::new("K③", "Inhabitant tax", "ROUND(K① × inhabitant_rate, 0)", Unit::Yen)
                .input("K①", corp_tax)
                .input("inhabitant_rate", coefficients.inhabitant_tax_rate),
            round0(corp_tax * coefficients.inhabitant_tax_rate),
        )
        .value;
    let total = trace
        .record(
            Step::new("K", "Corporate taxes", "K① + K② + K③", Unit::Yen)
                .input("K①", corp_tax)
                .input("K②", local_corp_tax)
                .input("K③", inhabitant_tax)
                .notes(format!(
                    "corporate {corp_tax} + local corporate {local_corp_tax} \
                     + inhabitant {inhabitant_tax}"
                )),
            corp_tax + local_corp_tax + inhabitant_tax,
        )
        .value;

    CorporateTaxes {
        corp_tax,
        local_corp_tax,
        inhabitant_tax,
        total,
    }
}

fn business_tax(coefficients: &Coefficients, remuneration: f64, trace: &mut Trace) -> f64 {
    let rate = coefficients.business_tax_rate;
    let base = remuneration * coefficients.self_capital_ratio;
    let (value, notes) = if rate < 1.0 {
        (round0(base * rate / (1.0 - rate)), "")
    } else {
        (0.0, "business tax rate is 100% or more; G set to 0")
    };

    trace
        .record(
            Step::new(
                "G",
                "Business tax",
                "ROUND((L × self_capital_ratio) × rate / (1 - rate), 0)",
                Unit::Yen,
            )
            .input("L", remuneration)
            .input("self_capital_ratio", coefficients.self_capital_ratio)
            .input("business_tax_base", base)
            .input("business_tax_rate", rate)
            .notes(notes),
            value,
        )
        .value
}

fn total_cost(
    subtotal: f64,
    remuneration: f64,
    corporate: f64,
    business_tax: f64,
    trace: &mut Trace,
) -> f64 {
    trace
        .record(
            Step::new("total", "Total cost of service", "ROUND(subtotal + L + K + G, 0)", Unit::Yen)
                .input("subtotal", subtotal)
                .input("L", remuneration)
                .input("K", corporate)
                .input("G", business_tax),
            round0(subtotal + remuneration + corporate + business_tax),
        )
        .value
}

fn unit_cost(total: f64, sales_m3: f64, trace: &mut Trace) -> f64 {
    let (value, notes) = if sales_m3 != 0.0 {
        (round_half_away_from_zero(total / sales_m3, 2), "")
    } else {
        (0.0, "A is 0; unit cost set to 0")
    };

    trace
        .record(
            Step::new("unit", "Unit cost per m3", "ROUND(total / A, 2)", Unit::YenPerCubicMeter)
                .input("total", total)
                .input("A", sales_m3)
                .notes(notes),
            value,
        )
        .value
}

fn build_lines(costs: CostBreakdown) -> Vec<CostLine> {
    let items = [
        ("Raw material cost", "C", costs.raw),
        ("Labor cost", "D", costs.labor),
        ("Repair cost", "E", costs.repair),
        ("Property tax", "F", costs.property_tax),
        ("Road occupancy", "H", costs.road),
        ("Depreciation", "I", costs.depreciation),
        ("Other expenses", "J", costs.other),
        ("Remuneration", "L", costs.remuneration),
        ("Corporate taxes", "K", costs.corporate),
        ("Business tax", "G", costs.business_tax),
        ("Total cost of service", "total", costs.total),
    ];

    items
        .into_iter()
        .map(|(label, trace_key, amount)| CostLine {
            label,
            trace_key,
            amount,
            percentage: percentage_of(amount, costs.total),
        })
        .collect()
}

fn column_sum(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, value| acc + value)
}

// Records each summed cell as `column[row]`.
fn column_inputs(step: Step, column: &str, values: impl Iterator<Item = f64>) -> Step {
    values
        .enumerate()
        .fold(step, |step, (row, value)| step.input(format!("{column}[{row}]"), value))
}

pub(crate) fn percentage_of(amount: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { amount / total * 100.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AssetRow, LandParcel, RoadRow, SalesRow};
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_coefficients() -> Coefficients {
        Coefficients {
            yield_m3_per_kg: 0.5,
            labor_yen_per_person_year: 5_000_000.0,
            persons_per_location_pe: 0.01,
            repair_rate: 0.03,
            expense_rate: 0.1,
            land_tax_rate: 0.017,
            asset_tax_rate: 0.014,
            reduction_factor: 0.46,
            remuneration_rate: 0.03,
            self_capital_ratio: 0.35,
            corp_tax_coeff: 0.3,
            local_corp_tax_rate: 0.1,
            inhabitant_tax_rate: 0.07,
            business_tax_rate: 0.01,
        }
    }

    fn single_sales_entry() -> EntryData {
        let mut entry = EntryData::default();
        entry.basic.region = "kanto".to_string();
        entry.basic.permit_locations = 100.0;
        entry.basic.raw_unit_price = 100.0;
        entry.sales.push(SalesRow {
            demand: "standard".to_string(),
            volume: 1000.0,
        });
        entry
    }

    fn populated_entry() -> EntryData {
        let mut entry = EntryData::default();
        entry.basic.region = "kanto".to_string();
        entry.basic.permit_locations = 250.0;
        entry.basic.raw_unit_price = 120.0;
        entry.sales = vec![
            SalesRow {
                demand: "standard".to_string(),
                volume: 30_000.0,
            },
            SalesRow {
                demand: "commercial".to_string(),
                volume: 4_500.5,
            },
        ];
        entry.assets = vec![
            AssetRow {
                name: "mains".to_string(),
                investment_1: 1_000_000.0,
                investment_2: 200_000.0,
                depreciation_rate: 0.1,
                repair_rate: 0.02,
            },
            AssetRow {
                name: "meters".to_string(),
                investment_1: 500_000.0,
                investment_2: 0.0,
                depreciation_rate: 0.05,
                repair_rate: 0.0,
            },
        ];
        entry.land = vec![LandParcel {
            acquisition_area: 200.0,
            acquisition_price: 3_000_000.0,
            assessed_value: 2_000_000.0,
            required_area: 150.0,
        }];
        entry.road = vec![RoadRow {
            joint_count: 10.0,
            joint_unit_price: 500.0,
            single_count: 20.0,
            single_unit_price: 300.0,
        }];
        entry
    }

    fn node_value(result: &ComputationResult, key: &str) -> f64 {
        result
            .trace
            .find(key)
            .unwrap_or_else(|| panic!("missing trace node {key}"))
            .value
    }

    fn assert_result_invariants(result: &ComputationResult) {
        let summary = &result.summary;
        for (summary_key, trace_key) in Summary::TRACE_KEYS {
            let node = result
                .trace
                .find(trace_key)
                .unwrap_or_else(|| panic!("{summary_key} has no trace node {trace_key}"));
            assert_eq!(Some(node.value), summary.get(summary_key), "{summary_key}");
        }
        for line in &result.lines {
            assert_eq!(node_value(result, line.trace_key), line.amount, "{}", line.label);
        }

        let components = summary.subtotal
            + summary.remuneration
            + summary.corp_tax_total()
            + summary.business_tax;
        assert_eq!(summary.total_cost, components);

        let (total_row, items) = result.lines.split_last().expect("lines present");
        assert_eq!(total_row.amount, summary.total_cost);
        if summary.total_cost != 0.0 {
            let pct: f64 = items.iter().map(|line| line.percentage).sum();
            assert!((pct - 100.0).abs() <= 1e-6, "percentages sum to {pct}");
            assert_approx(total_row.percentage, 100.0);
        } else {
            assert!(result.lines.iter().all(|line| line.percentage == 0.0));
        }
    }

    #[test]
    fn oracle_single_sales_row_with_expense_rate() {
        let result = compute(&single_sales_entry(), &sample_coefficients());
        let s = &result.summary;

        assert_eq!(s.sales_m3, 1000.0);
        assert_eq!(s.raw_cost, 200_000.0);
        assert_eq!(s.labor_cost, 5_000_000.0);
        assert_eq!(s.repair_cost, 0.0);
        assert_eq!(s.depreciation, 0.0);
        assert_eq!(s.property_tax, 0.0);
        assert_eq!(s.road_occupancy, 0.0);
        assert_eq!(s.other_expenses, 520_000.0);
        assert_eq!(s.subtotal, 5_720_000.0);
        assert_eq!(s.remuneration, 0.0);
        assert_eq!(s.corp_tax_total(), 0.0);
        assert_eq!(s.business_tax, 0.0);
        assert_eq!(s.total_cost, 5_720_000.0);
        assert_eq!(s.unit_yen_per_m3, 5720.0);
        assert_result_invariants(&result);
    }

    #[test]
    fn oracle_single_sales_row_without_expense_rate() {
        let mut coefficients = sample_coefficients();
        coefficients.expense_rate = 0.0;
        let result = compute(&single_sales_entry(), &coefficients);
        let s = &result.summary;

        assert_eq!(s.raw_cost, 200_000.0);
        assert_eq!(s.labor_cost, 5_000_000.0);
        assert_eq!(s.other_expenses, 0.0);
        assert_eq!(s.subtotal, 5_200_000.0);
        assert_eq!(s.remuneration, 0.0);
        assert_eq!(node_value(&result, "K"), 0.0);
        assert_eq!(s.business_tax, 0.0);
        assert_eq!(s.total_cost, 5_200_000.0);
        assert_eq!(s.unit_yen_per_m3, 5200.0);
    }

    #[test]
    fn oracle_populated_entry_matches_hand_calculation() {
        let result = compute(&populated_entry(), &sample_coefficients());
        let s = &result.summary;

        assert_eq!(s.sales_m3, 34_500.5);
        assert_eq!(node_value(&result, "B②"), 1_500_000.0);
        assert_eq!(node_value(&result, "B③"), 200_000.0);
        assert_eq!(node_value(&result, "B⑦"), 1_700_000.0);
        assert_eq!(s.raw_cost, 8_280_120.0);
        assert_eq!(s.labor_cost, 12_500_000.0);
        assert_eq!(s.repair_cost, 24_000.0);
        assert_eq!(s.depreciation, 145_000.0);
        assert_eq!(node_value(&result, "B①"), 2_250_000.0);
        assert_eq!(node_value(&result, "f1"), 1_500_000.0);
        assert_eq!(node_value(&result, "F①"), 25_500.0);
        assert_eq!(node_value(&result, "F②"), 11_144.0);
        assert_eq!(s.property_tax, 36_644.0);
        assert_eq!(s.road_occupancy, 11_000.0);
        assert_eq!(s.other_expenses, 2_099_676.0);
        assert_eq!(s.subtotal, 23_096_440.0);
        assert_eq!(s.remuneration, 118_500.0);
        // 118500 × 0.35 × 0.3 = 12442.5 exactly; the tie rounds up.
        assert_eq!(s.corp_tax, 12_443.0);
        assert_eq!(s.local_corp_tax, 1_244.0);
        assert_eq!(s.inhabitant_tax, 871.0);
        assert_eq!(node_value(&result, "K"), 14_558.0);
        assert_eq!(s.business_tax, 419.0);
        assert_eq!(s.total_cost, 23_229_917.0);
        assert_eq!(s.unit_yen_per_m3, 673.32);
        assert_result_invariants(&result);
    }

    #[test]
    fn column_sums_record_every_summed_cell() {
        let result = compute(&populated_entry(), &sample_coefficients());

        let sales = result.trace.find("A").expect("A recorded");
        assert_eq!(sales.inputs.len(), 2);
        assert_eq!(sales.inputs.get("volume[0]"), Some(&30_000.0));
        assert_eq!(sales.inputs.get("volume[1]"), Some(&4_500.5));

        let first = result.trace.find("B②").expect("B② recorded");
        assert_eq!(first.inputs.get("investment_1[0]"), Some(&1_000_000.0));
        assert_eq!(first.inputs.get("investment_1[1]"), Some(&500_000.0));
        let second = result.trace.find("B③").expect("B③ recorded");
        assert_eq!(second.inputs.get("investment_2[0]"), Some(&200_000.0));
        assert_eq!(second.inputs.get("investment_2[1]"), Some(&0.0));

        let empty = compute(&EntryData::default(), &sample_coefficients());
        assert!(empty.trace.find("A").expect("A recorded").inputs.is_empty());
    }

    #[test]
    fn trace_follows_form_order() {
        let result = compute(&populated_entry(), &sample_coefficients());
        let keys: Vec<&str> = result
            .trace
            .as_sequence()
            .iter()
            .map(|node| node.key.as_str())
            .collect();
        assert_eq!(
            keys,
            [
                "A", "B②", "B③", "B⑦", "C", "D", "E", "I", "B①", "f1", "F①", "F②", "F", "H",
                "J", "subtotal", "L", "K①", "K②", "K③", "K", "G", "total", "unit"
            ]
        );
    }

    #[test]
    fn repair_cost_uses_per_row_rates_when_present() {
        let result = compute(&populated_entry(), &sample_coefficients());
        let node = result.trace.find("E").expect("E recorded");
        assert_eq!(node.notes, "per-row repair rates");
        assert_eq!(node.value, 24_000.0);
    }

    #[test]
    fn repair_cost_falls_back_to_default_rate_when_rows_have_none() {
        let mut entry = populated_entry();
        for row in &mut entry.assets {
            row.repair_rate = 0.0;
        }
        let result = compute(&entry, &sample_coefficients());
        let node = result.trace.find("E").expect("E recorded");
        assert!(node.notes.contains("default repair rate"));
        // B⑦ 1,700,000 × 0.03
        assert_eq!(node.value, 51_000.0);
        assert_eq!(node.inputs.get("B⑦"), Some(&1_700_000.0));
    }

    #[test]
    fn zero_yield_ratio_means_zero_raw_quantity() {
        let mut coefficients = sample_coefficients();
        coefficients.yield_m3_per_kg = 0.0;
        let result = compute(&single_sales_entry(), &coefficients);
        assert_eq!(result.summary.raw_cost, 0.0);
        let node = result.trace.find("C").expect("C recorded");
        assert_eq!(node.inputs.get("raw_quantity_kg"), Some(&0.0));
        assert!(node.notes.contains("yield ratio is 0"));
    }

    #[test]
    fn zero_sales_volume_gives_zero_unit_cost() {
        let mut entry = populated_entry();
        entry.sales.clear();
        let result = compute(&entry, &sample_coefficients());
        assert_eq!(result.summary.sales_m3, 0.0);
        assert_eq!(result.summary.unit_yen_per_m3, 0.0);
        assert!(result.summary.total_cost > 0.0);
        assert!(result.trace.find("unit").expect("unit recorded").notes.contains("A is 0"));
    }

    #[test]
    fn full_business_tax_rate_gives_zero_business_tax() {
        let mut coefficients = sample_coefficients();
        coefficients.business_tax_rate = 1.0;
        let result = compute(&populated_entry(), &coefficients);
        assert_eq!(result.summary.business_tax, 0.0);
        assert!(result.trace.find("G").expect("G recorded").notes.contains("100%"));
        assert_result_invariants(&result);
    }

    #[test]
    fn zero_acquisition_area_values_parcel_at_zero() {
        let mut entry = populated_entry();
        entry.land.push(LandParcel {
            acquisition_area: 0.0,
            acquisition_price: 9_000_000.0,
            assessed_value: 9_000_000.0,
            required_area: 50.0,
        });
        let result = compute(&entry, &sample_coefficients());
        assert_eq!(node_value(&result, "B①"), 2_250_000.0);
        assert_eq!(node_value(&result, "f1"), 1_500_000.0);
        let land_node = result.trace.find("B①").expect("B① recorded");
        assert!(land_node.notes.contains("zero acquisition area"));
    }

    #[test]
    fn empty_entry_yields_zero_total_and_zero_percentages() {
        let result = compute(&EntryData::default(), &sample_coefficients());
        assert_eq!(result.summary, Summary::default());
        assert_eq!(result.lines.len(), 11);
        assert_result_invariants(&result);
    }

    #[test]
    fn compute_for_region_rejects_unknown_region_before_running() {
        let mut entry = populated_entry();
        entry.basic.region = "atlantis".to_string();
        let err = compute_for_region(&entry, &CoefficientSet::builtin(), None)
            .expect_err("unknown region must fail");
        assert!(err.to_string().contains("atlantis"));

        let result = compute_for_region(&entry, &CoefficientSet::builtin(), Some("Kanto"))
            .expect("override selects a supported region");
        assert_result_invariants(&result);
    }

    #[test]
    fn compute_for_region_uses_set_coefficients() {
        let mut set = CoefficientSet::builtin();
        set.insert("test", sample_coefficients());
        let mut entry = single_sales_entry();
        entry.basic.region = "TEST".to_string();
        let result = compute_for_region(&entry, &set, None).expect("test region registered");
        assert_eq!(result.summary.total_cost, 5_720_000.0);
    }

    #[test]
    fn percentage_of_zero_total_is_zero() {
        assert_eq!(percentage_of(10.0, 0.0), 0.0);
        assert_approx(percentage_of(25.0, 200.0), 12.5);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_compute_is_deterministic_and_fully_traced(
            volumes in vec(0u32..200_000, 0..4),
            assets in vec((0u32..5_000_000, 0u32..2_000_000, 0u32..2_000, 0u32..500), 0..5),
            parcels in vec((0u32..2_000, 0u32..50_000_000, 0u32..40_000_000, 0u32..2_000), 0..3),
            roads in vec((0u32..200, 0u32..3_000, 0u32..200, 0u32..3_000), 0..3),
            permit_locations in 0u32..2_000,
            raw_unit_price in 0u32..400,
            yield_bp in 0u32..10_000,
            business_bp in 0u32..10_001,
            expense_bp in 0u32..3_000
        ) {
            let mut entry = EntryData::default();
            entry.basic.permit_locations = permit_locations as f64;
            entry.basic.raw_unit_price = raw_unit_price as f64;
            entry.sales = volumes
                .iter()
                .map(|v| SalesRow { demand: "standard".to_string(), volume: *v as f64 / 10.0 })
                .collect();
            entry.assets = assets
                .iter()
                .map(|(a, b, dep, rep)| AssetRow {
                    name: String::new(),
                    investment_1: *a as f64,
                    investment_2: *b as f64,
                    depreciation_rate: *dep as f64 / 10_000.0,
                    repair_rate: *rep as f64 / 10_000.0,
                })
                .collect();
            entry.land = parcels
                .iter()
                .map(|(area, price, assessed, required)| LandParcel {
                    acquisition_area: *area as f64,
                    acquisition_price: *price as f64,
                    assessed_value: *assessed as f64,
                    required_area: *required as f64,
                })
                .collect();
            entry.road = roads
                .iter()
                .map(|(jc, jp, sc, sp)| RoadRow {
                    joint_count: *jc as f64,
                    joint_unit_price: *jp as f64,
                    single_count: *sc as f64,
                    single_unit_price: *sp as f64,
                })
                .collect();

            let mut coefficients = sample_coefficients();
            coefficients.yield_m3_per_kg = yield_bp as f64 / 10_000.0;
            coefficients.business_tax_rate = business_bp as f64 / 10_000.0;
            coefficients.expense_rate = expense_bp as f64 / 10_000.0;

            let first = compute(&entry, &coefficients);
            let second = compute(&entry, &coefficients);
            prop_assert_eq!(&first, &second);
            assert_result_invariants(&first);

            let unit = first.summary.unit_yen_per_m3;
            prop_assert!(unit.is_finite());
            prop_assert_eq!(unit, round_half_away_from_zero(unit, 2));
            for node in first.trace.as_sequence() {
                prop_assert!(node.value.is_finite(), "{} is not finite", node.key);
            }
        }
    }
}
