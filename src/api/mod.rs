use axum::{
    Router,
    extract::{Json, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    CellWrite, CoefficientSet, ComputationResult, CostError, CostLine, EntryData, Summary,
    Tolerance, TraceNode, ValidationReport, compute_for_region, map_report_cells,
    null_as_default, numeric_or_default, validate,
};

#[derive(Parser, Debug)]
#[command(
    name = "tariff-cost",
    about = "Total cost of service calculator with a step-by-step audit trace"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute one entry file and print the result table
    Compute(ComputeArgs),
    /// Serve the JSON API over HTTP
    Serve(ServeArgs),
    /// List regions with coefficients
    Regions(CoefficientArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct CoefficientArgs {
    #[arg(
        long,
        help = "JSON file of { region: coefficients } merged over the built-in regions"
    )]
    coefficients: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ComputeArgs {
    #[arg(long, help = "Entry data JSON file")]
    entry: PathBuf,
    #[arg(long, help = "Region key; overrides basic.region of the entry")]
    region: Option<String>,
    #[command(flatten)]
    coefficients: CoefficientArgs,
    #[arg(long, help = "JSON file of expected summary values to validate against")]
    reference: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = 0.5,
        help = "Absolute tolerance for integral reference values"
    )]
    tolerance_int: f64,
    #[arg(
        long,
        default_value_t = 0.01,
        help = "Absolute tolerance for fractional reference values"
    )]
    tolerance_float: f64,
    #[arg(long, help = "Print every trace step after the result table")]
    trace: bool,
    #[arg(long, help = "Print the full JSON response instead of text")]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[command(flatten)]
    coefficients: CoefficientArgs,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComputePayload {
    #[serde(deserialize_with = "null_as_default")]
    entry: EntryData,
    region: Option<String>,
    reference: Option<BTreeMap<String, Value>>,
    tolerance_int: Option<f64>,
    tolerance_float: Option<f64>,
}

#[derive(Debug, Clone)]
struct ComputeRequest {
    entry: EntryData,
    region: Option<String>,
    reference: Option<BTreeMap<String, f64>>,
    tolerance: Tolerance,
}

#[derive(Debug, Clone)]
struct ComputeOutcome {
    region: String,
    result: ComputationResult,
    report_cells: Vec<CellWrite>,
    validation: Option<ValidationReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputeResponse<'a> {
    region: &'a str,
    lines: &'a [CostLine],
    summary: &'a Summary,
    trace: &'a [TraceNode],
    report_cells: &'a [CellWrite],
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<&'a ValidationReport>,
}

#[derive(Serialize)]
struct RegionsResponse<'a> {
    regions: Vec<&'a str>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Compute(args) => {
            let set = load_coefficients(&args.coefficients)?;
            let output = run_compute_command(&args, &set)?;
            print!("{output}");
            Ok(())
        }
        Command::Serve(args) => {
            let set = load_coefficients(&args.coefficients)?;
            run_http_server(args.port, set)
                .await
                .map_err(|e| format!("server error: {e}"))
        }
        Command::Regions(args) => {
            let set = load_coefficients(&args)?;
            for region in set.regions() {
                println!("{region}");
            }
            Ok(())
        }
    }
}

fn run_compute_command(args: &ComputeArgs, set: &CoefficientSet) -> Result<String, String> {
    let request = compute_request_from_args(args)?;
    let outcome = execute(request, set).map_err(|e| e.to_string())?;
    if args.json {
        let body = serde_json::to_string_pretty(&outcome.response())
            .map_err(|e| format!("failed to serialize response: {e}"))?;
        Ok(format!("{body}\n"))
    } else {
        Ok(render_text(&outcome, args.trace))
    }
}

fn load_coefficients(args: &CoefficientArgs) -> Result<CoefficientSet, String> {
    let mut set = CoefficientSet::builtin();
    if let Some(path) = &args.coefficients {
        let json = read_file(path)?;
        set.merge_json_str(&json)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            regions = ?set.regions(),
            "loaded coefficient overrides"
        );
    }
    Ok(set)
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn compute_request_from_args(args: &ComputeArgs) -> Result<ComputeRequest, String> {
    let json = read_file(&args.entry)?;
    let entry = EntryData::from_json_str(&json)
        .map_err(|e| format!("{}: {e}", args.entry.display()))?;

    let reference = match &args.reference {
        Some(path) => {
            let json = read_file(path)?;
            let raw = serde_json::from_str::<BTreeMap<String, Value>>(&json)
                .map_err(|e| format!("{}: invalid reference JSON: {e}", path.display()))?;
            Some(build_reference(raw)?)
        }
        None => None,
    };

    Ok(ComputeRequest {
        entry,
        region: args.region.clone(),
        reference,
        tolerance: build_tolerance(args.tolerance_int, args.tolerance_float)?,
    })
}

#[cfg(test)]
fn compute_request_from_json(json: &str) -> Result<ComputeRequest, String> {
    let payload = serde_json::from_str::<ComputePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    compute_request_from_payload(payload)
}

fn compute_request_from_payload(payload: ComputePayload) -> Result<ComputeRequest, String> {
    let defaults = Tolerance::default();
    let tolerance = build_tolerance(
        payload.tolerance_int.unwrap_or(defaults.integral),
        payload.tolerance_float.unwrap_or(defaults.fractional),
    )?;
    let reference = payload.reference.map(build_reference).transpose()?;

    Ok(ComputeRequest {
        entry: payload.entry,
        region: payload.region.filter(|r| !r.trim().is_empty()),
        reference,
        tolerance,
    })
}

fn build_tolerance(integral: f64, fractional: f64) -> Result<Tolerance, String> {
    if !integral.is_finite() || integral < 0.0 {
        return Err("--tolerance-int must be a finite value >= 0".to_string());
    }
    if !fractional.is_finite() || fractional < 0.0 {
        return Err("--tolerance-float must be a finite value >= 0".to_string());
    }
    Ok(Tolerance {
        integral,
        fractional,
    })
}

fn build_reference(raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, f64>, String> {
    raw.into_iter()
        .map(|(key, value)| {
            let number = numeric_or_default(&value, f64::NAN);
            if number.is_nan() {
                Err(format!("reference value for `{key}` is not numeric"))
            } else {
                Ok((key, number))
            }
        })
        .collect()
}

fn execute(request: ComputeRequest, set: &CoefficientSet) -> Result<ComputeOutcome, CostError> {
    let region = request
        .region
        .clone()
        .unwrap_or_else(|| request.entry.basic.region.clone());
    let result = compute_for_region(&request.entry, set, Some(region.as_str()))?;
    let report_cells = map_report_cells(&result.summary);
    let validation = request
        .reference
        .as_ref()
        .map(|reference| validate(&result.summary, reference, request.tolerance));

    Ok(ComputeOutcome {
        region: region.trim().to_lowercase(),
        result,
        report_cells,
        validation,
    })
}

impl ComputeOutcome {
    fn response(&self) -> ComputeResponse<'_> {
        ComputeResponse {
            region: &self.region,
            lines: &self.result.lines,
            summary: &self.result.summary,
            trace: self.result.trace.as_sequence(),
            report_cells: &self.report_cells,
            validation: self.validation.as_ref(),
        }
    }
}

fn render_text(outcome: &ComputeOutcome, show_trace: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total cost of service ({})", outcome.region);
    let _ = writeln!(out, "{:<24} {:>6} {:>18} {:>8}", "Item", "Key", "Amount (yen)", "Share");
    for line in &outcome.result.lines {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>18.0} {:>7.2}%",
            line.label, line.trace_key, line.amount, line.percentage
        );
    }
    let summary = &outcome.result.summary;
    let _ = writeln!(out, "Sales volume: {} m3", summary.sales_m3);
    let _ = writeln!(out, "Unit cost: {:.2} yen/m3", summary.unit_yen_per_m3);

    if show_trace {
        let _ = writeln!(out, "\nTrace");
        for node in outcome.result.trace.as_sequence() {
            let _ = writeln!(
                out,
                "[{}] {} = {} {}",
                node.key, node.title, node.value, node.unit
            );
            let _ = writeln!(out, "    formula: {}", node.formula);
            for (name, value) in &node.inputs {
                let _ = writeln!(out, "    {name} = {value}");
            }
            if !node.notes.is_empty() {
                let _ = writeln!(out, "    note: {}", node.notes);
            }
        }
    }

    if let Some(report) = &outcome.validation {
        let _ = writeln!(out, "\nValidation");
        for row in &report.rows {
            let _ = writeln!(
                out,
                "{:<18} expected {:>16} computed {:>16} {}",
                row.key,
                row.expected,
                row.computed,
                if row.matched { "OK" } else { "MISMATCH" }
            );
        }
        for key in &report.skipped {
            let _ = writeln!(out, "{key:<18} skipped (not a summary key)");
        }
        let _ = writeln!(
            out,
            "Result: {}",
            if report.passed() { "PASS" } else { "FAIL" }
        );
    }

    out
}

pub async fn run_http_server(port: u16, coefficients: CoefficientSet) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(coefficients));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("tariff-cost HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

fn router(coefficients: Arc<CoefficientSet>) -> Router {
    Router::new()
        .route("/api/compute", post(compute_handler))
        .route("/api/regions", get(regions_handler))
        .fallback(not_found_handler)
        .with_state(coefficients)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn regions_handler(State(coefficients): State<Arc<CoefficientSet>>) -> Response {
    let regions = coefficients.regions();
    tracing::info!(count = regions.len(), status = 200, "GET /api/regions");
    json_response(StatusCode::OK, RegionsResponse { regions })
}

async fn compute_handler(
    State(coefficients): State<Arc<CoefficientSet>>,
    Json(payload): Json<ComputePayload>,
) -> Response {
    let request = match compute_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            tracing::warn!(error = msg.as_str(), status = 400, "POST /api/compute rejected");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match execute(request, &coefficients) {
        Ok(outcome) => {
            tracing::info!(
                region = outcome.region.as_str(),
                total_cost = outcome.result.summary.total_cost,
                validated = outcome.validation.is_some(),
                status = 200,
                "POST /api/compute"
            );
            json_response(StatusCode::OK, outcome.response())
        }
        Err(e) => {
            tracing::warn!(error = %e, status = 422, "POST /api/compute failed");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
