use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("unsupported region `{region}` (supported: {supported})")]
    UnsupportedRegion { region: String, supported: String },
    #[error("invalid entry data: {0}")]
    InvalidEntry(#[source] serde_json::Error),
    #[error("invalid coefficients: {0}")]
    InvalidCoefficients(#[source] serde_json::Error),
}
