use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid input: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(
        "Infeasible weight bounds: {assets} assets cannot sum to 1 within [{min_weight}, {max_weight}]"
    )]
    InfeasibleBounds {
        assets: usize,
        min_weight: f64,
        max_weight: f64,
    },

    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Insufficient price history for {ticker}: {observations} observations, {required} required")]
    InsufficientHistory {
        ticker: String,
        observations: usize,
        required: usize,
    },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Singular matrix in {context}")]
    SingularMatrix { context: String },

    #[error("Matrix is not positive semi-definite in {context}")]
    NotPositiveSemiDefinite { context: String },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Computation timeout: {operation} exceeded its {budget_ms}ms budget after {elapsed_ms}ms")]
    ComputationTimeout {
        operation: String,
        elapsed_ms: u64,
        budget_ms: u64,
    },

    #[error("Computation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Data,
    Numerical,
    Timeout,
    Serialization,
}

impl AnalyticsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyticsError::Validation { .. } | AnalyticsError::InfeasibleBounds { .. } => {
                ErrorKind::Validation
            }
            AnalyticsError::UnknownTicker(_)
            | AnalyticsError::InsufficientHistory { .. }
            | AnalyticsError::Data(_) => ErrorKind::Data,
            AnalyticsError::SingularMatrix { .. }
            | AnalyticsError::NotPositiveSemiDefinite { .. }
            | AnalyticsError::Numerical(_) => ErrorKind::Numerical,
            AnalyticsError::ComputationTimeout { .. } | AnalyticsError::Cancelled { .. } => {
                ErrorKind::Timeout
            }
            AnalyticsError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::Serialization(e.to_string())
    }
}

/// Failure payload handed to the presentation layer in place of a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&AnalyticsError> for ErrorResponse {
    fn from(e: &AnalyticsError) -> Self {
        ErrorResponse {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let e = AnalyticsError::InfeasibleBounds {
            assets: 3,
            min_weight: 0.4,
            max_weight: 0.5,
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(
            AnalyticsError::UnknownTicker("ZZZ".into()).kind(),
            ErrorKind::Data
        );
        assert_eq!(
            AnalyticsError::SingularMatrix {
                context: "posterior".into()
            }
            .kind(),
            ErrorKind::Numerical
        );
        assert_eq!(
            AnalyticsError::Cancelled {
                operation: "heston".into()
            }
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_error_response_shape() {
        let e = AnalyticsError::validation("weights", "must sum to 1");
        let json = serde_json::to_value(ErrorResponse::from(&e)).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["error"], "Invalid input: weights: must sum to 1");
    }
}
