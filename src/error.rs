use serde::Serialize;
use thiserror::Error;

// Errors raised by the calculation components. Every kind aborts the
// current pipeline run; advisories below never do.
#[derive(Error, Debug)]
pub enum HydroError {
    #[error("{parameter} = {value} is out of range: {reason}")]
    Domain {
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("{method} requires `{field}`")]
    MissingParameter {
        method: &'static str,
        field: &'static str,
    },

    #[error("invalid table `{name}`: {reason}")]
    InvalidTable { name: String, reason: String },

    #[error("unknown {kind} `{name}` in reference data")]
    UnknownReference { kind: &'static str, name: String },

    #[error("reference data parse error: {0}")]
    ReferenceData(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HydroError>;

impl HydroError {
    pub(crate) fn domain(parameter: &'static str, value: f64, reason: &'static str) -> Self {
        HydroError::Domain {
            parameter,
            value,
            reason,
        }
    }

    pub(crate) fn missing(method: &'static str, field: &'static str) -> Self {
        HydroError::MissingParameter { method, field }
    }
}

// Fails with a domain error unless `value > 0` (and finite).
pub(crate) fn require_positive(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(HydroError::domain(parameter, value, "must be > 0"))
    }
}

// Runoff coefficients live in (0, 1].
pub(crate) fn require_coefficient(parameter: &'static str, value: f64) -> Result<f64> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(HydroError::domain(parameter, value, "must lie in (0, 1]"))
    }
}

/// A non-fatal note that an input sits outside a method's recommended
/// envelope. The computation still completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub component: &'static str,
    pub message: String,
}

impl Advisory {
    pub(crate) fn new(component: &'static str, message: String) -> Self {
        Advisory { component, message }
    }

    pub(crate) fn log(&self) {
        tracing::warn!(component = self.component, "{}", self.message);
    }
}
