use serde::{Deserialize, Serialize};
use thiserror::Error;

use bomwright_models::InvariantViolation;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BomwrightError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Pricing error: {field} - {message}")]
    Pricing { field: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl BomwrightError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn pricing(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pricing {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Pricing { .. } => "PRICING_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Pricing { .. } => 422,
            Self::NotFound { .. } => 404,
            Self::Parse { .. } => 400,
            Self::Storage { .. } => 503,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Errors a caller can fix by changing one row or one input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }
}

pub type BomwrightResult<T> = Result<T, BomwrightError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<BomwrightError> for ErrorResponse {
    fn from(error: BomwrightError) -> Self {
        let details = match &error {
            BomwrightError::Validation { field, .. } | BomwrightError::Pricing { field, .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        Self {
            error: error.error_code().to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            details,
        }
    }
}

impl From<InvariantViolation> for BomwrightError {
    fn from(violation: InvariantViolation) -> Self {
        Self::validation(violation.field, violation.message)
    }
}

// Conversion from common error types
impl From<sqlx::Error> for BomwrightError {
    fn from(error: sqlx::Error) -> Self {
        Self::storage(error.to_string())
    }
}

impl From<serde_json::Error> for BomwrightError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<csv::Error> for BomwrightError {
    fn from(error: csv::Error) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<config::ConfigError> for BomwrightError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration {
            message: error.to_string(),
        }
    }
}
