pub mod config;
pub mod logging;
pub mod error;
pub mod validation;
pub mod import;
pub mod pricing;

pub use config::*;
pub use logging::*;
pub use error::*;
pub use validation::*;
pub use import::*;
pub use pricing::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loading() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pricing.minor_unit_digits, 2);
        assert_eq!(config.backup.directory, "_db_backups");
    }

    #[test]
    fn test_error_handling() {
        let error = BomwrightError::validation("partNo", "missing partNo");
        assert_eq!(error.error_code(), "VALIDATION_ERROR");
        assert_eq!(error.http_status_code(), 400);
        assert!(error.is_recoverable());

        let error = BomwrightError::storage("database is locked");
        assert_eq!(error.http_status_code(), 503);
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_error_response_carries_field() {
        let response = ErrorResponse::from(BomwrightError::pricing("capacityKWh", "capacityKWh is required"));
        assert_eq!(response.code, "PRICING_ERROR");
        assert_eq!(response.details, Some(serde_json::json!({ "field": "capacityKWh" })));
    }
}
