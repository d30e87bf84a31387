use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub pricing: PricingConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub sqlite_url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Master files looked for at start-up when the catalog is empty.
    pub master_file_candidates: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
    /// Field delimiter for delimited-text sources.
    pub csv_delimiter: char,
    /// Open review sessions unused for this long are dropped.
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: String,
    /// Digits of the currency's minor unit; line amounts round to this scale.
    pub minor_unit_digits: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub enabled: bool,
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub prometheus_namespace: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("BOMWRIGHT").separator("__"));

        config.build()?.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_request_size: 16 * 1024 * 1024, // 16MB
                timeout_seconds: 30,
            },
            database: DatabaseConfig {
                sqlite_url: "sqlite://parts_bom.db".to_string(),
                max_connections: 5,
                connection_timeout_seconds: 30,
            },
            import: ImportConfig {
                master_file_candidates: vec![
                    "parts_master.xlsx".to_string(),
                    "parts_master.csv".to_string(),
                ],
                allowed_extensions: vec![
                    "csv".to_string(),
                    "tsv".to_string(),
                    "txt".to_string(),
                    "xlsx".to_string(),
                    "xls".to_string(),
                ],
                max_file_size: 10 * 1024 * 1024,
                csv_delimiter: ',',
                session_ttl_seconds: 60 * 60,
            },
            pricing: PricingConfig {
                currency: "JPY".to_string(),
                minor_unit_digits: 2,
            },
            backup: BackupConfig {
                enabled: true,
                directory: "_db_backups".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                file_path: None,
            },
            monitoring: MonitoringConfig {
                metrics_enabled: true,
                prometheus_namespace: "bomwright".to_string(),
            },
        }
    }
}
