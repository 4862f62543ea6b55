use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::regions::RegionInfo;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Emit per-step routing traces (target `ROUTER::TRACE`)
    #[serde(default)]
    pub enable_tracing: bool,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub legacy: LegacyConfig,
    /// Read by callers only; the router never prices anything
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Regions hosted by this process (consulted by the loopback guard)
    #[serde(default)]
    pub regions: Vec<RegionInfo>,
}

/// Local ledger (wallet REST API) settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    pub enabled: bool,
    /// Base URL ending with `/`; account ids are appended directly
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub payment_method: String,
    pub timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            payment_method: "opensim".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Legacy money server settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LegacyConfig {
    /// Money server endpoint; may point back at this process
    #[serde(default)]
    pub server_url: Option<String>,
    /// Refuse legacy calls to endpoints that are not this process
    pub disable_external: bool,
    pub timeout_ms: u64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            disable_external: false,
            timeout_ms: 10_000,
        }
    }
}

/// Per-unit prices surfaced to callers (uploads, group creation, land, ...)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PricingConfig {
    pub energy_unit: i32,
    pub object_claim: i32,
    pub public_object_decay: i32,
    pub public_object_delete: i32,
    pub parcel_claim: i32,
    pub parcel_claim_factor: f32,
    pub upload: i32,
    pub rent_light: i32,
    pub object_rent: f32,
    pub object_scale_factor: f32,
    pub parcel_rent: i32,
    pub group_create: i32,
    pub teleport_min_price: i32,
    pub teleport_price_exponent: f32,
    pub energy_efficiency: f32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            energy_unit: 100,
            object_claim: 10,
            public_object_decay: 4,
            public_object_delete: 4,
            parcel_claim: 1,
            parcel_claim_factor: 1.0,
            upload: 0,
            rent_light: 5,
            object_rent: 1.0,
            object_scale_factor: 10.0,
            parcel_rent: 1,
            group_create: 0,
            teleport_min_price: 2,
            teleport_price_exponent: 2.0,
            energy_efficiency: 1.0,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        Self::from_file(&config_path)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_deserialize() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "router.log"
use_json: false
rotation: "daily"
ledger:
  enabled: true
  base_url: "https://shop.example.com/wp-json/wsfw-route/v1/wallet/"
  consumer_key: "ck_test"
  consumer_secret: "cs_test"
  payment_method: "opensim"
  timeout_ms: 5000
legacy:
  server_url: "https://money.example.com:8008/"
  disable_external: true
  timeout_ms: 10000
regions:
  - region_id: "1f0e9a62-0f7c-4bb4-9a53-7b0f3c1f6f33"
    handle: 1099511628032000
    name: "Welcome"
    external_host_name: "grid.example.com"
    http_port: 9000
    server_uri: "http://grid.example.com:9000/"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(!config.enable_tracing);
        assert!(config.ledger.enabled);
        assert_eq!(config.ledger.timeout_ms, 5000);
        assert!(config.legacy.disable_external);
        assert_eq!(
            config.legacy.server_url.as_deref(),
            Some("https://money.example.com:8008/")
        );
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.regions[0].http_port, 9000);
        // pricing falls back to defaults
        assert_eq!(config.pricing.energy_unit, 100);
        assert_eq!(config.pricing.teleport_min_price, 2);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let yaml = r#"
log_level: "debug"
log_dir: "./logs"
log_file: "router.log"
use_json: true
rotation: "never"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(!config.ledger.enabled);
        assert_eq!(config.ledger.payment_method, "opensim");
        assert!(config.legacy.server_url.is_none());
        assert!(!config.legacy.disable_external);
        assert_eq!(config.legacy.timeout_ms, 10_000);
        assert!(config.regions.is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = AppConfig::from_file("config/does-not-exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
