use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Seed data for the in-process catalog. The production catalog is an
/// external service; local and single-node deployments describe their room
/// types here instead.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub room_types: Vec<RoomTypeSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomTypeSeed {
    pub id: uuid::Uuid,
    pub total_units: i32,
    /// Minor units per night.
    pub base_rate: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Empty/absent runs the engine on the in-memory store (local mode).
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared secret for verifying bearer tokens. Issuance lives in the
    /// identity service.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: i64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: usize,
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: i64,
    #[serde(default = "default_max_codes")]
    pub max_discount_codes: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_hold_ttl() -> i64 {
    20 * 60
}
fn default_sweep_interval() -> u64 {
    5
}
fn default_sweep_batch() -> usize {
    200
}
fn default_tax_rate() -> i64 {
    1_000
}
fn default_max_codes() -> usize {
    2
}
fn default_currency() -> String {
    "USD".to_string()
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: default_hold_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch(),
            tax_rate_bps: default_tax_rate(),
            max_discount_codes: default_max_codes(),
            currency: default_currency(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Env overrides, e.g. ROOST__SERVER__PORT=8080.
            .add_source(config::Environment::with_prefix("ROOST").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_defaults() {
        let rules = BusinessRules::default();
        assert_eq!(rules.hold_ttl_seconds, 1200);
        assert_eq!(rules.max_discount_codes, 2);
        assert_eq!(rules.tax_rate_bps, 1000);
    }
}
