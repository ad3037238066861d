//! Environment configuration.
//!
//! Values come from the process environment (a `.env` file is loaded by the
//! binary through `dotenvy` first). Empty variables count as unset.

use std::path::PathBuf;
use thiserror::Error;
use validator::Validate;

use crate::mapping::{MappingError, SlugMappingTable};
use crate::reconcile::{DisplayNamePolicy, ReconcileOptions};
use crate::store::DEFAULT_MAX_BATCH_SIZE;

const DEFAULT_PORT: u16 = 8083;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Clone, Debug, Validate)]
pub struct AppConfig {
    /// `DATABASE_URL`: PostgreSQL document store.
    pub database_url: Option<String>,
    /// `CATEGORY_MAP_PATH`: mapping file; the built-in table when unset.
    pub category_map_path: Option<PathBuf>,
    /// `RECONCILE_BATCH_LIMIT`: entries per committed batch.
    #[validate(range(min = 1, max = 500))]
    pub batch_limit: usize,
    /// `DISPLAY_NAME_POLICY`: canonical-wins | legacy-wins | preserve.
    pub display_name_policy: DisplayNamePolicy,
    /// `ADMIN_TOKEN`: bearer token for the admin trigger; disabled when unset.
    #[validate(length(min = 16))]
    pub admin_token: Option<String>,
    /// `PORT`
    pub port: u16,
    /// `NATS_URL`: reconcile events are published when set.
    pub nats_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let batch_limit = match get("RECONCILE_BATCH_LIMIT") {
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::Invalid {
                key: "RECONCILE_BATCH_LIMIT", value: raw.clone(), reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_BATCH_SIZE,
        };
        let display_name_policy = match get("DISPLAY_NAME_POLICY") {
            Some(raw) => raw.parse::<DisplayNamePolicy>().map_err(|e| ConfigError::Invalid {
                key: "DISPLAY_NAME_POLICY", value: raw.clone(), reason: e.to_string(),
            })?,
            None => DisplayNamePolicy::default(),
        };
        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT", value: raw.clone(), reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let config = Self {
            database_url: get("DATABASE_URL"),
            category_map_path: get("CATEGORY_MAP_PATH").map(PathBuf::from),
            batch_limit,
            display_name_policy,
            admin_token: get("ADMIN_TOKEN"),
            port,
            nats_url: get("NATS_URL"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_mapping(&self) -> Result<SlugMappingTable, MappingError> {
        match &self.category_map_path {
            Some(path) => SlugMappingTable::load(path),
            None => SlugMappingTable::builtin(),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions { display_name_policy: self.display_name_policy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[("NATS_URL", "  ")]).unwrap();
        assert_eq!(c.batch_limit, 400);
        assert_eq!(c.port, 8083);
        assert_eq!(c.display_name_policy, DisplayNamePolicy::CanonicalWins);
        assert!(c.nats_url.is_none());
        assert!(c.load_mapping().unwrap().is_canonical("bags"));
    }

    #[test]
    fn test_overrides_and_validation() {
        let c = config(&[("RECONCILE_BATCH_LIMIT", "250"), ("DISPLAY_NAME_POLICY", "preserve"), ("ADMIN_TOKEN", "0123456789abcdef")]).unwrap();
        assert_eq!(c.batch_limit, 250);
        assert_eq!(c.reconcile_options().display_name_policy, DisplayNamePolicy::Preserve);

        assert!(matches!(config(&[("RECONCILE_BATCH_LIMIT", "0")]), Err(ConfigError::Validation(_))));
        assert!(matches!(config(&[("RECONCILE_BATCH_LIMIT", "many")]), Err(ConfigError::Invalid { key: "RECONCILE_BATCH_LIMIT", .. })));
        assert!(matches!(config(&[("ADMIN_TOKEN", "short")]), Err(ConfigError::Validation(_))));
        assert!(matches!(config(&[("DISPLAY_NAME_POLICY", "random")]), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_mapping_file() {
        let c = config(&[("CATEGORY_MAP_PATH", "/nonexistent/category_map.json")]).unwrap();
        assert!(matches!(c.load_mapping(), Err(MappingError::Io { .. })));
    }
}
