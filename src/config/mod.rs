//! Server configuration from the environment, and model catalog loading.

use crate::adapter::AdapterParams;
use crate::error::ConfigError;
use crate::model::ModelCatalog;
use crate::query::{DEFAULT_LIMIT, MAX_LIMIT};
use std::path::Path;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Postgres connection string. Absent means the host decides (e.g. in-memory storage).
    pub database_url: Option<String>,
    pub bind: String,
    pub link_prefix: String,
    pub pool_size: u32,
    pub page_limit: u32,
    pub max_body_bytes: usize,
    /// JSON model catalog file (`CRUDDY_MODELS`).
    pub models_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            database_url: None,
            bind: DEFAULT_BIND.into(),
            link_prefix: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
            page_limit: DEFAULT_LIMIT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            models_path: None,
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{} must be a number, got '{}'", key, s))),
    }
}

impl ServerConfig {
    /// Read `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();
        let page_limit = parse_num("CRUDDY_PAGE_LIMIT", get("CRUDDY_PAGE_LIMIT"), defaults.page_limit)?;
        if page_limit == 0 || page_limit > MAX_LIMIT {
            return Err(ConfigError::Validation(format!(
                "CRUDDY_PAGE_LIMIT must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(ServerConfig {
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            bind: get("CRUDDY_BIND").unwrap_or(defaults.bind),
            link_prefix: get("CRUDDY_LINK_PREFIX").unwrap_or(defaults.link_prefix),
            pool_size: parse_num("CRUDDY_POOL_SIZE", get("CRUDDY_POOL_SIZE"), defaults.pool_size)?,
            page_limit,
            max_body_bytes: parse_num(
                "CRUDDY_MAX_BODY_BYTES",
                get("CRUDDY_MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            )?,
            models_path: get("CRUDDY_MODELS").filter(|s| !s.is_empty()),
        })
    }

    pub fn adapter_params(&self) -> Option<AdapterParams> {
        self.database_url.as_ref().map(|url| AdapterParams {
            connection_uri: url.clone(),
            pool_size: self.pool_size,
        })
    }
}

/// Read a model catalog file. The catalog still needs `configure()`.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ModelCatalog, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    ModelCatalog::from_json(&raw)
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
/// For binaries; the library never installs one itself.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
