//! Server Configuration
//!
//! Settings are layered: built-in defaults, then the TOML file (if present),
//! then `THINGD_` environment variables (`THINGD_SERVER__PORT=9700`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thing_types::ConnectivityConfig;

pub const ENV_PREFIX: &str = "THINGD_";
pub const DEFAULT_CONFIG_FILE: &str = "thingd.toml";

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub types: TypesConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9610,
        }
    }
}

/// Time-series store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the redb backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/values.redb"),
        }
    }
}

/// Property types provisioned at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypesConfig {
    pub path: Option<PathBuf>,
}

/// Accepted bearer tokens, each mapped to the owner it authenticates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "thingd=info,thing_runtime=info,tower_http=debug".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Provider chain for `path`; a missing file is skipped
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings from `path` with environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
