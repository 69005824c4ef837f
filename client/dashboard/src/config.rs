use andon_common::{env_flag, env_parse};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};
use url::Url;

use crate::error::DashboardError;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws/andons";
const DEFAULT_REFRESH_MS: u64 = 250;
const MIN_REFRESH_MS: u64 = 20;
const DEFAULT_COLUMNS: usize = 4;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub endpoint: Url,
    pub refresh_interval: Duration,
    pub columns: usize,
    pub color: bool,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub refresh_interval_ms: Option<u64>,
    pub columns: Option<usize>,
    pub color: Option<bool>,
}

impl FileConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("ANDON_WS_URL").ok(),
            refresh_interval_ms: env_parse("REFRESH_INTERVAL_MS"),
            columns: env_parse("DASHBOARD_COLUMNS"),
            color: env_flag("DASHBOARD_COLOR"),
        }
    }

    /// Field-wise fallback: values set on `self` win.
    pub fn or(self, fallback: FileConfig) -> Self {
        Self {
            endpoint: self.endpoint.or(fallback.endpoint),
            refresh_interval_ms: self.refresh_interval_ms.or(fallback.refresh_interval_ms),
            columns: self.columns.or(fallback.columns),
            color: self.color.or(fallback.color),
        }
    }
}

impl TryFrom<FileConfig> for DashboardConfig {
    type Error = DashboardError;

    fn try_from(config: FileConfig) -> Result<Self, Self::Error> {
        let raw_endpoint = config
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = Url::parse(raw_endpoint.trim())
            .map_err(|err| DashboardError::Config(format!("endpoint {raw_endpoint:?}: {err}")))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(DashboardError::Config(format!(
                "endpoint {endpoint} must use ws:// or wss://"
            )));
        }

        let refresh_ms = config
            .refresh_interval_ms
            .unwrap_or(DEFAULT_REFRESH_MS)
            .max(MIN_REFRESH_MS);

        Ok(Self {
            endpoint,
            refresh_interval: Duration::from_millis(refresh_ms),
            columns: config.columns.unwrap_or(DEFAULT_COLUMNS).max(1),
            color: config.color.unwrap_or(true),
        })
    }
}

pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var("DASHBOARD_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let repo_path = PathBuf::from("client/dashboard/config.toml");
    if repo_path.exists() {
        return repo_path;
    }

    PathBuf::from("dashboard.toml")
}

/// Defaults, then the config file, then the environment.
pub fn load_config() -> Result<DashboardConfig, DashboardError> {
    let config_path = resolve_config_path();

    let file_config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path).map_err(|err| {
            DashboardError::Config(format!("read {}: {err}", config_path.display()))
        })?;
        toml::from_str::<FileConfig>(&content).map_err(|err| {
            DashboardError::Config(format!("parse {}: {err}", config_path.display()))
        })?
    } else {
        FileConfig::default()
    };

    DashboardConfig::try_from(FileConfig::from_env().or(file_config))
}
