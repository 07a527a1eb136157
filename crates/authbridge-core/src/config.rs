//! Application configuration management.
//!
//! This module handles loading the application configuration,
//! which includes the backend base URL, the navigation routes and the
//! keychain service name.
//!
//! Configuration is stored at `~/.config/authbridge/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::auth::credentials::DEFAULT_SERVICE_NAME;
use crate::callback::Routes;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "authbridge";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "AUTHBRIDGE_API_URL";

/// Backend used when neither the config file nor the environment name one
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

const DEFAULT_DASHBOARD_ROUTE: &str = "/dashboard";
const DEFAULT_SIGN_IN_ROUTE: &str = "/sign-in";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub dashboard_route: Option<String>,
    pub sign_in_route: Option<String>,
    pub keyring_service: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Effective backend base URL: environment, then config file, then default.
    pub fn api_base_url(&self) -> Result<String> {
        let env_url = std::env::var(API_URL_ENV).ok().filter(|v| !v.trim().is_empty());
        self.resolve_api_base_url(env_url)
    }

    fn resolve_api_base_url(&self, env_url: Option<String>) -> Result<String> {
        let url = env_url
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let parsed = reqwest::Url::parse(&url)
            .with_context(|| format!("Invalid backend URL: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Backend URL must be http or https: {}", url);
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    pub fn routes(&self) -> Routes {
        Routes {
            dashboard: self
                .dashboard_route
                .clone()
                .unwrap_or_else(|| DEFAULT_DASHBOARD_ROUTE.to_string()),
            sign_in: self
                .sign_in_route
                .clone()
                .unwrap_or_else(|| DEFAULT_SIGN_IN_ROUTE.to_string()),
        }
    }

    pub fn keyring_service(&self) -> &str {
        self.keyring_service.as_deref().unwrap_or(DEFAULT_SERVICE_NAME)
    }
}
