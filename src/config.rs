// ⚙️ Settings - Endpoint configuration
// The endpoint URL is an explicit value owned by the client. Resolution order
// for the binary: CLI argument > PDP_API_URL > TOML file > compiled default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Live SPARQL endpoint of the data platform
pub const DEFAULT_API_URL: &str = "https://api.parliament.uk/sparql";

/// Environment variable overriding the endpoint
pub const API_URL_ENV: &str = "PDP_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    api_url: Option<String>,
}

/// Shape of the optional TOML config file
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    api_url: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    pub fn with_api_url(api_url: &str) -> Self {
        Settings {
            api_url: Some(api_url.to_string()),
        }
    }

    /// The endpoint URL; the live endpoint until one is set
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Point at another endpoint, e.g. a local copy of the platform
    pub fn set_api_url(&mut self, api_url: &str) {
        self.api_url = Some(api_url.to_string());
    }

    /// Go back to the live endpoint
    pub fn reset_api_url(&mut self) {
        self.set_api_url(DEFAULT_API_URL);
    }

    /// Resolve settings from, in priority order, the CLI argument, the
    /// `PDP_API_URL` environment variable, a TOML file, then the default.
    ///
    /// A missing or unreadable config file falls back to the default; a file
    /// that reads but does not parse is an error.
    pub fn resolve(cli_arg: Option<&str>, config_path: Option<&Path>) -> Result<Self> {
        if let Some(url) = cli_arg {
            return Ok(Settings::with_api_url(url));
        }

        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                return Ok(Settings::with_api_url(url.trim()));
            }
        }

        if let Some(path) = config_path {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let config: TomlConfig = toml::from_str(&content).map_err(|e| {
                        Error::Config(format!("{}: {}", path.display(), e))
                    })?;
                    if let Some(url) = config.api_url {
                        return Ok(Settings::with_api_url(&url));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not read config file {}: {} (using default endpoint)",
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(Settings::new())
    }
}
