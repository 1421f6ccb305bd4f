//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "application.toml",
    "flowline.toml",
    "./config/config.toml",
    "./config/application.toml",
    "/etc/flowline/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // Start with defaults
        let mut config = AppConfig::default();

        // Try to load from file
        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        // Check explicit path first
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        // Check FLOWLINE_CONFIG env var
        if let Ok(path) = env::var("FLOWLINE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // Search standard paths
        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // HTTP — PORT is the primary name, APP_PORT is an alias (§6).
        if let Ok(val) = env::var("PORT").or_else(|_| env::var("APP_PORT")) {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("HOST") {
            config.http.host = val;
        }

        // MongoDB
        if let Ok(val) = env::var("MONGODB_URI") {
            config.mongodb.uri = val;
        }
        if let Ok(val) = env::var("MONGODB_DATABASE") {
            config.mongodb.database = val;
        }

        // Meta Graph API
        if let Ok(val) = env::var("META_GRAPH_BASE_URL") {
            config.meta.base_url = val;
        }
        if let Ok(val) = env::var("META_GRAPH_API_VERSION") {
            config.meta.api_version = val;
        }
        if let Ok(val) = env::var("META_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.meta.timeout_secs = secs;
            }
        }

        // Verify token — first of three aliases that is set wins (§6).
        if let Ok(val) = env::var("META_VERIFY_TOKEN")
            .or_else(|_| env::var("WHATSAPP_VERIFY_TOKEN"))
            .or_else(|_| env::var("VERIFY_TOKEN"))
        {
            config.verify_token = val;
        }

        // General
        if let Ok(val) = env::var("DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_with_no_file_or_env() {
        let loader = ConfigLoader::with_path("/nonexistent/path/config.toml");
        let config = loader.load().unwrap();
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.mongodb.database, "flowline");
    }

    #[test]
    fn loads_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"
[http]
port = 4100
host = "127.0.0.1"

[mongodb]
uri = "mongodb://example/"
database = "custom"
"#)
        .unwrap();

        let loader = ConfigLoader::with_path(file.path());
        let config = loader.load().unwrap();
        assert_eq!(config.http.port, 4100);
        assert_eq!(config.mongodb.database, "custom");
    }
}
