//! Operator configuration: `portal.toml` plus `PORTAL__*` environment overrides.

use serde::{Deserialize, Serialize};

use portal_session::SessionSettings;
use portal_store::StoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortalConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sessions: SessionSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl PortalConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        self.sessions.validate()?;
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

pub mod loader {
    use super::PortalConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    const DEFAULT_PATH: &str = "portal.toml";

    /// Loads `path` (or `portal.toml` when present), then applies environment
    /// overrides such as `PORTAL__STORE__SOCKET_PATH=/run/redis.sock`.
    pub fn load_config(path: Option<&str>) -> Result<PortalConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("PORTAL")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: PortalConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PortalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sessions.default_timeout, 900);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = PortalConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_file_sections() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[store]\nsocket_path = \"\"\nhost = \"10.0.0.5\"\nport = 6380\n\n[sessions]\ndefault_timeout = 600\n"
        )
        .unwrap();

        let config = loader::load_config(file.path().to_str()).unwrap();

        assert_eq!(config.store.endpoint(), "10.0.0.5:6380");
        assert_eq!(config.sessions.default_timeout, 600);
        assert_eq!(config.sessions.openid_ttl, 30);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(loader::load_config(Some("/nonexistent/portal.toml")).is_err());
    }
}
