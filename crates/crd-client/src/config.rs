use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.remote.default_server_url.is_empty() {
            return Err("remote.default_server_url must not be empty".into());
        }
        if self.store.requests_dir.is_empty() {
            return Err("store.requests_dir must not be empty".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5057
}
fn default_body_limit() -> usize {
    8 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the CRD server invoked when a request names no other.
    #[serde(default = "default_server_url")]
    pub default_server_url: String,
}

fn default_server_url() -> String {
    "https://crd.davinci.hl7.org/r4".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_server_url: default_server_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding stored request payloads (`*.json`).
    #[serde(default = "default_requests_dir")]
    pub requests_dir: String,
}

fn default_requests_dir() -> String {
    "requests".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            requests_dir: default_requests_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use std::path::Path;

    /// Load configuration from a TOML file, then apply environment
    /// overrides. A missing file is not an error: defaults apply.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut cfg = match path {
            Some(p) if Path::new(p).exists() => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| format!("config read error: {e}"))?;
                toml::from_str(&raw).map_err(|e| format!("config parse error: {e}"))?
            }
            _ => AppConfig::default(),
        };
        apply_env_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// `CRD_CLIENT_PORT` and `CRD_SERVER_URL` beat the file.
    fn apply_env_overrides(cfg: &mut AppConfig) {
        if let Ok(port) = std::env::var("CRD_CLIENT_PORT") {
            if let Ok(port) = port.parse() {
                cfg.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("CRD_SERVER_URL") {
            if !url.is_empty() {
                cfg.remote.default_server_url = url;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5057);
        assert_eq!(cfg.remote.default_server_url, "https://crd.davinci.hl7.org/r4");
        assert_eq!(cfg.store.requests_dir, "requests");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_field_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 6000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 6000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.store.requests_dir, "requests");
    }

    #[test]
    fn test_addr_falls_back_on_bad_host() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not-an-ip".into();
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:5057");
    }
}
