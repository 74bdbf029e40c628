use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub card_source: CardSourceConfig,
    #[serde(default)]
    pub tables: TablesConfig,
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
        if self.card_source.label.is_empty() {
            return Err("card_source.label must not be empty".into());
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
    3011
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

/// Identity stamped into every card's source block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSourceConfig {
    #[serde(default = "default_source_label")]
    pub label: String,
    #[serde(default = "default_source_url")]
    pub url: String,
}

fn default_source_label() -> String {
    "CRD Reference Server".into()
}
fn default_source_url() -> String {
    "http://localhost:3011".into()
}

impl Default for CardSourceConfig {
    fn default() -> Self {
        Self {
            label: default_source_label(),
            url: default_source_url(),
        }
    }
}

/// Optional JSON files overriding the built-in rule and code tables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TablesConfig {
    #[serde(default)]
    pub rules_file: Option<String>,
    #[serde(default)]
    pub codes_file: Option<String>,
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

    /// `CRD_SERVER_PORT` beats the file.
    fn apply_env_overrides(cfg: &mut AppConfig) {
        if let Ok(port) = std::env::var("CRD_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                cfg.server.port = port;
            }
        }
    }
}
