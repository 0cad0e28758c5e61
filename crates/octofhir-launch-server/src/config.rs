use std::{net::SocketAddr, time::Duration};

use octofhir_launch::ClientConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// SMART client registration
    #[serde(default)]
    pub client: ClientConfig,
    /// Browser session settings
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Session validations
        if self.session.cookie_name.trim().is_empty() {
            return Err("session.cookie_name must not be empty".into());
        }
        if self.session.ttl.is_zero() {
            return Err("session.ttl must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Client validation
        self.client
            .validate()
            .map_err(|e| format!("client config error: {e}"))?;
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
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8501
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Mark the cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
    /// Idle lifetime of a launch session
    #[serde(default = "default_session_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

fn default_cookie_name() -> String {
    "octofhir_launch_sid".into()
}
fn default_session_ttl() -> Duration {
    octofhir_launch::session::DEFAULT_SESSION_TTL
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookies: false,
            ttl: default_session_ttl(),
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
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file looked up when no path is given.
    pub const DEFAULT_CONFIG_PATH: &str = "octofhir-launch.toml";

    /// Picks the configuration file: `--config <path>` in `args`, then
    /// `env_path` (`OCTOFHIR_LAUNCH_CONFIG`), then [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_config_path(
        args: impl IntoIterator<Item = String>,
        env_path: Option<String>,
    ) -> String {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config"
                && let Some(path) = args.next()
            {
                return path;
            }
        }

        env_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., OCTOFHIR_LAUNCH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("OCTOFHIR_LAUNCH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
