//! Configuration for the embeddable facilitator service.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

/// Service configuration.
///
/// Fields use serde defaults that fall back to environment variables, then
/// to hardcoded defaults, so `Config::default()` works for local setups.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: config_defaults::default_port(),
            host: config_defaults::default_host(),
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub mod config_defaults {
    use std::env;
    use std::net::IpAddr;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default port with fallback: `$PORT` env var, then 8080.
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Default host with fallback: `$HOST` env var, then 0.0.0.0.
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| DEFAULT_HOST.parse().expect("valid default host"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{ "port": 9090 }"#).unwrap();
        assert_eq!(config.port(), 9090);
    }
}
