//! Listener configuration read from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `APP_PORT` | `8080` | TCP port to listen on (all interfaces) |
//! | `APP_TLS_CERT` | empty | PEM certificate chain path |
//! | `APP_TLS_KEY` | empty | PEM private key path |
//! | `APP_SHUTDOWN_TIMEOUT_SECS` | `10` | graceful shutdown deadline |
//!
//! TLS is enabled only when both `APP_TLS_CERT` and `APP_TLS_KEY` are set.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

/// Validated server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub tls_cert: String,

    #[serde(default)]
    pub tls_key: String,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            tls_cert: String::new(),
            tls_key: String::new(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `APP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("APP"))
    }

    fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }

    /// Certificate and key paths, when both are configured.
    pub fn tls(&self) -> Option<(&str, &str)> {
        let cert = self.tls_cert.trim();
        let key = self.tls_key.trim();
        (!cert.is_empty() && !key.is_empty()).then_some((cert, key))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        config::Environment::with_prefix("APP").source(Some(map))
    }

    #[test]
    fn defaults_are_correct() {
        let c = ServerConfig::from_source(env(&[])).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.shutdown_timeout(), Duration::from_secs(10));
        assert!(c.tls().is_none());
    }

    #[test]
    fn reads_prefixed_variables() {
        let c = ServerConfig::from_source(env(&[
            ("APP_PORT", "9443"),
            ("APP_TLS_CERT", "/etc/tls/cert.pem"),
            ("APP_TLS_KEY", "/etc/tls/key.pem"),
            ("APP_SHUTDOWN_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(c.listen_addr(), "0.0.0.0:9443".parse().unwrap());
        assert_eq!(c.tls(), Some(("/etc/tls/cert.pem", "/etc/tls/key.pem")));
        assert_eq!(c.shutdown_timeout_secs, 3);
    }

    #[test]
    fn tls_needs_both_paths() {
        let c = ServerConfig { tls_cert: "/etc/tls/cert.pem".into(), ..ServerConfig::default() };
        assert!(c.tls().is_none());
    }

    #[test]
    fn rejects_unparseable_port() {
        assert!(ServerConfig::from_source(env(&[("APP_PORT", "eighty")])).is_err());
    }
}
