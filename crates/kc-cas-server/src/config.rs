//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.
//! The CAS settings are collected into the same string map the broker stores
//! per identity provider and parsed by the protocol crate.

use std::collections::HashMap;
use std::time::Duration;

use kc_protocol_cas::config::keys;
use kc_protocol_cas::endpoints::DEFAULT_AUTH_SESSION_LIFESPAN_SECS;
use kc_protocol_cas::mapper::MapperConfig;
use kc_protocol_cas::CasIdentityProviderConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host to bind to.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Base URL for the server (used in generated URLs).
    pub base_url: String,

    /// Realm the CAS provider belongs to.
    pub realm: String,

    /// The CAS identity provider.
    pub cas: CasIdentityProviderConfig,

    /// Lifetime of a pending login in seconds.
    pub auth_session_lifespan: i64,

    /// Log level.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails if `CAS_SERVER_URL_PREFIX` is missing or any CAS setting is
    /// invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("KC_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("KC_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let base_url = lookup("KC_BASE_URL").unwrap_or_else(|| format!("http://{host}:{port}"));
        let realm = lookup("KC_REALM").unwrap_or_else(|| "master".to_string());

        let auth_session_lifespan = lookup("KC_AUTH_SESSION_LIFESPAN")
            .and_then(|v| v.parse().ok())
            .filter(|secs: &i64| *secs > 0)
            .unwrap_or(DEFAULT_AUTH_SESSION_LIFESPAN_SECS);

        let mut settings = HashMap::new();
        for (var, key) in [
            ("CAS_SERVER_URL_PREFIX", keys::SERVER_URL_PREFIX),
            ("CAS_RENEW", keys::RENEW),
            ("CAS_GATEWAY", keys::GATEWAY),
            ("CAS_PROTOCOL_VARIANT", keys::PROTOCOL_VARIANT),
            ("CAS_REQUEST_TIMEOUT_SECS", keys::REQUEST_TIMEOUT_SECONDS),
            ("CAS_TRUST_EMAIL", keys::TRUST_EMAIL),
        ] {
            if let Some(value) = lookup(var) {
                settings.insert(key.to_string(), value);
            }
        }

        let alias = lookup("CAS_ALIAS").unwrap_or_else(|| "cas".to_string());
        let mut cas = CasIdentityProviderConfig::from_provider_config(alias, &settings)?;

        if let Some(mappers) = lookup("CAS_MAPPERS") {
            let mappers: Vec<MapperConfig> = serde_json::from_str(&mappers)
                .map_err(|e| anyhow::anyhow!("CAS_MAPPERS is not a valid mapper list: {e}"))?;
            cas.mappers = mappers;
        }

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            host,
            port,
            base_url,
            realm,
            cas,
            auth_session_lifespan,
            log_level,
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing(cas_server_url_prefix: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            base_url: "http://localhost:8080".to_string(),
            realm: "test".to_string(),
            cas: CasIdentityProviderConfig::new("cas", cas_server_url_prefix)
                .with_request_timeout(Duration::from_secs(2)),
            auth_session_lifespan: 300,
            log_level: "debug".to_string(),
        }
    }

    /// Returns the pending login lifetime.
    #[must_use]
    pub fn auth_session_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.auth_session_lifespan)
    }

    /// Returns the address to bind to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
