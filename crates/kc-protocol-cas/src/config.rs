//! CAS identity provider configuration.
//!
//! One [`CasIdentityProviderConfig`] exists per configured CAS identity
//! provider. It is immutable once loaded and read on every login, validation
//! and logout.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CasError, CasResult};
use crate::mapper::MapperConfig;

/// Default timeout for the ticket validation request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Keys of the broker's per-provider settings map.
pub mod keys {
    /// CAS server URL prefix, e.g. `https://cas.example.org/cas`.
    pub const SERVER_URL_PREFIX: &str = "casServerUrlPrefix";
    /// Forces primary authentication at the CAS server.
    pub const RENEW: &str = "renew";
    /// Skips the CAS login page if there is no SSO session.
    pub const GATEWAY: &str = "gateway";
    /// `p3` or `legacy`.
    pub const PROTOCOL_VARIANT: &str = "protocolVariant";
    /// Validation request timeout in seconds.
    pub const REQUEST_TIMEOUT_SECONDS: &str = "requestTimeoutSeconds";
    /// Marks imported emails as verified.
    pub const TRUST_EMAIL: &str = "trustEmail";
}

/// Which validation endpoint the CAS server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVariant {
    /// CAS 3.0: `{prefix}/p3/serviceValidate`, releases attributes.
    #[default]
    P3,
    /// CAS 2.0: `{prefix}/serviceValidate`.
    Legacy,
}

impl ProtocolVariant {
    /// Returns the configuration string for this variant.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P3 => "p3",
            Self::Legacy => "legacy",
        }
    }
}

impl FromStr for ProtocolVariant {
    type Err = CasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p3" => Ok(Self::P3),
            "legacy" => Ok(Self::Legacy),
            other => Err(CasError::config(format!(
                "unknown protocol variant '{other}' (expected 'p3' or 'legacy')"
            ))),
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a CAS identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasIdentityProviderConfig {
    /// Identity provider alias, used in the broker callback path.
    pub alias: String,

    /// CAS server URL prefix.
    #[serde(rename = "casServerUrlPrefix")]
    pub server_url_prefix: String,

    /// Send `renew=true` on login and validation.
    #[serde(default)]
    pub renew: bool,

    /// Send `gateway=true` on login.
    #[serde(default)]
    pub gateway: bool,

    /// Validation endpoint flavour.
    #[serde(default)]
    pub protocol_variant: ProtocolVariant,

    /// Timeout of the validation request.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Treat emails released by CAS as verified.
    #[serde(default)]
    pub trust_email: bool,

    /// Attribute mappers attached to this provider.
    #[serde(default)]
    pub mappers: Vec<MapperConfig>,
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl CasIdentityProviderConfig {
    /// Creates a configuration with default flags.
    #[must_use]
    pub fn new(alias: impl Into<String>, server_url_prefix: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            server_url_prefix: server_url_prefix.into(),
            renew: false,
            gateway: false,
            protocol_variant: ProtocolVariant::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            trust_email: false,
            mappers: Vec::new(),
        }
    }

    /// Reads the configuration from the broker's string settings.
    ///
    /// Booleans are `true` only for a case-insensitive `"true"`; any other
    /// value, including a missing key, is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] if the server prefix is missing or
    /// invalid, or if the protocol variant or timeout cannot be parsed.
    pub fn from_provider_config(
        alias: impl Into<String>,
        config: &HashMap<String, String>,
    ) -> CasResult<Self> {
        let prefix = config
            .get(keys::SERVER_URL_PREFIX)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CasError::config(format!("{} is required", keys::SERVER_URL_PREFIX)))?;

        let mut result = Self::new(alias, prefix);
        result.renew = get_bool(config, keys::RENEW);
        result.gateway = get_bool(config, keys::GATEWAY);
        result.trust_email = get_bool(config, keys::TRUST_EMAIL);

        if let Some(variant) = config.get(keys::PROTOCOL_VARIANT) {
            if !variant.trim().is_empty() {
                result.protocol_variant = variant.parse()?;
            }
        }

        if let Some(timeout) = config.get(keys::REQUEST_TIMEOUT_SECONDS) {
            let secs: u64 = timeout.trim().parse().map_err(|_| {
                CasError::config(format!(
                    "{} must be a whole number of seconds, got '{timeout}'",
                    keys::REQUEST_TIMEOUT_SECONDS
                ))
            })?;
            result.request_timeout = Duration::from_secs(secs);
        }

        result.validate()?;
        Ok(result)
    }

    /// Sets the renew flag.
    #[must_use]
    pub const fn with_renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    /// Sets the gateway flag.
    #[must_use]
    pub const fn with_gateway(mut self, gateway: bool) -> Self {
        self.gateway = gateway;
        self
    }

    /// Sets the protocol variant.
    #[must_use]
    pub const fn with_protocol_variant(mut self, variant: ProtocolVariant) -> Self {
        self.protocol_variant = variant;
        self
    }

    /// Sets the validation request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets whether released emails are trusted.
    #[must_use]
    pub const fn with_trust_email(mut self, trust: bool) -> Self {
        self.trust_email = trust;
        self
    }

    /// Adds an attribute mapper.
    #[must_use]
    pub fn with_mapper(mut self, mapper: MapperConfig) -> Self {
        self.mappers.push(mapper);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> CasResult<()> {
        if self.alias.trim().is_empty() {
            return Err(CasError::config("alias must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(CasError::config("request timeout must be positive"));
        }
        self.server_url().map(|_| ())
    }

    /// Parses and checks the server URL prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CasError::Configuration`] unless the prefix is an absolute
    /// `http`/`https` URL with a host and without query or fragment.
    pub fn server_url(&self) -> CasResult<Url> {
        let url = Url::parse(self.server_url_prefix.trim()).map_err(|e| {
            CasError::config(format!(
                "invalid {} '{}': {e}",
                keys::SERVER_URL_PREFIX,
                self.server_url_prefix
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CasError::config(format!(
                "{} must use http or https, got '{}'",
                keys::SERVER_URL_PREFIX,
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(CasError::config(format!(
                "{} has no host",
                keys::SERVER_URL_PREFIX
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(CasError::config(format!(
                "{} must not contain a query or fragment",
                keys::SERVER_URL_PREFIX
            )));
        }

        Ok(url)
    }

    /// Returns true when the validation endpoint is the CAS 3.0 one.
    #[must_use]
    pub const fn is_p3(&self) -> bool {
        matches!(self.protocol_variant, ProtocolVariant::P3)
    }
}

fn get_bool(config: &HashMap<String, String>, key: &str) -> bool {
    config
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
