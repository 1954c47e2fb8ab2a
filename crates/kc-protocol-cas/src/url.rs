//! CAS endpoint URL construction.
//!
//! Pure functions; the same inputs always produce the same URL. Query values
//! are form-encoded, so a literal `+` in the service URL becomes `%2B` and is
//! never mistaken for a space by the CAS server.

use url::Url;

use crate::config::CasIdentityProviderConfig;
use crate::error::{CasError, CasResult};
use crate::types::{params, paths, P3_PATH};

/// Number of leading characters kept by [`redact`].
const REDACT_KEEP: usize = 6;

/// Builds the CAS login URL the browser is redirected to.
///
/// # Errors
///
/// Returns [`CasError::Configuration`] if the server prefix is invalid.
pub fn build_login_url(config: &CasIdentityProviderConfig, service_url: &str) -> CasResult<Url> {
    let mut url = endpoint(config, &[paths::LOGIN])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(params::SERVICE, service_url);
        if config.renew {
            query.append_pair(params::RENEW, "true");
        }
        if config.gateway {
            query.append_pair(params::GATEWAY, "true");
        }
    }
    Ok(url)
}

/// Builds the ticket validation URL.
///
/// `service_url` must be exactly the service the ticket was issued for.
///
/// # Errors
///
/// Returns [`CasError::Configuration`] if the server prefix is invalid.
pub fn build_validate_url(
    config: &CasIdentityProviderConfig,
    ticket: &str,
    service_url: &str,
) -> CasResult<Url> {
    let mut url = if config.is_p3() {
        endpoint(config, &[P3_PATH, paths::SERVICE_VALIDATE])?
    } else {
        endpoint(config, &[paths::SERVICE_VALIDATE])?
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(params::TICKET, ticket);
        query.append_pair(params::SERVICE, service_url);
        if config.renew {
            query.append_pair(params::RENEW, "true");
        }
    }
    Ok(url)
}

/// Builds the CAS single-logout URL.
///
/// # Errors
///
/// Returns [`CasError::Configuration`] if the server prefix is invalid.
pub fn build_logout_url(config: &CasIdentityProviderConfig, service_url: &str) -> CasResult<Url> {
    let mut url = endpoint(config, &[paths::LOGOUT])?;
    url.query_pairs_mut()
        .append_pair(params::SERVICE, service_url);
    Ok(url)
}

/// Appends `state` to a broker callback URL.
///
/// # Errors
///
/// Returns [`CasError::Configuration`] if `callback_url` is not absolute.
pub fn with_state(callback_url: &str, state: &str) -> CasResult<Url> {
    let mut url = Url::parse(callback_url)
        .map_err(|e| CasError::config(format!("invalid callback URL '{callback_url}': {e}")))?;
    url.query_pairs_mut().append_pair(params::STATE, state);
    Ok(url)
}

/// Masks a ticket or state for logging.
///
/// A prefix is kept only when the secret is more than twice its length, so
/// most of the value always stays hidden.
#[must_use]
pub fn redact(secret: &str) -> String {
    if secret.chars().count() <= 2 * REDACT_KEEP {
        return "***".to_string();
    }
    let kept: String = secret.chars().take(REDACT_KEEP).collect();
    format!("{kept}***")
}

fn endpoint(config: &CasIdentityProviderConfig, segments: &[&str]) -> CasResult<Url> {
    let mut url = config.server_url()?;
    url.path_segments_mut()
        .map_err(|()| CasError::config("CAS server URL prefix cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolVariant;

    const SERVICE: &str = "https://broker.example.com/realms/demo/broker/cas/endpoint?state=abc";

    fn config() -> CasIdentityProviderConfig {
        CasIdentityProviderConfig::new("cas", "https://cas.example.org/cas")
    }

    fn query(url: &Url, key: &str) -> Vec<String> {
        url.query_pairs()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    #[test]
    fn login_url_has_service_only_by_default() {
        let url = build_login_url(&config(), SERVICE).unwrap();

        assert_eq!(url.path(), "/cas/login");
        assert_eq!(query(&url, "service"), vec![SERVICE]);
        assert!(query(&url, "renew").is_empty());
        assert!(query(&url, "gateway").is_empty());
        assert!(query(&url, "ticket").is_empty());
    }

    #[test]
    fn login_url_flags() {
        let url = build_login_url(&config().with_renew(true).with_gateway(true), SERVICE).unwrap();

        assert_eq!(query(&url, "renew"), vec!["true"]);
        assert_eq!(query(&url, "gateway"), vec!["true"]);
    }

    #[test]
    fn login_url_is_deterministic() {
        let a = build_login_url(&config().with_renew(true), SERVICE).unwrap();
        let b = build_login_url(&config().with_renew(true), SERVICE).unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn plus_is_percent_encoded() {
        let url = build_login_url(&config(), "https://broker.example.com/cb?x=a+b c").unwrap();

        assert!(url.as_str().contains("a%2Bb+c"), "{url}");
        assert_eq!(query(&url, "service"), vec!["https://broker.example.com/cb?x=a+b c"]);
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let with = CasIdentityProviderConfig::new("cas", "https://cas.example.org/cas/");
        let without = config();

        assert_eq!(
            build_login_url(&with, SERVICE).unwrap(),
            build_login_url(&without, SERVICE).unwrap()
        );

        let root = CasIdentityProviderConfig::new("cas", "https://cas.example.org");
        assert_eq!(build_logout_url(&root, SERVICE).unwrap().path(), "/logout");
    }

    #[test]
    fn validate_url_p3() {
        let url = build_validate_url(&config(), "ST-1-abc", SERVICE).unwrap();

        assert_eq!(url.path(), "/cas/p3/serviceValidate");
        assert_eq!(query(&url, "ticket"), vec!["ST-1-abc"]);
        assert_eq!(query(&url, "service"), vec![SERVICE]);
        assert!(query(&url, "renew").is_empty());
    }

    #[test]
    fn validate_url_legacy_with_renew() {
        let config = config()
            .with_protocol_variant(ProtocolVariant::Legacy)
            .with_renew(true)
            .with_gateway(true);
        let url = build_validate_url(&config, "ST-1-abc", SERVICE).unwrap();

        assert_eq!(url.path(), "/cas/serviceValidate");
        assert_eq!(query(&url, "ticket").len(), 1);
        assert_eq!(query(&url, "service").len(), 1);
        assert_eq!(query(&url, "renew"), vec!["true"]);
        assert!(query(&url, "gateway").is_empty());
    }

    #[test]
    fn logout_url_has_no_flags() {
        let url = build_logout_url(&config().with_renew(true).with_gateway(true), SERVICE).unwrap();

        assert_eq!(url.path(), "/cas/logout");
        assert_eq!(query(&url, "service"), vec![SERVICE]);
        assert_eq!(url.query_pairs().count(), 1);
    }

    #[test]
    fn malformed_prefix_fails() {
        let bad = CasIdentityProviderConfig::new("cas", "cas.example.org");
        assert!(matches!(
            build_login_url(&bad, SERVICE),
            Err(CasError::Configuration(_))
        ));
        assert!(matches!(
            build_validate_url(&bad, "ST-1", SERVICE),
            Err(CasError::Configuration(_))
        ));
        assert!(matches!(
            build_logout_url(&bad, SERVICE),
            Err(CasError::Configuration(_))
        ));
    }

    #[test]
    fn state_is_appended_to_callback() {
        let url = with_state("https://broker.example.com/realms/demo/broker/cas/endpoint", "s+1").unwrap();
        assert_eq!(query(&url, "state"), vec!["s+1"]);
        assert!(url.as_str().ends_with("state=s%2B1"));
    }

    #[test]
    fn redact_keeps_prefix_only() {
        assert_eq!(redact("ST-12345-abcdefgh"), "ST-123***");
        assert_eq!(redact("short"), "***");
        assert_eq!(redact(""), "***");
    }

    #[test]
    fn redact_hides_short_secrets_entirely() {
        assert_eq!(redact("ST-1234"), "***");
        assert_eq!(redact("abcdefghijkl"), "***");
        assert_eq!(redact("abcdefghijklm"), "abcdef***");
    }
}
