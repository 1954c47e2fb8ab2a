//! CAS 3.0 identity brokering for Keycloak Rust.
//!
//! This crate lets the broker delegate authentication to an external CAS
//! server:
//!
//! - **Login** - redirect to `{prefix}/login` with a state-bound service URL
//! - **Ticket validation** - exchange the service ticket at
//!   `{prefix}/p3/serviceValidate` and parse the `serviceResponse`
//! - **Attribute mapping** - project released attributes onto local users
//! - **Single logout** - redirect to `{prefix}/logout` and finish the local
//!   session when CAS sends the browser back
//!
//! # Architecture
//!
//! - [`types`] - the parsed `serviceResponse` model
//! - [`parser`] - namespace-aware XML parser for validation responses
//! - [`url`] - CAS endpoint URL builders
//! - [`client`] - HTTP transport seam
//! - [`validator`] - the ticket validation round trip
//! - [`handshake`] - state binding between redirect and callback
//! - [`attributes`] and [`mapper`] - attribute projection and mappers
//! - [`provider`] - the identity provider facade
//! - [`endpoints`] - Axum handlers for the broker callback endpoints
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use kc_protocol_cas::{CasIdentityProvider, CasIdentityProviderConfig};
//! use kc_protocol_cas::endpoints::{cas_router, CasState};
//!
//! let provider = CasIdentityProvider::new(
//!     CasIdentityProviderConfig::new("cas", "https://cas.example.org/cas"),
//! )?;
//! let app = Router::new()
//!     .merge(cas_router())
//!     .with_state(CasState::new(Arc::new(provider), broker, "demo", base_url));
//! ```
//!
//! # CAS Specifications
//!
//! - [CAS Protocol 3.0](https://apereo.github.io/cas/development/protocol/CAS-Protocol-Specification.html)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod handshake;
pub mod identity;
pub mod mapper;
pub mod parser;
pub mod provider;
pub mod session;
pub mod types;
pub mod url;
pub mod validator;

pub use config::{CasIdentityProviderConfig, ProtocolVariant};
pub use error::{CasError, CasResult};
pub use provider::CasIdentityProvider;
pub use types::*;
