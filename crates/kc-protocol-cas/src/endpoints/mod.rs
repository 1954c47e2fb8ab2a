//! CAS broker endpoints.
//!
//! - **Login** - starts a brokered login and redirects to CAS
//! - **Callback** - receives the service ticket and completes the login
//! - **Logout response** - finishes a single logout when CAS sends the browser back
//!
//! # Example
//!
//! ```rust,ignore
//! use kc_protocol_cas::endpoints::{cas_router, CasState};
//!
//! let app = Router::new()
//!     .merge(cas_router())
//!     .with_state(CasState::new(provider, broker, "demo", "https://sso.example.com"));
//! ```

mod callback;
mod error_page;
mod login;
mod logout;
mod router;
mod state;

#[cfg(test)]
pub(crate) mod fake;

pub use callback::*;
pub use error_page::*;
pub use login::*;
pub use logout::*;
pub use router::*;
pub use state::*;
