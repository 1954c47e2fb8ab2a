//! CAS protocol types.
//!
//! The typed form of a CAS 3.0 `serviceResponse` document plus the protocol
//! constants shared by the URL builder and the parser.

mod constants;
mod failure;
mod service_response;
mod success;

pub use constants::*;
pub use failure::*;
pub use service_response::*;
pub use success::*;
