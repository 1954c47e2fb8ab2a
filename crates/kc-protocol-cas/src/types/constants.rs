//! CAS protocol constants.

/// CAS XML namespace URI.
pub const CAS_NS: &str = "http://www.yale.edu/tp/cas";

/// Path prefix of the CAS 3.0 validation endpoints.
pub const P3_PATH: &str = "p3";

/// CAS query parameter names.
pub mod params {
    /// Service URL the ticket is issued for.
    pub const SERVICE: &str = "service";
    /// Service ticket.
    pub const TICKET: &str = "ticket";
    /// Forces primary authentication.
    pub const RENEW: &str = "renew";
    /// Skips the login page if no SSO session exists.
    pub const GATEWAY: &str = "gateway";
    /// Broker-issued state bound to the pending login.
    pub const STATE: &str = "state";
}

/// CAS endpoint path segments, relative to the server URL prefix.
pub mod paths {
    /// Login endpoint.
    pub const LOGIN: &str = "login";
    /// Logout endpoint.
    pub const LOGOUT: &str = "logout";
    /// Service ticket validation endpoint.
    pub const SERVICE_VALIDATE: &str = "serviceValidate";
}

/// Element names of the `serviceResponse` document.
pub mod elements {
    /// Document root.
    pub const SERVICE_RESPONSE: &str = "serviceResponse";
    /// Successful validation.
    pub const AUTHENTICATION_SUCCESS: &str = "authenticationSuccess";
    /// Failed validation.
    pub const AUTHENTICATION_FAILURE: &str = "authenticationFailure";
    /// Principal identifier.
    pub const USER: &str = "user";
    /// Released attributes.
    pub const ATTRIBUTES: &str = "attributes";
    /// Failure code attribute on `authenticationFailure`.
    pub const CODE: &str = "code";
}
