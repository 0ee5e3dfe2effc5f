//! Gremlin Server message types.
//!
//! Requests are JSON objects sent inside a MIME envelope; responses are
//! bare JSON objects carrying a status block and a result block.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

/// Values of the `op` request field.
pub mod op {
    /// Script evaluation (default)
    pub const EVAL: &str = "eval";
    /// SASL answer to a 407 challenge
    pub const AUTHENTICATION: &str = "authentication";
}

/// Values of the `processor` request field.
pub mod processor {
    /// Sessionless processor
    pub const STANDARD: &str = "";
    /// Session processor; requires a session id in `args`
    pub const SESSION: &str = "session";
}

/// Response status codes.
pub mod status {
    /// Terminal success
    pub const SUCCESS: u16 = 200;
    /// Terminal success without result data
    pub const NO_CONTENT: u16 = 204;
    /// Partial result, more messages follow
    pub const PARTIAL_CONTENT: u16 = 206;
    /// Server challenges the client for credentials
    pub const AUTHENTICATE: u16 = 407;
}
