//! # Gremlin Server Protocol
//!
//! Wire format for talking to Gremlin Server over a message-oriented
//! transport. Nothing in this module performs I/O.
//!
//! ## Submodules
//!
//! - [`message`] - Request, authentication and response messages
//! - [`codec`] - MIME envelope encoding and response decoding
//! - [`error`] - Protocol error types
//!
//! Most users should use the high-level [`crate::driver`] module instead.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{split_envelope, MessageCodec, JSON_MIME_TYPE};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    op, processor, sasl_plain_token, status, AuthArgs, AuthMessage, Bindings, Message,
    RequestArgs, RequestMessage, ResponseStatus, DEFAULT_LANGUAGE,
};
