//! Request messages.
//!
//! Request messages are sent from the client to the server.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{op, processor};
use crate::protocol::error::{ProtocolError, ProtocolResult};

/// Key/value map used for bindings, aliases and rebindings.
pub type Bindings = Map<String, Value>;

/// Default script language.
pub const DEFAULT_LANGUAGE: &str = "gremlin-groovy";

/// `args` block of a script request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestArgs {
    /// Script text
    pub gremlin: String,
    /// Script bindings (serialized as `null` when absent)
    pub bindings: Option<Bindings>,
    /// Script language
    pub language: String,
    /// Graph/traversal source aliases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Bindings>,
    /// Legacy name for aliases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebindings: Option<Bindings>,
    /// Session id, only for the session processor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// Script execution request.
///
/// A fresh `requestId` is generated for every message; it is never reused,
/// not even when a request is answered after an authentication challenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Request id
    pub request_id: Uuid,
    /// Operation name
    pub op: String,
    /// Processor name
    pub processor: String,
    /// Arguments
    pub args: RequestArgs,
}

impl RequestMessage {
    /// Create an `eval` request for the standard processor.
    pub fn eval(gremlin: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            op: op::EVAL.to_string(),
            processor: processor::STANDARD.to_string(),
            args: RequestArgs {
                gremlin: gremlin.into(),
                bindings: None,
                language: DEFAULT_LANGUAGE.to_string(),
                aliases: None,
                rebindings: None,
                session: None,
            },
        }
    }

    /// Set the operation.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }

    /// Set the processor.
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }

    /// Set the bindings.
    pub fn with_bindings(mut self, bindings: Option<Bindings>) -> Self {
        self.args.bindings = bindings;
        self
    }

    /// Set the script language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.args.language = language.into();
        self
    }

    /// Set the aliases.
    pub fn with_aliases(mut self, aliases: Option<Bindings>) -> Self {
        self.args.aliases = aliases;
        self
    }

    /// Set the rebindings.
    pub fn with_rebindings(mut self, rebindings: Option<Bindings>) -> Self {
        self.args.rebindings = rebindings;
        self
    }

    /// Set the session id.
    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.args.session = session;
        self
    }

    /// Check that a session processor request carries a session id.
    pub fn validate(&self) -> ProtocolResult<()> {
        check_session(&self.processor, self.args.session.as_deref())
    }
}

/// `args` block of an authentication request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthArgs {
    /// Base64 encoded SASL PLAIN token
    pub sasl: String,
    /// Session id, only when the challenged request used the session processor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// Answer to a 407 authentication challenge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMessage {
    /// Request id
    pub request_id: Uuid,
    /// Always `authentication`
    pub op: String,
    /// Always the standard processor
    pub processor: String,
    /// Arguments
    pub args: AuthArgs,
}

impl AuthMessage {
    /// Build an authentication message.
    ///
    /// `processor` is the processor of the challenged request. It is only
    /// used to enforce the session rule; the message itself always goes to
    /// the standard processor.
    pub fn new(
        username: &str,
        password: &str,
        processor: &str,
        session: Option<&str>,
    ) -> ProtocolResult<Self> {
        check_session(processor, session)?;

        Ok(Self {
            request_id: Uuid::new_v4(),
            op: op::AUTHENTICATION.to_string(),
            processor: processor::STANDARD.to_string(),
            args: AuthArgs {
                sasl: sasl_plain_token(username, password),
                session: session.map(String::from),
            },
        })
    }
}

/// Build a base64 SASL PLAIN token: `0x00 username 0x00 password`.
pub fn sasl_plain_token(username: &str, password: &str) -> String {
    let mut raw = Vec::with_capacity(username.len() + password.len() + 2);
    raw.push(0u8);
    raw.extend_from_slice(username.as_bytes());
    raw.push(0u8);
    raw.extend_from_slice(password.as_bytes());
    BASE64.encode(raw)
}

fn check_session(processor: &str, session: Option<&str>) -> ProtocolResult<()> {
    if processor == processor::SESSION && session.is_none() {
        return Err(ProtocolError::MissingSession);
    }
    Ok(())
}
