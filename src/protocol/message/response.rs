//! Response messages.
//!
//! Response messages are sent from the server to the client. Every message
//! carries a status code that decides whether more messages follow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::status;
use crate::protocol::error::{ProtocolError, ProtocolResult};

/// Classification of a response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// 200 - terminal success
    Success,
    /// 204 - terminal success without data
    NoContent,
    /// 206 - partial result, more messages follow
    PartialContent,
    /// 407 - authentication challenge
    Authenticate,
    /// Anything else - terminal server error
    Error(u16),
}

impl ResponseStatus {
    /// Classify a raw status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            status::SUCCESS => ResponseStatus::Success,
            status::NO_CONTENT => ResponseStatus::NoContent,
            status::PARTIAL_CONTENT => ResponseStatus::PartialContent,
            status::AUTHENTICATE => ResponseStatus::Authenticate,
            other => ResponseStatus::Error(other),
        }
    }

    /// Whether no further message follows for the request.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Success | ResponseStatus::NoContent | ResponseStatus::Error(_)
        )
    }
}

/// A decoded response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the request this message answers, if the server sent one
    pub request_id: Option<String>,
    /// Status code
    pub status_code: u16,
    /// Result data; shape is defined by the server
    pub data: Value,
    /// Diagnostic message
    pub message: String,
    /// Result metadata
    pub metadata: Map<String, Value>,
}

impl Message {
    /// Decode a message from a JSON payload.
    pub fn from_json(payload: &[u8]) -> ProtocolResult<Self> {
        let raw: RawResponse = serde_json::from_slice(payload)
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;

        Ok(Self {
            request_id: raw.request_id,
            status_code: raw.status.code,
            data: raw.result.data,
            message: raw.status.message.unwrap_or_default(),
            metadata: raw.result.meta,
        })
    }

    /// Status classification.
    pub fn status(&self) -> ResponseStatus {
        ResponseStatus::from_code(self.status_code)
    }

    /// Whether this message ends its response stream.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    #[serde(default)]
    request_id: Option<String>,
    status: RawStatus,
    result: RawResult,
}

#[derive(Deserialize)]
struct RawStatus {
    code: u16,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    meta: Map<String, Value>,
}
