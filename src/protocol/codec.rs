//! MIME envelope codec.
//!
//! Every request frame is `len(mime):u8 || mime || body`. Only
//! `application/json` is supported, so the prefix is always `0x10`.
//! Responses arrive as bare JSON frames.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::Encoder;

use super::error::{ProtocolError, ProtocolResult};
use super::message::{AuthMessage, Message, RequestMessage};

/// The only supported MIME type.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Codec for request envelopes and response payloads.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    mime_type: &'static str,
}

impl MessageCodec {
    /// Create a codec for `application/json`.
    pub fn json() -> Self {
        Self {
            mime_type: JSON_MIME_TYPE,
        }
    }

    /// Create a codec for the given MIME type.
    pub fn for_mime_type(mime_type: &str) -> ProtocolResult<Self> {
        if mime_type == JSON_MIME_TYPE {
            Ok(Self::json())
        } else {
            Err(ProtocolError::UnsupportedEncoding(mime_type.to_string()))
        }
    }

    /// MIME type written into the envelope.
    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    /// Encode a script request into a frame.
    ///
    /// Fails with [`ProtocolError::MissingSession`] before anything is
    /// serialized if the session processor is used without a session id.
    pub fn encode_request(&self, request: &RequestMessage) -> ProtocolResult<Bytes> {
        request.validate()?;
        self.encode_envelope(request)
    }

    /// Encode an authentication message into a frame.
    pub fn encode_auth(&self, auth: &AuthMessage) -> ProtocolResult<Bytes> {
        self.encode_envelope(auth)
    }

    /// Decode a response payload.
    pub fn decode_response(&self, payload: &[u8]) -> ProtocolResult<Message> {
        Message::from_json(payload)
    }

    fn encode_envelope<T: Serialize>(&self, body: &T) -> ProtocolResult<Bytes> {
        let json = serde_json::to_vec(body)?;
        let mut dst = BytesMut::with_capacity(1 + self.mime_type.len() + json.len());
        self.write_header(&mut dst);
        dst.put_slice(&json);
        Ok(dst.freeze())
    }

    fn write_header(&self, dst: &mut BytesMut) {
        dst.put_u8(self.mime_type.len() as u8);
        dst.put_slice(self.mime_type.as_bytes());
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::json()
    }
}

impl Encoder<RequestMessage> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: RequestMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = self.encode_request(&item)?;
        dst.put_slice(&frame);
        Ok(())
    }
}

impl Encoder<AuthMessage> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: AuthMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = self.encode_auth(&item)?;
        dst.put_slice(&frame);
        Ok(())
    }
}

/// Split a request frame into its MIME type and JSON body.
pub fn split_envelope(frame: &[u8]) -> ProtocolResult<(&str, &[u8])> {
    let (&len, rest) = frame
        .split_first()
        .ok_or_else(|| ProtocolError::MalformedResponse("empty frame".to_string()))?;
    let len = len as usize;

    if rest.len() < len {
        return Err(ProtocolError::MalformedResponse(format!(
            "MIME header truncated: expected {} bytes, found {}",
            len,
            rest.len()
        )));
    }

    let mime = std::str::from_utf8(&rest[..len])
        .map_err(|e| ProtocolError::MalformedResponse(format!("MIME header: {}", e)))?;
    Ok((mime, &rest[len..]))
}
