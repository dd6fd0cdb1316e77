//! Byte-level encoding of envelopes.
//!
//! The server only needs *something* that turns envelopes into bytes and
//! back, so the format sits behind the [`Codec`] trait. [`JsonCodec`] is
//! the only implementation: browsers speak JSON natively and the payloads
//! are small (a roster of at most ten seats).

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match the expected shape (unknown `type` tag, missing field).
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use lycan_protocol::{Codec, Envelope, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Envelope::new(1, Request::Ping)).unwrap();
/// let back: Envelope<Request> = codec.decode(&bytes).unwrap();
/// assert_eq!(back.payload, Request::Ping);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
