//! Unified error type for the Lycan server.

use lycan_protocol::ProtocolError;
use lycan_room::RoomError;
use lycan_store::StoreError;

/// Failures of the WebSocket layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, accepting, or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum LycanError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LycanError {
    /// HTTP-style code reported to clients in error envelopes.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Room(e) => e.status_code(),
            Self::Protocol(_) => 400,
            Self::Transport(_) | Self::Store(_) => 500,
        }
    }
}
