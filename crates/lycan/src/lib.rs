//! # Lycan
//!
//! A werewolf session server: lobbies with short join codes, bot seats,
//! secret roles, timed night/day/voting phases, and plurality votes.
//!
//! This crate is the WebSocket front of the workspace. The engine lives
//! in `lycan-room`, persistence behind `lycan-store`, and the wire types
//! in `lycan-protocol`.
//!
//! ```rust,no_run
//! use lycan::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LycanError> {
//!     let server = LycanServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build_in_memory()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;
pub mod transport;

pub use error::{LycanError, TransportError};
pub use server::{LycanServer, LycanServerBuilder};

/// Everything a server binary or an embedding application needs.
pub mod prelude {
    pub use crate::{LycanError, LycanServer, LycanServerBuilder, TransportError};

    pub use lycan_protocol::{
        ChangeEvent, Envelope, Phase, Player, PlayerId, Request, Response, Role, Room, RoomId,
        RoomStatus, Team, UserId, Vote,
    };
    pub use lycan_room::{EngineConfig, PhaseDurations, RoomError, RoomManager};
    pub use lycan_store::{MemoryStore, RecordStore, StoreError};
}
