//! Shared vocabulary of the Lycan werewolf engine.
//!
//! - **Records** ([`Room`], [`Player`], [`Vote`]) and their enums: the rows
//!   the record store keeps.
//! - **Messages** ([`Request`], [`Response`], [`Envelope`]): the boundary
//!   API, independent of any transport.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, envelopes out.
//!
//! ```text
//! lycan (server) → lycan-room (engine) → lycan-store → lycan-protocol
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{Envelope, Request, Response};
pub use types::{
    Change, ChangeEvent, Phase, Player, PlayerId, Role, Room, RoomId, RoomStatus,
    TallyResult, Team, UserId, Vote,
};
