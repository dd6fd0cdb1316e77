//! Error types for the record store.

use lycan_protocol::{Phase, PlayerId, RoomId, RoomStatus, UserId};

/// Failures of store operations.
///
/// Most variants are the *rejections* of the atomic primitives (a full
/// room, a lost compare-and-swap). Only [`StoreError::Backend`] means the
/// store itself is broken.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// Another room that is not finished already uses this code.
    #[error("room code {0} is already in use")]
    DuplicateCode(String),

    /// The seat guard's limit was reached.
    #[error("room {room} is full ({limit} seats)")]
    SeatsFull { room: RoomId, limit: usize },

    /// The seat guard's status did not match.
    #[error("room {room} is {actual}, expected {expected}")]
    StatusMismatch {
        room: RoomId,
        expected: RoomStatus,
        actual: RoomStatus,
    },

    #[error("name {name:?} is already taken in room {room}")]
    NameTaken { room: RoomId, name: String },

    #[error("user {user} is already seated in room {room}")]
    AlreadySeated { room: RoomId, user: UserId },

    /// The transition guard did not match the current room state.
    #[error("transition rejected: room {room} is {status}/{phase}")]
    TransitionRejected {
        room: RoomId,
        status: RoomStatus,
        phase: Phase,
    },

    /// A vote arrived for a round that is not open.
    #[error("round {round} of room {room} is not open (room is {status}/{phase}, round {current})")]
    BallotClosed {
        room: RoomId,
        round: u32,
        status: RoomStatus,
        phase: Phase,
        current: u32,
    },

    #[error("player {0} is not alive")]
    NotAlive(PlayerId),

    #[error("roles already assigned in room {0}")]
    RolesAlreadyAssigned(RoomId),

    /// A write would break the status/phase pairing of a room.
    #[error("inconsistent room state: {0}")]
    Inconsistent(String),

    /// The backend failed (connection lost, I/O error, …).
    #[error("store backend failure: {0}")]
    Backend(String),
}
