//! The record-store contract.
//!
//! The engine never keeps authoritative state in memory: every decision
//! that two callers could race on is pushed down into one of the atomic
//! primitives below, and the store serializes them.
//!
//! - [`RecordStore::insert_player`]: insert-if-status-and-count-below.
//! - [`RecordStore::transition`]: compare-and-swap on room state.
//! - [`RecordStore::assign_roles`]: all-or-nothing, at most once.
//! - [`RecordStore::release_start`]: undo a half-finished start.
//! - [`RecordStore::put_vote`]: insert-if-round-open-and-players-alive.

use std::future::Future;

use chrono::{DateTime, Utc};
use lycan_protocol::{
    ChangeEvent, Phase, Player, PlayerId, Role, Room, RoomId, RoomStatus, Team,
    UserId, Vote,
};
use tokio::sync::broadcast;

use crate::StoreError;

/// Fields of a room the caller chooses. The store assigns the id and
/// timestamps and starts the room in `waiting`.
#[derive(Debug, Clone)]
pub struct RoomDraft {
    pub code: String,
    pub host_id: UserId,
    pub min_players: usize,
    pub max_players: usize,
}

#[derive(Debug, Clone)]
pub struct PlayerDraft {
    pub room_id: RoomId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub is_ai: bool,
}

/// Precondition of [`RecordStore::insert_player`]: the room must be in
/// `status` and hold fewer than `limit` players.
#[derive(Debug, Clone, Copy)]
pub struct SeatGuard {
    pub status: RoomStatus,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct VoteDraft {
    pub room_id: RoomId,
    pub round: u32,
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
}

/// The mutable part of a room, written as one unit by
/// [`RecordStore::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    pub status: RoomStatus,
    pub phase: Phase,
    pub phase_end_at: Option<DateTime<Utc>>,
    pub round: u32,
    pub winner: Option<Team>,
}

impl PhaseState {
    pub fn of(room: &Room) -> Self {
        Self {
            status: room.status,
            phase: room.phase,
            phase_end_at: room.phase_end_at,
            round: room.round,
            winner: room.winner,
        }
    }
}

/// Precondition of [`RecordStore::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// The room must currently have this status.
    Status(RoomStatus),
    /// The room must be in this exact phase with this exact deadline.
    /// Used by deadline expiry and host actions so a stale caller can
    /// never advance a phase someone else already moved.
    Phase {
        phase: Phase,
        phase_end_at: Option<DateTime<Utc>>,
    },
    /// Any status except `finished`.
    NotFinished,
}

impl Guard {
    pub fn admits(&self, room: &Room) -> bool {
        match *self {
            Self::Status(status) => room.status == status,
            Self::Phase {
                phase,
                phase_end_at,
            } => room.phase == phase && room.phase_end_at == phase_end_at,
            Self::NotFinished => !room.status.is_finished(),
        }
    }
}

/// Persistence for rooms, players and votes.
///
/// Methods return `impl Future + Send` so generic callers can spawn
/// them onto the multi-threaded runtime.
pub trait RecordStore: Send + Sync + 'static {
    /// Inserts a new `waiting` room.
    ///
    /// # Errors
    /// [`StoreError::DuplicateCode`] if a room that is not finished already
    /// uses `draft.code`.
    fn create_room(
        &self,
        draft: RoomDraft,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    fn room(&self, id: RoomId) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Resolves a code. When several rooms have used the code over time,
    /// the one that is not finished wins, then the most recent.
    fn room_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    fn rooms_with_status(
        &self,
        status: RoomStatus,
    ) -> impl Future<Output = Result<Vec<Room>, StoreError>> + Send;

    /// Rooms that are not finished and saw no activity since `cutoff`.
    ///
    /// Activity is [`Room::active_at`]: automatic phase changes do not
    /// count.
    fn idle_rooms(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Room>, StoreError>> + Send;

    /// Atomically replaces the room's [`PhaseState`] if `guard` admits the
    /// current row.
    ///
    /// # Errors
    /// [`StoreError::TransitionRejected`] when the guard fails,
    /// [`StoreError::Inconsistent`] when `to` breaks the status/phase
    /// pairing.
    fn transition(
        &self,
        id: RoomId,
        guard: Guard,
        to: PhaseState,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Marks the room as active now. Called for host actions; seat and
    /// vote inserts mark activity on their own.
    fn touch(&self, id: RoomId) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Returns a room stuck in `starting` to an empty-handed lobby: bots
    /// are removed, dealt roles are cleared, and the status goes back to
    /// `waiting`, all in one step.
    ///
    /// # Errors
    /// [`StoreError::TransitionRejected`] unless the room is `starting`.
    fn release_start(&self, id: RoomId) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Atomically checks `seat` and inserts the player.
    ///
    /// Names are unique per room and a user holds at most one seat per
    /// room; both are checked in the same critical section.
    fn insert_player(
        &self,
        draft: PlayerDraft,
        seat: SeatGuard,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    /// Players of a room ordered by `(joined_at, seq)`.
    fn players(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send;

    fn count_players(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Writes every role in one step.
    ///
    /// # Errors
    /// [`StoreError::RolesAlreadyAssigned`] if any player of the room
    /// already holds a role; nothing is written in that case.
    fn assign_roles(
        &self,
        room: RoomId,
        roles: Vec<(PlayerId, Role)>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_alive(
        &self,
        player: PlayerId,
        alive: bool,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    /// Inserts the vote, replacing any earlier vote with the same
    /// `(room_id, round, voter_id)`.
    ///
    /// The room must be in progress, in its voting phase, with
    /// `draft.round` as the current round, and both players must be alive
    /// members of the room. All of it is checked in the same critical
    /// section as the write, so a ballot can never land in a round whose
    /// tally already ran.
    ///
    /// # Errors
    /// - [`StoreError::BallotClosed`] when the round is not open.
    /// - [`StoreError::PlayerNotFound`] / [`StoreError::NotAlive`] for
    ///   voters or targets outside the living roster.
    fn put_vote(&self, draft: VoteDraft) -> impl Future<Output = Result<Vote, StoreError>> + Send;

    /// Votes of one round ordered by `cast_at`.
    fn votes(
        &self,
        room: RoomId,
        round: u32,
    ) -> impl Future<Output = Result<Vec<Vote>, StoreError>> + Send;

    /// Change feed for every room. Slow receivers lag and skip events.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
