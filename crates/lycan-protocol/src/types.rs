//! Core records of a werewolf session: rooms, players, votes.
//!
//! Everything here is plain data. These are the rows the record store
//! persists and the shapes the boundary layer sends to clients, so every
//! type derives `Serialize`/`Deserialize` and has a stable JSON form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Store-assigned identifier of a room.
///
/// Newtype over `u64` so a `RoomId` can never be passed where a
/// `PlayerId` is expected. `#[serde(transparent)]` keeps the wire form a
/// plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Store-assigned identifier of a seat in a room (human or bot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identity of a human user, issued by the external auth provider.
///
/// Lycan never interprets it; it is only compared for equality (host
/// checks, "already seated" checks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Coarse lifecycle of a room.
///
/// ```text
/// Waiting → Starting → InProgress → Finished
///    └──────────┴───────────┴──────────↗  (finish / reap)
/// ```
///
/// - **Waiting**: lobby; humans may join.
/// - **Starting**: `start` has claimed the room and is seating bots and
///   dealing roles. Nobody else may join or start.
/// - **InProgress**: timed phases are running.
/// - **Finished**: terminal. The room is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Starting,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if humans may still take a seat.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once the room can no longer change.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Starting => write!(f, "starting"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The sub-state of a room. Only `Night`, `Day` and `Voting` carry a
/// deadline.
///
/// The automatic cycle is `Night → Day → Voting → Night → …`. Hosts can
/// additionally flip `Night ↔ Day` by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Night,
    Day,
    Voting,
    Finished,
}

impl Phase {
    /// The phase that follows this one when its deadline elapses.
    ///
    /// Returns `None` for phases without a timer.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Night => Some(Self::Day),
            Self::Day => Some(Self::Voting),
            Self::Voting => Some(Self::Night),
            Self::Waiting | Self::Finished => None,
        }
    }

    /// The host toggle: `Night ↔ Day`. Every other phase has no toggle.
    pub fn toggled(self) -> Option<Self> {
        match self {
            Self::Night => Some(Self::Day),
            Self::Day => Some(Self::Night),
            _ => None,
        }
    }

    /// Returns `true` if the phase runs against a deadline.
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Night | Self::Day | Self::Voting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Night => write!(f, "night"),
            Self::Day => write!(f, "day"),
            Self::Voting => write!(f, "voting"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Role / Team
// ---------------------------------------------------------------------------

/// A secret role, dealt once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Werewolf,
    Seer,
    Guardian,
    Villager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Werewolf => write!(f, "werewolf"),
            Self::Seer => write!(f, "seer"),
            Self::Guardian => write!(f, "guardian"),
            Self::Villager => write!(f, "villager"),
        }
    }
}

/// The side declared the winner when a host finishes a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Village,
    Werewolves,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Village => write!(f, "village"),
            Self::Werewolves => write!(f, "werewolves"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Short shareable code, unique among rooms that are not finished.
    pub code: String,
    pub host_id: UserId,
    pub status: RoomStatus,
    pub phase: Phase,
    /// Absolute deadline of the current phase. `None` outside timed phases.
    pub phase_end_at: Option<DateTime<Utc>>,
    pub min_players: usize,
    pub max_players: usize,
    /// Current voting round. 0 until the first voting phase opens.
    pub round: u32,
    pub winner: Option<Team>,
    pub created_at: DateTime<Utc>,
    /// Last write of any kind, including automatic phase changes.
    pub updated_at: DateTime<Utc>,
    /// Last write caused by a person: seat taken, vote cast, host action.
    /// Idle reaping is measured from here.
    pub active_at: DateTime<Utc>,
}

impl Room {
    /// Whole seconds until the phase deadline, floored and clamped at 0.
    ///
    /// `Some(0)` means the phase is due for an automatic advance. `None`
    /// means the phase has no deadline at all.
    pub fn time_left(&self, now: DateTime<Utc>) -> Option<u64> {
        self.phase_end_at
            .map(|end| (end - now).num_seconds().max(0) as u64)
    }

    /// Checks the status/phase pairing every store write must preserve.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            RoomStatus::Waiting | RoomStatus::Starting => {
                self.phase == Phase::Waiting && self.phase_end_at.is_none()
            }
            RoomStatus::InProgress => {
                self.phase.is_timed() && self.phase_end_at.is_some()
            }
            RoomStatus::Finished => {
                self.phase == Phase::Finished && self.phase_end_at.is_none()
            }
        }
    }
}

/// A seat in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub room_id: RoomId,
    /// `None` for bots.
    pub user_id: Option<UserId>,
    pub name: String,
    pub is_ai: bool,
    pub role: Option<Role>,
    pub joined_at: DateTime<Utc>,
    /// Store insertion order. Breaks ties between equal `joined_at`.
    pub seq: u64,
    pub alive: bool,
}

/// A single ballot. At most one per `(room_id, round, voter_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub room_id: RoomId,
    pub round: u32,
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
    pub cast_at: DateTime<Utc>,
}

/// The outcome of a round: the player with a strict plurality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub target_id: PlayerId,
    pub votes: usize,
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

/// What changed inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// The room row itself (status, phase, deadline, round, winner).
    Room,
    /// A player row was inserted or updated.
    Player { player_id: PlayerId },
    /// A vote was cast or replaced.
    Vote { round: u32 },
}

/// "Row changed" notification scoped to one room.
///
/// Viewers use these only as a hint to re-fetch; they can always poll
/// the status instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub room_id: RoomId,
    #[serde(flatten)]
    pub change: Change,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn room(status: RoomStatus, phase: Phase, end: Option<DateTime<Utc>>) -> Room {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        Room {
            id: RoomId(1),
            code: "ABC123".into(),
            host_id: UserId::new("host"),
            status,
            phase,
            phase_end_at: end,
            min_players: 4,
            max_players: 8,
            round: 0,
            winner: None,
            created_at: t,
            updated_at: t,
            active_at: t,
        }
    }

    #[test]
    fn test_ids_serialize_as_plain_values() {
        assert_eq!(serde_json::to_string(&RoomId(9)).unwrap(), "9");
        assert_eq!(serde_json::to_string(&PlayerId(4)).unwrap(), "4");
        assert_eq!(
            serde_json::to_string(&UserId::new("u-1")).unwrap(),
            "\"u-1\""
        );
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_enums_use_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&RoomStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(serde_json::to_string(&Phase::Voting).unwrap(), "\"voting\"");
        assert_eq!(serde_json::to_string(&Role::Guardian).unwrap(), "\"guardian\"");
        assert_eq!(
            serde_json::to_string(&Team::Werewolves).unwrap(),
            "\"werewolves\""
        );
    }

    #[test]
    fn test_phase_next_cycles_night_day_voting() {
        assert_eq!(Phase::Night.next(), Some(Phase::Day));
        assert_eq!(Phase::Day.next(), Some(Phase::Voting));
        assert_eq!(Phase::Voting.next(), Some(Phase::Night));
        assert_eq!(Phase::Waiting.next(), None);
        assert_eq!(Phase::Finished.next(), None);
    }

    #[test]
    fn test_phase_toggle_only_flips_night_and_day() {
        assert_eq!(Phase::Night.toggled(), Some(Phase::Day));
        assert_eq!(Phase::Day.toggled(), Some(Phase::Night));
        assert_eq!(Phase::Voting.toggled(), None);
        assert_eq!(Phase::Waiting.toggled(), None);
    }

    #[test]
    fn test_status_is_joinable_only_while_waiting() {
        assert!(RoomStatus::Waiting.is_joinable());
        assert!(!RoomStatus::Starting.is_joinable());
        assert!(!RoomStatus::InProgress.is_joinable());
        assert!(!RoomStatus::Finished.is_joinable());
    }

    #[test]
    fn test_time_left_floors_and_clamps() {
        let r = room(RoomStatus::InProgress, Phase::Night, None);
        let now = r.created_at;

        let mut timed = r.clone();
        timed.phase_end_at = Some(now + Duration::milliseconds(90_900));
        assert_eq!(timed.time_left(now), Some(90));

        timed.phase_end_at = Some(now - Duration::seconds(5));
        assert_eq!(timed.time_left(now), Some(0));

        assert_eq!(r.time_left(now), None);
    }

    #[test]
    fn test_room_consistency_rules() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert!(room(RoomStatus::Waiting, Phase::Waiting, None).is_consistent());
        assert!(room(RoomStatus::Starting, Phase::Waiting, None).is_consistent());
        assert!(room(RoomStatus::InProgress, Phase::Day, Some(t)).is_consistent());
        assert!(room(RoomStatus::Finished, Phase::Finished, None).is_consistent());

        assert!(!room(RoomStatus::Waiting, Phase::Night, None).is_consistent());
        assert!(!room(RoomStatus::InProgress, Phase::Day, None).is_consistent());
        assert!(!room(RoomStatus::Finished, Phase::Voting, None).is_consistent());
    }

    #[test]
    fn test_change_event_json_is_flat() {
        let event = ChangeEvent {
            room_id: RoomId(2),
            change: Change::Player { player_id: PlayerId(5) },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["room_id"], 2);
        assert_eq!(json["kind"], "player");
        assert_eq!(json["player_id"], 5);
    }
}
