//! Request/response shapes of the boundary API.
//!
//! These are transport-agnostic: the `lycan` server carries them as JSON
//! over WebSocket, but nothing here knows about sockets.
//!
//! Both enums are internally tagged (`#[serde(tag = "type")]`), so a join
//! request looks like:
//!
//! ```json
//! { "type": "JoinRoom", "code": "K7Q2ZD", "user_id": "u-2", "name": "Ana" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ChangeEvent, Phase, Player, PlayerId, Room, RoomId, TallyResult, Team, UserId,
    Vote,
};

/// Client → server operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Open a new lobby. Missing limits fall back to the engine defaults.
    CreateRoom {
        host_id: UserId,
        #[serde(default)]
        host_name: Option<String>,
        #[serde(default)]
        max_players: Option<usize>,
        #[serde(default)]
        min_players: Option<usize>,
    },

    /// Take a seat in a waiting room. `user_id` is absent for guests.
    JoinRoom {
        code: String,
        #[serde(default)]
        user_id: Option<UserId>,
        name: String,
    },

    /// Seat bots, deal roles, and open the first night.
    StartRoom { code: String },

    /// Room, ordered roster, and seconds left in the current phase.
    ///
    /// Roles stay hidden until the room finishes, except the seat that
    /// belongs to `viewer`.
    GetStatus {
        code: String,
        #[serde(default)]
        viewer: Option<UserId>,
    },

    CastVote {
        code: String,
        round: u32,
        voter_id: PlayerId,
        target_id: PlayerId,
    },

    ListVotes { code: String, round: u32 },

    Tally { code: String, round: u32 },

    /// Host action: flip night and day.
    TogglePhase { code: String, requester: UserId },

    /// Host action: close the current phase early.
    AdvancePhase { code: String, requester: UserId },

    /// Host action: end the session with a declared winner.
    FinishRoom {
        code: String,
        requester: UserId,
        winner: Team,
    },

    /// Receive `Changed` pushes for this room on the same connection.
    Subscribe { code: String },

    Ping,
}

/// Server → client replies and pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    RoomCreated { room: Room, player: Player },

    RoomJoined { room: Room, players: Vec<Player> },

    RoomStarted {
        phase: Phase,
        phase_end_at: DateTime<Utc>,
    },

    Status {
        room: Room,
        players: Vec<Player>,
        time_left: Option<u64>,
    },

    VoteCast { vote: Vote },

    Votes { votes: Vec<Vote> },

    /// `result` is `None` when nobody voted or the top count is tied.
    Tally { result: Option<TallyResult> },

    PhaseChanged { room: Room },

    Subscribed { room_id: RoomId },

    /// Unsolicited push for subscribed connections.
    Changed { event: ChangeEvent },

    Pong,

    /// `code` follows HTTP conventions (400, 403, 404, 409, 500).
    Error { code: u16, message: String },
}

/// Wire wrapper for both directions.
///
/// Clients number their requests with `seq`; the server echoes that number
/// in `reply_to`. Pushed events carry `reply_to: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(seq: u64, payload: P) -> Self {
        Self {
            seq,
            reply_to: None,
            payload,
        }
    }

    pub fn reply(seq: u64, reply_to: u64, payload: P) -> Self {
        Self {
            seq,
            reply_to: Some(reply_to),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_request_json_shape() {
        let json = r#"{"type":"JoinRoom","code":"K7Q2ZD","name":"Ana"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::JoinRoom {
                code: "K7Q2ZD".into(),
                user_id: None,
                name: "Ana".into(),
            }
        );
    }

    #[test]
    fn test_create_request_defaults_optional_fields() {
        let json = r#"{"type":"CreateRoom","host_id":"u-1"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::CreateRoom {
                host_id: UserId::new("u-1"),
                host_name: None,
                max_players: None,
                min_players: None,
            }
        );
    }

    #[test]
    fn test_finish_request_carries_winner() {
        let json = r#"{"type":"FinishRoom","code":"AAAAAA","requester":"h","winner":"village"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(
            req,
            Request::FinishRoom { winner: Team::Village, .. }
        ));
    }

    #[test]
    fn test_status_request_viewer_is_optional() {
        let json = r#"{"type":"GetStatus","code":"K7Q2ZD"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(
            req,
            Request::GetStatus {
                code: "K7Q2ZD".into(),
                viewer: None,
            }
        );
    }

    #[test]
    fn test_error_response_json_shape() {
        let resp = Response::Error {
            code: 409,
            message: "room full".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 409);
        assert_eq!(json["message"], "room full");
    }

    #[test]
    fn test_envelope_omits_reply_to_for_pushes() {
        let push = Envelope::new(3, Response::Pong);
        let json = serde_json::to_value(&push).unwrap();
        assert!(json.get("reply_to").is_none());

        let reply = Envelope::reply(4, 11, Response::Pong);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["reply_to"], 11);
        assert_eq!(json["payload"]["type"], "Pong");
    }

    #[test]
    fn test_envelope_accepts_missing_reply_to() {
        let json = r#"{"seq":1,"payload":{"type":"Ping"}}"#;
        let env: Envelope<Request> = serde_json::from_str(json).unwrap();
        assert_eq!(env.seq, 1);
        assert_eq!(env.reply_to, None);
        assert_eq!(env.payload, Request::Ping);
    }
}
