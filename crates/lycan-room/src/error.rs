//! Error types for the room layer.

use lycan_store::StoreError;

/// Errors returned by room operations.
///
/// Each variant maps onto one boundary status code, see
/// [`RoomError::status_code`].
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Malformed input: bad limits, blank names, unknown players.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requester is not allowed to do this (not the host).
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// No seat left in the room.
    #[error("{0}")]
    Capacity(String),

    /// The room is in a state that doesn't allow this operation, or a
    /// concurrent writer got there first.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record store itself failed.
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl RoomError {
    /// HTTP-style status code used by the boundary layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Capacity(_) | Self::Conflict(_) => 409,
            Self::Store(_) => 500,
        }
    }
}

impl From<StoreError> for RoomError {
    /// Store rejections become the matching client error. Only real
    /// backend failures stay [`RoomError::Store`].
    fn from(e: StoreError) -> Self {
        let msg = e.to_string();
        match e {
            StoreError::RoomNotFound(_) => Self::NotFound(msg),
            StoreError::PlayerNotFound(_)
            | StoreError::NotAlive(_)
            | StoreError::NameTaken { .. } => Self::Validation(msg),
            StoreError::SeatsFull { .. } => Self::Capacity(msg),
            StoreError::DuplicateCode(_)
            | StoreError::StatusMismatch { .. }
            | StoreError::AlreadySeated { .. }
            | StoreError::TransitionRejected { .. }
            | StoreError::BallotClosed { .. }
            | StoreError::RolesAlreadyAssigned(_) => Self::Conflict(msg),
            StoreError::Inconsistent(_) | StoreError::Backend(_) => Self::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use lycan_protocol::{Phase, PlayerId, RoomId, RoomStatus};

    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RoomError::Validation("x".into()).status_code(), 400);
        assert_eq!(RoomError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(RoomError::NotFound("x".into()).status_code(), 404);
        assert_eq!(RoomError::Capacity("x".into()).status_code(), 409);
        assert_eq!(RoomError::Conflict("x".into()).status_code(), 409);
        assert_eq!(
            RoomError::Store(StoreError::Backend("down".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_store_rejections_map_to_client_errors() {
        let full: RoomError = StoreError::SeatsFull {
            room: RoomId(1),
            limit: 4,
        }
        .into();
        assert!(matches!(full, RoomError::Capacity(_)));

        let lost: RoomError = StoreError::TransitionRejected {
            room: RoomId(1),
            status: RoomStatus::InProgress,
            phase: Phase::Day,
        }
        .into();
        assert!(matches!(lost, RoomError::Conflict(_)));

        let stranger: RoomError = StoreError::PlayerNotFound(PlayerId(9)).into();
        assert!(matches!(stranger, RoomError::Validation(_)));

        let dead: RoomError = StoreError::NotAlive(PlayerId(2)).into();
        assert!(matches!(dead, RoomError::Validation(_)));

        let late: RoomError = StoreError::BallotClosed {
            room: RoomId(1),
            round: 1,
            status: RoomStatus::InProgress,
            phase: Phase::Night,
            current: 1,
        }
        .into();
        assert!(matches!(late, RoomError::Conflict(_)));

        let gone: RoomError = StoreError::RoomNotFound(RoomId(3)).into();
        assert_eq!(gone.to_string(), "room R-3 not found");
    }

    #[test]
    fn test_backend_failures_stay_store_errors() {
        let e: RoomError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(e, RoomError::Store(StoreError::Backend(_))));
    }
}
