//! Seats in a room.

use std::sync::Arc;

use lycan_protocol::{Player, Room, RoomStatus, UserId};
use lycan_store::{PlayerDraft, RecordStore, SeatGuard, StoreError};
use tracing::info;

use crate::RoomError;

/// A human asking for a seat.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// `None` for guests.
    pub user_id: Option<UserId>,
    pub name: String,
}

/// Reads and writes the players of a room.
///
/// Capacity is never checked here: every insert goes through the store's
/// seat-guarded primitive, which compares the count and inserts in one
/// step.
pub struct Roster<S> {
    store: Arc<S>,
}

impl<S: RecordStore> Roster<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Seats the host of a freshly created room.
    pub async fn seed(
        &self,
        room: &Room,
        host: &UserId,
        name: &str,
    ) -> Result<Player, RoomError> {
        self.add(
            room,
            Candidate {
                user_id: Some(host.clone()),
                name: name.to_owned(),
            },
        )
        .await
    }

    /// Seats a human in a waiting room.
    ///
    /// # Errors
    /// - [`RoomError::Capacity`] when all `max_players` seats are taken.
    /// - [`RoomError::Conflict`] when the room left `waiting` or the user
    ///   already has a seat.
    /// - [`RoomError::Validation`] for blank or duplicate names.
    pub async fn add(&self, room: &Room, candidate: Candidate) -> Result<Player, RoomError> {
        let name = clean_name(&candidate.name)?;
        let draft = PlayerDraft {
            room_id: room.id,
            user_id: candidate.user_id,
            name,
            is_ai: false,
        };
        let seat = SeatGuard {
            status: RoomStatus::Waiting,
            limit: room.max_players,
        };

        let player = self.store.insert_player(draft, seat).await.map_err(|e| match e {
            StoreError::SeatsFull { limit, .. } => {
                RoomError::Capacity(format!("room {} is full ({limit} seats)", room.code))
            }
            StoreError::StatusMismatch { actual, .. } => RoomError::Conflict(format!(
                "room {} is {actual} and no longer accepts players",
                room.code
            )),
            other => other.into(),
        })?;

        info!(
            room_id = %room.id,
            code = %room.code,
            player_id = %player.id,
            name = %player.name,
            "player joined"
        );
        Ok(player)
    }

    /// Players ordered by `(joined_at, seq)`.
    pub async fn list(&self, room: &Room) -> Result<Vec<Player>, RoomError> {
        Ok(self.store.players(room.id).await?)
    }

    pub async fn count(&self, room: &Room) -> Result<usize, RoomError> {
        Ok(self.store.count_players(room.id).await?)
    }
}

/// Display names are trimmed and may not be blank.
fn clean_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::Validation("name must not be blank".into()));
    }
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use lycan_store::{MemoryStore, RoomDraft};

    use super::*;

    async fn fixture(max: usize) -> (Roster<MemoryStore>, Room) {
        let store = Arc::new(MemoryStore::new());
        let room = store
            .create_room(RoomDraft {
                code: "ROSTER".into(),
                host_id: UserId::new("host"),
                min_players: 4,
                max_players: max,
            })
            .await
            .unwrap();
        (Roster::new(store), room)
    }

    fn guest(name: &str) -> Candidate {
        Candidate {
            user_id: None,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn test_seed_seats_host_as_human() {
        let (roster, room) = fixture(4).await;
        let host = roster.seed(&room, &UserId::new("host"), "Host").await.unwrap();
        assert!(!host.is_ai);
        assert_eq!(host.user_id, Some(UserId::new("host")));
        assert!(host.alive);
        assert_eq!(roster.count(&room).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_trims_names_and_rejects_blank() {
        let (roster, room) = fixture(4).await;
        let p = roster.add(&room, guest("  Ana  ")).await.unwrap();
        assert_eq!(p.name, "Ana");

        let err = roster.add(&room, guest("   ")).await.unwrap_err();
        assert!(matches!(err, RoomError::Validation(_)));

        let err = roster.add(&room, guest("Ana")).await.unwrap_err();
        assert!(matches!(err, RoomError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_past_capacity_fails() {
        let (roster, room) = fixture(4).await;
        for name in ["a", "b", "c", "d"] {
            roster.add(&room, guest(name)).await.unwrap();
        }
        let err = roster.add(&room, guest("e")).await.unwrap_err();
        assert!(matches!(err, RoomError::Capacity(_)));
        assert_eq!(err.status_code(), 409);
        assert_eq!(roster.count(&room).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_list_keeps_join_order() {
        let (roster, room) = fixture(8).await;
        for name in ["zed", "amy", "bob"] {
            roster.add(&room, guest(name)).await.unwrap();
        }
        let names: Vec<_> = roster
            .list(&room)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["zed", "amy", "bob"]);
    }
}
