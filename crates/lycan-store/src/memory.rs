//! In-memory [`RecordStore`] backed by one `tokio::sync::Mutex`.
//!
//! Every operation takes the lock once, so each primitive is trivially
//! atomic with respect to every other. Good enough for a single process
//! and for tests; a database backend would map the same primitives onto
//! transactions and conditional updates.

use std::collections::BTreeMap;

use chrono::Utc;
use lycan_protocol::{
    Change, ChangeEvent, Player, PlayerId, Role, Room, RoomId, RoomStatus, Vote,
};
use tokio::sync::{broadcast, Mutex};

use crate::{
    Guard, PhaseState, PlayerDraft, RecordStore, RoomDraft, SeatGuard, StoreError,
    VoteDraft,
};

/// Capacity of the change-feed ring buffer.
const FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct Tables {
    rooms: BTreeMap<RoomId, Room>,
    players: BTreeMap<PlayerId, Player>,
    votes: BTreeMap<(RoomId, u32, PlayerId), Vote>,
    next_room: u64,
    next_player: u64,
}

impl Tables {
    fn room_mut(&mut self, id: RoomId) -> Result<&mut Room, StoreError> {
        self.rooms.get_mut(&id).ok_or(StoreError::RoomNotFound(id))
    }

    fn players_in(&self, room: RoomId) -> impl Iterator<Item = &Player> {
        self.players.values().filter(move |p| p.room_id == room)
    }
}

pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            tables: Mutex::new(Tables::default()),
            feed,
        }
    }

    fn notify(&self, room_id: RoomId, change: Change) {
        // No subscribers is fine; the feed is optional.
        let _ = self.feed.send(ChangeEvent { room_id, change });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    async fn create_room(&self, draft: RoomDraft) -> Result<Room, StoreError> {
        let mut t = self.tables.lock().await;
        let taken = t
            .rooms
            .values()
            .any(|r| r.code == draft.code && !r.status.is_finished());
        if taken {
            return Err(StoreError::DuplicateCode(draft.code));
        }

        t.next_room += 1;
        let now = Utc::now();
        let room = Room {
            id: RoomId(t.next_room),
            code: draft.code,
            host_id: draft.host_id,
            status: RoomStatus::Waiting,
            phase: lycan_protocol::Phase::Waiting,
            phase_end_at: None,
            min_players: draft.min_players,
            max_players: draft.max_players,
            round: 0,
            winner: None,
            created_at: now,
            updated_at: now,
            active_at: now,
        };
        t.rooms.insert(room.id, room.clone());
        drop(t);

        self.notify(room.id, Change::Room);
        Ok(room)
    }

    async fn room(&self, id: RoomId) -> Result<Room, StoreError> {
        let t = self.tables.lock().await;
        t.rooms.get(&id).cloned().ok_or(StoreError::RoomNotFound(id))
    }

    async fn room_by_code(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let t = self.tables.lock().await;
        let found = t
            .rooms
            .values()
            .filter(|r| r.code == code)
            .max_by_key(|r| (!r.status.is_finished(), r.id));
        Ok(found.cloned())
    }

    async fn rooms_with_status(&self, status: RoomStatus) -> Result<Vec<Room>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.rooms
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn idle_rooms(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<Vec<Room>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.rooms
            .values()
            .filter(|r| !r.status.is_finished() && r.active_at < cutoff)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: RoomId,
        guard: Guard,
        to: PhaseState,
    ) -> Result<Room, StoreError> {
        let mut t = self.tables.lock().await;
        let room = t.room_mut(id)?;
        if !guard.admits(room) {
            return Err(StoreError::TransitionRejected {
                room: id,
                status: room.status,
                phase: room.phase,
            });
        }

        let mut next = room.clone();
        next.status = to.status;
        next.phase = to.phase;
        next.phase_end_at = to.phase_end_at;
        next.round = to.round;
        next.winner = to.winner;
        next.updated_at = Utc::now();
        if !next.is_consistent() {
            return Err(StoreError::Inconsistent(format!(
                "{} with phase {} and deadline {:?}",
                next.status, next.phase, next.phase_end_at
            )));
        }

        *room = next.clone();
        drop(t);

        self.notify(id, Change::Room);
        Ok(next)
    }

    async fn touch(&self, id: RoomId) -> Result<Room, StoreError> {
        let mut t = self.tables.lock().await;
        let room = t.room_mut(id)?;
        let now = Utc::now();
        room.updated_at = now;
        room.active_at = now;
        Ok(room.clone())
    }

    async fn release_start(&self, id: RoomId) -> Result<Room, StoreError> {
        let mut t = self.tables.lock().await;
        let room = t.room_mut(id)?;
        if room.status != RoomStatus::Starting {
            return Err(StoreError::TransitionRejected {
                room: id,
                status: room.status,
                phase: room.phase,
            });
        }
        room.status = RoomStatus::Waiting;
        room.phase = lycan_protocol::Phase::Waiting;
        room.phase_end_at = None;
        room.updated_at = Utc::now();
        let released = room.clone();

        let bots: Vec<PlayerId> = t
            .players_in(id)
            .filter(|p| p.is_ai)
            .map(|p| p.id)
            .collect();
        for bot in &bots {
            t.players.remove(bot);
        }
        let mut cleared = Vec::new();
        for p in t.players.values_mut().filter(|p| p.room_id == id) {
            if p.role.take().is_some() {
                cleared.push(p.id);
            }
        }
        drop(t);

        tracing::debug!(
            room_id = %id,
            bots = bots.len(),
            cleared = cleared.len(),
            "start released"
        );
        self.notify(id, Change::Room);
        for player_id in bots.into_iter().chain(cleared) {
            self.notify(id, Change::Player { player_id });
        }
        Ok(released)
    }

    async fn insert_player(
        &self,
        draft: PlayerDraft,
        seat: SeatGuard,
    ) -> Result<Player, StoreError> {
        let mut t = self.tables.lock().await;
        let room = t
            .rooms
            .get(&draft.room_id)
            .ok_or(StoreError::RoomNotFound(draft.room_id))?;
        if room.status != seat.status {
            return Err(StoreError::StatusMismatch {
                room: draft.room_id,
                expected: seat.status,
                actual: room.status,
            });
        }

        let mut count = 0;
        for p in t.players_in(draft.room_id) {
            count += 1;
            if p.name == draft.name {
                return Err(StoreError::NameTaken {
                    room: draft.room_id,
                    name: draft.name,
                });
            }
            if let (Some(existing), Some(user)) = (&p.user_id, &draft.user_id) {
                if existing == user {
                    return Err(StoreError::AlreadySeated {
                        room: draft.room_id,
                        user: user.clone(),
                    });
                }
            }
        }
        if count >= seat.limit {
            return Err(StoreError::SeatsFull {
                room: draft.room_id,
                limit: seat.limit,
            });
        }

        t.next_player += 1;
        let now = Utc::now();
        let player = Player {
            id: PlayerId(t.next_player),
            room_id: draft.room_id,
            user_id: draft.user_id,
            name: draft.name,
            is_ai: draft.is_ai,
            role: None,
            joined_at: now,
            seq: t.next_player,
            alive: true,
        };
        t.players.insert(player.id, player.clone());
        let room = t.room_mut(draft.room_id)?;
        room.updated_at = now;
        room.active_at = now;
        drop(t);

        self.notify(player.room_id, Change::Player { player_id: player.id });
        Ok(player)
    }

    async fn players(&self, room: RoomId) -> Result<Vec<Player>, StoreError> {
        let t = self.tables.lock().await;
        if !t.rooms.contains_key(&room) {
            return Err(StoreError::RoomNotFound(room));
        }
        let mut players: Vec<Player> = t.players_in(room).cloned().collect();
        players.sort_by_key(|p| (p.joined_at, p.seq));
        Ok(players)
    }

    async fn count_players(&self, room: RoomId) -> Result<usize, StoreError> {
        let t = self.tables.lock().await;
        if !t.rooms.contains_key(&room) {
            return Err(StoreError::RoomNotFound(room));
        }
        Ok(t.players_in(room).count())
    }

    async fn assign_roles(
        &self,
        room: RoomId,
        roles: Vec<(PlayerId, Role)>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock().await;
        if !t.rooms.contains_key(&room) {
            return Err(StoreError::RoomNotFound(room));
        }
        if t.players_in(room).any(|p| p.role.is_some()) {
            return Err(StoreError::RolesAlreadyAssigned(room));
        }
        // Validate the whole batch before writing any of it.
        for (id, _) in &roles {
            match t.players.get(id) {
                Some(p) if p.room_id == room => {}
                _ => return Err(StoreError::PlayerNotFound(*id)),
            }
        }

        let now = Utc::now();
        for (id, role) in &roles {
            if let Some(p) = t.players.get_mut(id) {
                p.role = Some(*role);
            }
        }
        t.room_mut(room)?.updated_at = now;
        drop(t);

        for (id, _) in roles {
            self.notify(room, Change::Player { player_id: id });
        }
        Ok(())
    }

    async fn set_alive(&self, player: PlayerId, alive: bool) -> Result<Player, StoreError> {
        let mut t = self.tables.lock().await;
        let p = t
            .players
            .get_mut(&player)
            .ok_or(StoreError::PlayerNotFound(player))?;
        p.alive = alive;
        let updated = p.clone();
        drop(t);

        self.notify(updated.room_id, Change::Player { player_id: player });
        Ok(updated)
    }

    async fn put_vote(&self, draft: VoteDraft) -> Result<Vote, StoreError> {
        let mut t = self.tables.lock().await;
        let room = t
            .rooms
            .get(&draft.room_id)
            .ok_or(StoreError::RoomNotFound(draft.room_id))?;
        let open = room.status == RoomStatus::InProgress
            && room.phase == lycan_protocol::Phase::Voting
            && room.round == draft.round;
        if !open {
            return Err(StoreError::BallotClosed {
                room: draft.room_id,
                round: draft.round,
                status: room.status,
                phase: room.phase,
                current: room.round,
            });
        }
        for id in [draft.voter_id, draft.target_id] {
            match t.players.get(&id) {
                Some(p) if p.room_id == draft.room_id && p.alive => {}
                Some(p) if p.room_id == draft.room_id => return Err(StoreError::NotAlive(id)),
                _ => return Err(StoreError::PlayerNotFound(id)),
            }
        }

        let now = Utc::now();
        let vote = Vote {
            room_id: draft.room_id,
            round: draft.round,
            voter_id: draft.voter_id,
            target_id: draft.target_id,
            cast_at: now,
        };
        let replaced = t
            .votes
            .insert((draft.room_id, draft.round, draft.voter_id), vote.clone());
        let room = t.room_mut(draft.room_id)?;
        room.updated_at = now;
        room.active_at = now;
        drop(t);

        if replaced.is_some() {
            tracing::debug!(
                room_id = %vote.room_id,
                round = vote.round,
                voter = %vote.voter_id,
                "vote replaced"
            );
        }
        self.notify(vote.room_id, Change::Vote { round: vote.round });
        Ok(vote)
    }

    async fn votes(&self, room: RoomId, round: u32) -> Result<Vec<Vote>, StoreError> {
        let t = self.tables.lock().await;
        let mut votes: Vec<Vote> = t
            .votes
            .range((room, round, PlayerId(0))..=(room, round, PlayerId(u64::MAX)))
            .map(|(_, v)| v.clone())
            .collect();
        votes.sort_by_key(|v| (v.cast_at, v.voter_id));
        Ok(votes)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use lycan_protocol::{Phase, UserId};

    use super::*;

    fn draft(code: &str) -> RoomDraft {
        RoomDraft {
            code: code.into(),
            host_id: UserId::new("host"),
            min_players: 4,
            max_players: 4,
        }
    }

    fn human(room: RoomId, name: &str, user: Option<&str>) -> PlayerDraft {
        PlayerDraft {
            room_id: room,
            user_id: user.map(UserId::new),
            name: name.into(),
            is_ai: false,
        }
    }

    fn lobby(limit: usize) -> SeatGuard {
        SeatGuard {
            status: RoomStatus::Waiting,
            limit,
        }
    }

    /// Moves a room straight into voting round `round`.
    async fn open_ballot(store: &MemoryStore, room: &Room, round: u32) -> Room {
        let to = PhaseState {
            status: RoomStatus::InProgress,
            phase: Phase::Voting,
            phase_end_at: Some(Utc::now() + chrono::Duration::seconds(60)),
            round,
            winner: None,
        };
        store.transition(room.id, Guard::NotFinished, to).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_room_rejects_code_of_active_room() {
        let store = MemoryStore::new();
        store.create_room(draft("ABCDEF")).await.unwrap();
        let err = store.create_room(draft("ABCDEF")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode(c) if c == "ABCDEF"));
    }

    #[tokio::test]
    async fn test_create_room_allows_code_of_finished_room() {
        let store = MemoryStore::new();
        let old = store.create_room(draft("ABCDEF")).await.unwrap();
        store
            .transition(
                old.id,
                Guard::NotFinished,
                PhaseState {
                    status: RoomStatus::Finished,
                    phase: Phase::Finished,
                    phase_end_at: None,
                    round: 0,
                    winner: None,
                },
            )
            .await
            .unwrap();

        let new = store.create_room(draft("ABCDEF")).await.unwrap();
        let found = store.room_by_code("ABCDEF").await.unwrap().unwrap();
        assert_eq!(found.id, new.id, "active room wins the code lookup");
    }

    #[tokio::test]
    async fn test_insert_player_enforces_limit() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        store.insert_player(human(room.id, "a", None), lobby(2)).await.unwrap();
        store.insert_player(human(room.id, "b", None), lobby(2)).await.unwrap();

        let err = store
            .insert_player(human(room.id, "c", None), lobby(2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SeatsFull { limit: 2, .. }));
        assert_eq!(store.count_players(room.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_player_checks_status() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let guard = SeatGuard {
            status: RoomStatus::Starting,
            limit: 8,
        };
        let err = store
            .insert_player(human(room.id, "bot", None), guard)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusMismatch {
                expected: RoomStatus::Starting,
                actual: RoomStatus::Waiting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_insert_player_rejects_duplicate_name_and_user() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        store
            .insert_player(human(room.id, "Ana", Some("u1")), lobby(8))
            .await
            .unwrap();

        let err = store
            .insert_player(human(room.id, "Ana", None), lobby(8))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NameTaken { .. }));

        let err = store
            .insert_player(human(room.id, "Bea", Some("u1")), lobby(8))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadySeated { .. }));
    }

    #[tokio::test]
    async fn test_players_are_ordered_by_join() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        for name in ["c", "a", "b"] {
            store.insert_player(human(room.id, name, None), lobby(8)).await.unwrap();
        }
        let names: Vec<String> = store
            .players(room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_transition_guard_mismatch_is_rejected() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let to = PhaseState {
            status: RoomStatus::Starting,
            ..PhaseState::of(&room)
        };
        store
            .transition(room.id, Guard::Status(RoomStatus::Waiting), to)
            .await
            .unwrap();

        let err = store
            .transition(room.id, Guard::Status(RoomStatus::Waiting), to)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::TransitionRejected {
                status: RoomStatus::Starting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transition_rejects_inconsistent_target() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let to = PhaseState {
            status: RoomStatus::InProgress,
            phase: Phase::Night,
            phase_end_at: None,
            round: 0,
            winner: None,
        };
        let err = store
            .transition(room.id, Guard::NotFinished, to)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Inconsistent(_)));
        assert_eq!(store.room(room.id).await.unwrap().status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn test_assign_roles_is_at_most_once() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let p = store.insert_player(human(room.id, "a", None), lobby(8)).await.unwrap();

        store
            .assign_roles(room.id, vec![(p.id, Role::Seer)])
            .await
            .unwrap();
        let err = store
            .assign_roles(room.id, vec![(p.id, Role::Werewolf)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RolesAlreadyAssigned(_)));
        assert_eq!(
            store.players(room.id).await.unwrap()[0].role,
            Some(Role::Seer)
        );
    }

    #[tokio::test]
    async fn test_assign_roles_rejects_foreign_player_without_partial_write() {
        let store = MemoryStore::new();
        let a = store.create_room(draft("AAAAAA")).await.unwrap();
        let b = store.create_room(draft("BBBBBB")).await.unwrap();
        let pa = store.insert_player(human(a.id, "a", None), lobby(8)).await.unwrap();
        let pb = store.insert_player(human(b.id, "b", None), lobby(8)).await.unwrap();

        let err = store
            .assign_roles(a.id, vec![(pa.id, Role::Seer), (pb.id, Role::Werewolf)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PlayerNotFound(id) if id == pb.id));
        assert_eq!(store.players(a.id).await.unwrap()[0].role, None);
    }

    #[tokio::test]
    async fn test_put_vote_overwrites_same_voter_and_round() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let a = store.insert_player(human(room.id, "a", None), lobby(8)).await.unwrap();
        let x = store.insert_player(human(room.id, "x", None), lobby(8)).await.unwrap();
        let y = store.insert_player(human(room.id, "y", None), lobby(8)).await.unwrap();
        open_ballot(&store, &room, 1).await;

        let ballot = |target| VoteDraft {
            room_id: room.id,
            round: 1,
            voter_id: a.id,
            target_id: target,
        };
        store.put_vote(ballot(x.id)).await.unwrap();
        store.put_vote(ballot(y.id)).await.unwrap();

        let votes = store.votes(room.id, 1).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].target_id, y.id);
        assert!(store.votes(room.id, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_vote_rejects_closed_round() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let a = store.insert_player(human(room.id, "a", None), lobby(8)).await.unwrap();
        let x = store.insert_player(human(room.id, "x", None), lobby(8)).await.unwrap();
        let ballot = |round| VoteDraft {
            room_id: room.id,
            round,
            voter_id: a.id,
            target_id: x.id,
        };

        // Lobby: nothing is open yet.
        let err = store.put_vote(ballot(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::BallotClosed { current: 0, .. }));

        let voting = open_ballot(&store, &room, 1).await;
        let err = store.put_vote(ballot(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::BallotClosed { round: 2, current: 1, .. }));

        // Voting closes; a ballot for the round it just closed is refused.
        let night = PhaseState {
            phase: Phase::Night,
            ..PhaseState::of(&voting)
        };
        store.transition(room.id, Guard::NotFinished, night).await.unwrap();
        let err = store.put_vote(ballot(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::BallotClosed { phase: Phase::Night, .. }));
        assert!(store.votes(room.id, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_vote_rejects_dead_players() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let a = store.insert_player(human(room.id, "a", None), lobby(8)).await.unwrap();
        let x = store.insert_player(human(room.id, "x", None), lobby(8)).await.unwrap();
        open_ballot(&store, &room, 1).await;
        store.set_alive(x.id, false).await.unwrap();

        let err = store
            .put_vote(VoteDraft {
                room_id: room.id,
                round: 1,
                voter_id: a.id,
                target_id: x.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAlive(id) if id == x.id));

        let err = store
            .put_vote(VoteDraft {
                room_id: room.id,
                round: 1,
                voter_id: x.id,
                target_id: a.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAlive(id) if id == x.id));
    }

    #[tokio::test]
    async fn test_release_start_removes_bots_and_roles() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let host = store.insert_player(human(room.id, "host", Some("h")), lobby(4)).await.unwrap();
        let claim = PhaseState {
            status: RoomStatus::Starting,
            ..PhaseState::of(&room)
        };
        store
            .transition(room.id, Guard::Status(RoomStatus::Waiting), claim)
            .await
            .unwrap();
        let starting = SeatGuard {
            status: RoomStatus::Starting,
            limit: 4,
        };
        let bot = PlayerDraft {
            room_id: room.id,
            user_id: None,
            name: "AI_x".into(),
            is_ai: true,
        };
        let bot = store.insert_player(bot, starting).await.unwrap();
        store
            .assign_roles(room.id, vec![(host.id, Role::Seer), (bot.id, Role::Werewolf)])
            .await
            .unwrap();

        let released = store.release_start(room.id).await.unwrap();
        assert_eq!(released.status, RoomStatus::Waiting);
        assert_eq!(released.phase, Phase::Waiting);

        let players = store.players(room.id).await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, host.id);
        assert_eq!(players[0].role, None);

        // Only a room mid-start can be released.
        let err = store.release_start(room.id).await.unwrap_err();
        assert!(matches!(err, StoreError::TransitionRejected { .. }));
    }

    #[tokio::test]
    async fn test_idle_rooms_ignore_automatic_transitions() {
        let store = MemoryStore::new();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let voting = open_ballot(&store, &room, 1).await;
        assert_eq!(voting.active_at, room.active_at);
        assert!(voting.updated_at >= room.updated_at);

        let cutoff = room.active_at + chrono::Duration::seconds(1);
        let idle = store.idle_rooms(cutoff).await.unwrap();
        assert_eq!(idle.len(), 1);

        let touched = store.touch(room.id).await.unwrap();
        assert!(touched.active_at >= room.active_at);
        let idle = store.idle_rooms(room.active_at).await.unwrap();
        assert!(idle.is_empty());
    }

    #[tokio::test]
    async fn test_feed_reports_room_scoped_changes() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();
        let room = store.create_room(draft("AAAAAA")).await.unwrap();
        let p = store.insert_player(human(room.id, "a", None), lobby(8)).await.unwrap();

        assert_eq!(
            feed.recv().await.unwrap(),
            ChangeEvent {
                room_id: room.id,
                change: Change::Room
            }
        );
        assert_eq!(
            feed.recv().await.unwrap(),
            ChangeEvent {
                room_id: room.id,
                change: Change::Player { player_id: p.id }
            }
        );
    }
}
