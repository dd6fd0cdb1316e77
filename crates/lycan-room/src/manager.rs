//! Room manager: the façade every boundary operation goes through.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lycan_protocol::{
    ChangeEvent, Phase, Player, PlayerId, Room, RoomId, RoomStatus, TallyResult, Team, UserId,
    Vote,
};
use lycan_store::{RecordStore, RoomDraft, StoreError};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    Candidate, CodeGenerator, EngineConfig, PhaseCommand, PhaseScheduler, RoomError, Roster,
    VoteTally,
};

/// Display name given to the host when the create request has none.
const DEFAULT_HOST_NAME: &str = "Host";

/// A room as a viewer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatusView {
    pub room: Room,
    pub players: Vec<Player>,
    /// Whole seconds left in the current phase; `None` outside timed
    /// phases.
    pub time_left: Option<u64>,
}

/// Change feed narrowed to one room.
pub struct RoomFeed {
    room_id: RoomId,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl RoomFeed {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Next change in this room. `None` once the store is gone.
    ///
    /// A receiver that falls behind skips the missed events; viewers
    /// re-fetch the status on any event anyway.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.room_id == self.room_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(room_id = %self.room_id, skipped, "change feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Creates rooms, seats players, and routes host and vote actions.
///
/// Holds no room state of its own; everything is read from and written to
/// the injected store. Cheap to clone.
pub struct RoomManager<S: RecordStore> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    roster: Arc<Roster<S>>,
    votes: Arc<VoteTally<S>>,
    scheduler: PhaseScheduler<S>,
}

impl<S: RecordStore> Clone for RoomManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            roster: Arc::clone(&self.roster),
            votes: Arc::clone(&self.votes),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S: RecordStore> RoomManager<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let config = config.validated();
        Self {
            roster: Arc::new(Roster::new(Arc::clone(&store))),
            votes: Arc::new(VoteTally::new(Arc::clone(&store))),
            scheduler: PhaseScheduler::new(Arc::clone(&store), config.clone()),
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &PhaseScheduler<S> {
        &self.scheduler
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Opens a waiting room and seats the host.
    ///
    /// Missing limits fall back to the configured defaults. Codes are
    /// retried on collision up to `code_attempts` times.
    ///
    /// # Errors
    /// - [`RoomError::Validation`] unless
    ///   `player_floor ≤ min_players ≤ max_players ≤ player_ceiling`.
    /// - [`RoomError::Conflict`] when every code attempt collided.
    pub async fn create_room(
        &self,
        host: UserId,
        host_name: Option<String>,
        max_players: Option<usize>,
        min_players: Option<usize>,
    ) -> Result<(Room, Player), RoomError> {
        let max = max_players.unwrap_or(self.config.default_max_players);
        let min = min_players.unwrap_or(self.config.default_min_players.min(max));
        let (floor, ceiling) = (self.config.player_floor, self.config.player_ceiling);
        if !(floor <= min && min <= max && max <= ceiling) {
            return Err(RoomError::Validation(format!(
                "player limits must satisfy {floor} <= min ({min}) <= max ({max}) <= {ceiling}"
            )));
        }

        let room = self.insert_with_fresh_code(&host, min, max).await?;
        let name = host_name.unwrap_or_else(|| DEFAULT_HOST_NAME.to_owned());
        let player = self.roster.seed(&room, &host, &name).await?;
        let room = self.store.room(room.id).await?;

        info!(
            room_id = %room.id,
            code = %room.code,
            host = %host,
            min_players = min,
            max_players = max,
            "room created"
        );
        Ok((room, player))
    }

    async fn insert_with_fresh_code(
        &self,
        host: &UserId,
        min: usize,
        max: usize,
    ) -> Result<Room, RoomError> {
        for attempt in 1..=self.config.code_attempts {
            let code = CodeGenerator::generate(self.config.code_length)?;
            let draft = RoomDraft {
                code,
                host_id: host.clone(),
                min_players: min,
                max_players: max,
            };
            match self.store.create_room(draft).await {
                Ok(room) => return Ok(room),
                Err(StoreError::DuplicateCode(code)) => {
                    debug!(%code, attempt, "room code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(RoomError::Conflict(format!(
            "no free room code after {} attempts",
            self.config.code_attempts
        )))
    }

    /// Seats a human in a waiting room.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] for an unknown code.
    /// - [`RoomError::Conflict`] once the room has started, or when
    ///   `user_id` already holds a seat.
    /// - [`RoomError::Capacity`] when the room is full.
    pub async fn join_room(
        &self,
        code: &str,
        user_id: Option<UserId>,
        name: &str,
    ) -> Result<(Room, Vec<Player>), RoomError> {
        let room = self.resolve(code).await?;
        if !room.status.is_joinable() {
            return Err(RoomError::Conflict(format!(
                "room {} is {} and no longer accepts players",
                room.code, room.status
            )));
        }

        self.roster
            .add(
                &room,
                Candidate {
                    user_id,
                    name: name.to_owned(),
                },
            )
            .await?;
        let players = self.roster.list(&room).await?;
        let room = self.store.room(room.id).await?;
        Ok((room, players))
    }

    /// Seats bots, deals roles, and opens the first night.
    ///
    /// Returns the opening phase and its deadline. A second start on the
    /// same room fails with [`RoomError::Conflict`] and deals nothing.
    pub async fn start_room(&self, code: &str) -> Result<(Phase, DateTime<Utc>), RoomError> {
        let room = self.resolve(code).await?;
        let started = self.scheduler.apply(&room, PhaseCommand::Begin).await?;
        match started.phase_end_at {
            Some(deadline) => Ok((started.phase, deadline)),
            None => Err(StoreError::Inconsistent(format!(
                "room {} started without a deadline",
                started.code
            ))
            .into()),
        }
    }

    /// Room, ordered roster, and seconds left in the current phase.
    ///
    /// Read-only: viewers never drive transitions.
    pub async fn get_status(&self, code: &str) -> Result<RoomStatusView, RoomError> {
        let room = self.resolve(code).await?;
        let players = self.roster.list(&room).await?;
        let time_left = room.time_left(Utc::now());
        Ok(RoomStatusView {
            room,
            players,
            time_left,
        })
    }

    /// [`Self::get_status`] as one seat sees it: every other player's
    /// role is hidden until the room finishes. `None` hides them all.
    pub async fn get_status_as(
        &self,
        code: &str,
        viewer: Option<&UserId>,
    ) -> Result<RoomStatusView, RoomError> {
        let mut view = self.get_status(code).await?;
        if !view.room.status.is_finished() {
            for p in &mut view.players {
                if viewer.is_none() || p.user_id.as_ref() != viewer {
                    p.role = None;
                }
            }
        }
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // Voting
    // -----------------------------------------------------------------------

    /// Records a ballot, replacing the voter's earlier one this round.
    ///
    /// The store re-checks the round and both players under its lock, so
    /// a ballot that loses the race against the voting deadline is
    /// refused rather than filed under a closed round.
    ///
    /// # Errors
    /// - [`RoomError::Conflict`] outside a voting phase or for a round
    ///   other than the current one.
    /// - [`RoomError::Validation`] when voter or target is not a living
    ///   player of the room.
    pub async fn cast_vote(
        &self,
        code: &str,
        round: u32,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<Vote, RoomError> {
        let room = self.resolve(code).await?;
        if room.status != RoomStatus::InProgress || room.phase != Phase::Voting {
            return Err(RoomError::Conflict(format!(
                "room {} is not voting (status {}, phase {})",
                room.code, room.status, room.phase
            )));
        }
        if round != room.round {
            return Err(RoomError::Conflict(format!(
                "round {round} is not open, current round is {}",
                room.round
            )));
        }

        self.votes.cast(room.id, round, voter, target).await
    }

    pub async fn list_votes(&self, code: &str, round: u32) -> Result<Vec<Vote>, RoomError> {
        let room = self.resolve(code).await?;
        self.votes.list(room.id, round).await
    }

    /// Plurality result of `round`; `None` on no votes or a tie.
    pub async fn tally(&self, code: &str, round: u32) -> Result<Option<TallyResult>, RoomError> {
        let room = self.resolve(code).await?;
        self.votes.tally(room.id, round).await
    }

    // -----------------------------------------------------------------------
    // Host actions
    // -----------------------------------------------------------------------

    pub async fn toggle_phase(&self, code: &str, requester: &UserId) -> Result<Room, RoomError> {
        let room = self.hosted(code, requester).await?;
        self.scheduler.apply(&room, PhaseCommand::Toggle).await
    }

    pub async fn advance_phase(&self, code: &str, requester: &UserId) -> Result<Room, RoomError> {
        let room = self.hosted(code, requester).await?;
        self.scheduler.apply(&room, PhaseCommand::Advance).await
    }

    pub async fn finish_room(
        &self,
        code: &str,
        requester: &UserId,
        winner: Team,
    ) -> Result<Room, RoomError> {
        let room = self.hosted(code, requester).await?;
        self.scheduler
            .apply(
                &room,
                PhaseCommand::Finish {
                    winner: Some(winner),
                },
            )
            .await
    }

    // -----------------------------------------------------------------------
    // Feed and housekeeping
    // -----------------------------------------------------------------------

    /// Change events for one room.
    pub async fn subscribe(&self, code: &str) -> Result<RoomFeed, RoomError> {
        let room = self.resolve(code).await?;
        Ok(RoomFeed {
            room_id: room.id,
            receiver: self.store.subscribe(),
        })
    }

    /// Respawns deadline drivers for rooms already in play.
    pub async fn resume(&self) -> Result<usize, RoomError> {
        self.scheduler.resume().await
    }

    /// Finishes every room whose last write is older than
    /// `now - idle_timeout`. Returns the rooms it finished.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> Result<Vec<RoomId>, RoomError> {
        let timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(timeout).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut reaped = Vec::new();
        for room in self.store.idle_rooms(cutoff).await? {
            match self.scheduler.reap(&room).await {
                Ok(_) => reaped.push(room.id),
                // Someone else finished it first.
                Err(RoomError::Conflict(_)) => {}
                Err(e) => warn!(room_id = %room.id, error = %e, "could not reap room"),
            }
        }
        Ok(reaped)
    }

    /// Runs [`Self::reap_idle`] every `reaper_interval` until aborted.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let period = manager.config.reaper_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match manager.reap_idle(Utc::now()).await {
                    Ok(reaped) if !reaped.is_empty() => {
                        info!(count = reaped.len(), "reaper finished idle rooms");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "reaper sweep failed"),
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    async fn resolve(&self, code: &str) -> Result<Room, RoomError> {
        let code = CodeGenerator::normalize(code);
        if code.is_empty() {
            return Err(RoomError::Validation("room code is required".into()));
        }
        if !CodeGenerator::is_well_formed(&code) {
            return Err(RoomError::Validation(format!(
                "{code:?} is not a room code"
            )));
        }
        self.store
            .room_by_code(&code)
            .await?
            .ok_or_else(|| RoomError::NotFound(format!("room {code} not found")))
    }

    async fn hosted(&self, code: &str, requester: &UserId) -> Result<Room, RoomError> {
        let room = self.resolve(code).await?;
        if &room.host_id != requester {
            return Err(RoomError::Forbidden(format!(
                "only the host of room {} may do this",
                room.code
            )));
        }
        Ok(room)
    }
}
