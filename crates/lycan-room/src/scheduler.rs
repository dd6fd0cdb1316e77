//! Phase transitions and the per-room deadline drivers.
//!
//! The scheduler is the only writer of a room's status, phase, deadline,
//! round and winner. Every write is a compare-and-swap against the state
//! the caller observed, so a host action and an expiring deadline can race
//! freely: the first committed write wins and the other is rejected.
//!
//! Each room in play has one driver task. It owns a [`PhaseTimer`] armed
//! with the room's `phase_end_at` and, when that passes, advances the
//! phase. After a host transition the scheduler re-arms the driver over
//! its command channel.
//!
//! ```text
//!           begin            deadline/advance      deadline/advance
//! waiting ────────▶ night ◀──────────────────▶ day ────────────────▶ voting
//!                     ▲          toggle                                 │
//!                     └──────────────── deadline/advance (tally) ───────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lycan_protocol::{Phase, Room, RoomId, RoomStatus, Team};
use lycan_store::{Guard, PhaseState, RecordStore, StoreError};
use lycan_timer::{PhaseTimer, TimerConfig};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{BotFiller, EngineConfig, RoleAssigner, RoomError, VoteTally};

/// Pause before a driver retries a deadline whose advance hit a store
/// failure.
const DRIVER_RETRY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The closed set of transitions a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCommand {
    /// `waiting → night`: seat bots, deal roles, open the first night.
    Begin,
    /// Close the current phase now. Closing `voting` applies the tally.
    Advance,
    /// Flip `night ↔ day`.
    Toggle,
    /// End the session. Allowed from any status except `finished`.
    Finish { winner: Option<Team> },
}

/// Who asked for a transition. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Host,
    Deadline,
    Reaper,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Deadline => write!(f, "deadline"),
            Self::Reaper => write!(f, "reaper"),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseScheduler
// ---------------------------------------------------------------------------

/// Applies [`PhaseCommand`]s and runs one deadline driver per active room.
///
/// Cheap to clone. Dropping the last clone aborts every driver.
pub struct PhaseScheduler<S: RecordStore> {
    inner: Arc<Inner<S>>,
}

impl<S: RecordStore> Clone for PhaseScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore> PhaseScheduler<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            bots: BotFiller::new(Arc::clone(&store)),
            votes: VoteTally::new(Arc::clone(&store)),
            roles: RoleAssigner::new(config.role_seed),
            store,
            config,
            drivers: Mutex::new(HashMap::new()),
        });
        Self { inner }
    }

    /// Applies `cmd` to `room` as last observed by the caller.
    ///
    /// # Errors
    /// [`RoomError::Conflict`] when the room is in the wrong status or
    /// phase, or when another writer moved it since it was observed.
    ///
    /// Every applied command counts as activity for idle reaping.
    pub async fn apply(&self, room: &Room, cmd: PhaseCommand) -> Result<Room, RoomError> {
        let inner = &self.inner;
        let updated = match cmd {
            PhaseCommand::Begin => inner.begin(room).await?,
            PhaseCommand::Advance => {
                let updated = inner.advance(room, Trigger::Host).await?;
                inner.rearm(&updated).await;
                updated
            }
            PhaseCommand::Toggle => {
                let updated = inner.toggle(room).await?;
                inner.rearm(&updated).await;
                updated
            }
            PhaseCommand::Finish { winner } => inner.finish(room, winner, Trigger::Host).await?,
        };
        Ok(inner.touched(updated).await)
    }

    /// Finishes an abandoned room without a winner.
    pub async fn reap(&self, room: &Room) -> Result<Room, RoomError> {
        self.inner.finish(room, None, Trigger::Reaper).await
    }

    /// Spawns drivers for every in-progress room in the store.
    ///
    /// Called once at startup so deadlines keep firing across restarts.
    /// Returns the number of drivers started.
    pub async fn resume(&self) -> Result<usize, RoomError> {
        let inner = &self.inner;
        let mut resumed = 0;
        for room in inner.store.rooms_with_status(RoomStatus::InProgress).await? {
            if let Some(deadline) = room.phase_end_at {
                inner.spawn_driver(room.id, deadline).await;
                resumed += 1;
            }
        }
        for room in inner.store.rooms_with_status(RoomStatus::Starting).await? {
            warn!(
                room_id = %room.id,
                code = %room.code,
                "room was left mid-start, it will be reaped when idle"
            );
        }
        info!(resumed, "phase drivers resumed");
        Ok(resumed)
    }

    /// Number of driver tasks still running.
    pub async fn active_drivers(&self) -> usize {
        self.inner
            .drivers
            .lock()
            .await
            .values()
            .filter(|d| !d.task.is_finished())
            .count()
    }

    /// Completed role deals since this scheduler was created.
    pub fn role_passes(&self) -> u64 {
        self.inner.roles.passes()
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

struct Inner<S: RecordStore> {
    me: Weak<Inner<S>>,
    store: Arc<S>,
    config: EngineConfig,
    bots: BotFiller<S>,
    roles: RoleAssigner,
    votes: VoteTally<S>,
    drivers: Mutex<HashMap<RoomId, DriverHandle>>,
}

impl<S: RecordStore> Inner<S> {
    fn deadline_for(&self, phase: Phase) -> Option<DateTime<Utc>> {
        let length = self.config.durations.of(phase)?;
        let length = chrono::Duration::from_std(length).unwrap_or(chrono::Duration::zero());
        Some(Utc::now() + length)
    }

    fn ensure_in_progress(room: &Room) -> Result<(), RoomError> {
        if room.status == RoomStatus::InProgress {
            Ok(())
        } else {
            Err(RoomError::Conflict(format!(
                "room {} is {}, not in progress",
                room.code, room.status
            )))
        }
    }

    /// The room re-read with its activity mark refreshed, or `room`
    /// unchanged if the touch failed.
    async fn touched(&self, room: Room) -> Room {
        match self.store.touch(room.id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(room_id = %room.id, error = %e, "could not record activity");
                room
            }
        }
    }

    /// Compare-and-swap on the phase and deadline the caller observed.
    async fn swap(&self, room: &Room, to: PhaseState) -> Result<Room, RoomError> {
        let guard = Guard::Phase {
            phase: room.phase,
            phase_end_at: room.phase_end_at,
        };
        self.store
            .transition(room.id, guard, to)
            .await
            .map_err(|e| match e {
                StoreError::TransitionRejected { status, phase, .. } => RoomError::Conflict(
                    format!("room {} already moved on to {status}/{phase}", room.code),
                ),
                other => other.into(),
            })
    }

    async fn begin(&self, room: &Room) -> Result<Room, RoomError> {
        if room.status != RoomStatus::Waiting {
            return Err(RoomError::Conflict(format!(
                "room {} is already {}",
                room.code, room.status
            )));
        }

        let claim = PhaseState {
            status: RoomStatus::Starting,
            ..PhaseState::of(room)
        };
        let claimed = self
            .store
            .transition(room.id, Guard::Status(RoomStatus::Waiting), claim)
            .await
            .map_err(|e| match e {
                StoreError::TransitionRejected { status, .. } => {
                    RoomError::Conflict(format!("room {} is already {status}", room.code))
                }
                other => other.into(),
            })?;
        debug!(room_id = %room.id, code = %room.code, "room claimed for start");

        if let Err(e) = self.deal(&claimed).await {
            warn!(room_id = %room.id, error = %e, "start failed, releasing room");
            if let Err(rollback) = self.store.release_start(room.id).await {
                warn!(room_id = %room.id, error = %rollback, "could not release start claim");
            }
            return Err(e);
        }

        let deadline = self.deadline_for(Phase::Night);
        let night = PhaseState {
            status: RoomStatus::InProgress,
            phase: Phase::Night,
            phase_end_at: deadline,
            round: 0,
            winner: None,
        };
        let started = self
            .store
            .transition(room.id, Guard::Status(RoomStatus::Starting), night)
            .await?;

        info!(
            room_id = %started.id,
            code = %started.code,
            phase = %started.phase,
            "game started"
        );
        if let Some(deadline) = started.phase_end_at {
            self.spawn_driver(started.id, deadline).await;
        }
        Ok(started)
    }

    /// Seats bots up to `max_players` and deals roles once.
    async fn deal(&self, room: &Room) -> Result<(), RoomError> {
        let current = self.store.count_players(room.id).await?;
        self.bots.fill(room, current, room.max_players).await?;

        let players = self.store.players(room.id).await?;
        let roles = self.roles.assign(&players);
        self.store.assign_roles(room.id, roles).await?;
        Ok(())
    }

    async fn advance(&self, room: &Room, trigger: Trigger) -> Result<Room, RoomError> {
        Self::ensure_in_progress(room)?;
        let Some(next) = room.phase.next() else {
            return Err(RoomError::Conflict(format!(
                "room {} has no phase after {}",
                room.code, room.phase
            )));
        };

        let mut to = PhaseState::of(room);
        to.phase = next;
        to.phase_end_at = self.deadline_for(next);
        if next == Phase::Voting {
            to.round += 1;
        }
        let updated = self.swap(room, to).await?;

        info!(
            room_id = %room.id,
            code = %room.code,
            from = %room.phase,
            to = %next,
            round = updated.round,
            %trigger,
            "phase advanced"
        );

        if room.phase == Phase::Voting {
            // The phase is already committed; a failed elimination is
            // logged, not reported to the caller.
            if let Err(e) = self.eliminate(&updated, room.round).await {
                warn!(room_id = %room.id, round = room.round, error = %e, "elimination failed");
            }
        }
        Ok(updated)
    }

    async fn eliminate(&self, room: &Room, round: u32) -> Result<(), RoomError> {
        match self.votes.tally(room.id, round).await? {
            Some(result) => {
                self.store.set_alive(result.target_id, false).await?;
                info!(
                    room_id = %room.id,
                    round,
                    player_id = %result.target_id,
                    votes = result.votes,
                    "player eliminated"
                );
            }
            None => info!(room_id = %room.id, round, "no elimination"),
        }
        Ok(())
    }

    async fn toggle(&self, room: &Room) -> Result<Room, RoomError> {
        Self::ensure_in_progress(room)?;
        let Some(next) = room.phase.toggled() else {
            return Err(RoomError::Conflict(format!(
                "room {} cannot toggle during {}",
                room.code, room.phase
            )));
        };

        let to = PhaseState {
            phase: next,
            phase_end_at: self.deadline_for(next),
            ..PhaseState::of(room)
        };
        let updated = self.swap(room, to).await?;
        info!(
            room_id = %room.id,
            code = %room.code,
            from = %room.phase,
            to = %next,
            "phase toggled"
        );
        Ok(updated)
    }

    async fn finish(
        &self,
        room: &Room,
        winner: Option<Team>,
        trigger: Trigger,
    ) -> Result<Room, RoomError> {
        if room.status.is_finished() {
            return Err(RoomError::Conflict(format!(
                "room {} is already finished",
                room.code
            )));
        }

        let to = PhaseState {
            status: RoomStatus::Finished,
            phase: Phase::Finished,
            phase_end_at: None,
            round: room.round,
            winner,
        };
        let finished = self
            .store
            .transition(room.id, Guard::NotFinished, to)
            .await
            .map_err(|e| match e {
                StoreError::TransitionRejected { .. } => {
                    RoomError::Conflict(format!("room {} is already finished", room.code))
                }
                other => other.into(),
            })?;
        self.stop_driver(room.id).await;

        match trigger {
            Trigger::Reaper => warn!(room_id = %room.id, code = %room.code, "idle room reaped"),
            _ => info!(
                room_id = %room.id,
                code = %room.code,
                winner = ?winner,
                %trigger,
                "room finished"
            ),
        }
        Ok(finished)
    }

    /// Runs when a driver's deadline passes. Returns the deadline the
    /// driver should arm next, or `None` when the room left play.
    async fn on_deadline(
        &self,
        room_id: RoomId,
        deadline: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, RoomError> {
        let room = self.store.room(room_id).await?;
        if room.status != RoomStatus::InProgress {
            return Ok(None);
        }
        if room.phase_end_at != Some(deadline) {
            debug!(room_id = %room_id, "stale deadline, resyncing");
            return Ok(room.phase_end_at);
        }

        match self.advance(&room, Trigger::Deadline).await {
            Ok(updated) => Ok(updated.phase_end_at),
            Err(RoomError::Conflict(reason)) => {
                debug!(room_id = %room_id, %reason, "deadline lost the race");
                let room = self.store.room(room_id).await?;
                Ok(room.phase_end_at.filter(|_| room.status == RoomStatus::InProgress))
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Driver bookkeeping
    // -----------------------------------------------------------------------

    async fn spawn_driver(&self, room_id: RoomId, deadline: DateTime<Utc>) {
        let (tx, rx) = mpsc::channel(self.config.driver_channel_size);
        let driver = Driver {
            room_id,
            scheduler: self.me.clone(),
            timer: PhaseTimer::new(TimerConfig::default()),
            commands: rx,
        };
        let task = tokio::spawn(driver.run(deadline));

        let handle = DriverHandle { commands: tx, task };
        if let Some(old) = self.drivers.lock().await.insert(room_id, handle) {
            old.task.abort();
        }
    }

    /// Points the room's driver at the room's current deadline, spawning
    /// a new driver if the old one is gone or backed up.
    async fn rearm(&self, room: &Room) {
        let Some(deadline) = room.phase_end_at else {
            return;
        };
        {
            let drivers = self.drivers.lock().await;
            if let Some(driver) = drivers.get(&room.id) {
                if !driver.task.is_finished()
                    && driver.commands.try_send(DriverCommand::Arm(deadline)).is_ok()
                {
                    return;
                }
            }
        }
        debug!(room_id = %room.id, "driver unavailable, respawning");
        self.spawn_driver(room.id, deadline).await;
    }

    async fn stop_driver(&self, room_id: RoomId) {
        if let Some(driver) = self.drivers.lock().await.remove(&room_id) {
            driver.task.abort();
            debug!(room_id = %room_id, "phase driver stopped");
        }
    }
}

impl<S: RecordStore> Drop for Inner<S> {
    fn drop(&mut self) {
        for (_, driver) in self.drivers.get_mut().drain() {
            driver.task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

enum DriverCommand {
    /// Replace the pending deadline.
    Arm(DateTime<Utc>),
}

struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
    task: JoinHandle<()>,
}

/// The task that advances one room when its phase deadline passes.
struct Driver<S: RecordStore> {
    room_id: RoomId,
    scheduler: Weak<Inner<S>>,
    timer: PhaseTimer,
    commands: mpsc::Receiver<DriverCommand>,
}

impl<S: RecordStore> Driver<S> {
    async fn run(mut self, first: DateTime<Utc>) {
        self.timer.arm_at(first);
        info!(room_id = %self.room_id, "phase driver started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(DriverCommand::Arm(deadline)) => self.timer.arm_at(deadline),
                    None => break,
                },
                expiry = self.timer.expired() => {
                    let Some(scheduler) = self.scheduler.upgrade() else {
                        break;
                    };
                    match scheduler.on_deadline(self.room_id, expiry.deadline).await {
                        Ok(Some(next)) => self.timer.arm_at(next),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(room_id = %self.room_id, error = %e, "deadline advance failed, retrying");
                            tokio::time::sleep(DRIVER_RETRY).await;
                            self.timer.arm_at(expiry.deadline);
                        }
                    }
                }
            }
        }

        info!(
            room_id = %self.room_id,
            fired = self.timer.stats().fired,
            "phase driver exited"
        );
    }
}
