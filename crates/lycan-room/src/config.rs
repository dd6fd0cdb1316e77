//! Engine configuration.

use std::time::Duration;

use lycan_protocol::Phase;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// PhaseDurations
// ---------------------------------------------------------------------------

/// How long each timed phase lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub night: Duration,
    pub day: Duration,
    pub voting: Duration,
}

impl PhaseDurations {
    /// Duration of `phase`, or `None` for phases without a deadline.
    pub fn of(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Night => Some(self.night),
            Phase::Day => Some(self.day),
            Phase::Voting => Some(self.voting),
            Phase::Waiting | Phase::Finished => None,
        }
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            night: Duration::from_secs(90),
            day: Duration::from_secs(120),
            voting: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a manager runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of generated room codes.
    pub code_length: usize,

    /// Fresh codes tried before `create` gives up on collisions.
    pub code_attempts: u32,

    /// Smallest `min_players` a host may ask for.
    pub player_floor: usize,

    /// Largest `max_players` a host may ask for.
    pub player_ceiling: usize,

    /// Used when a create request omits `max_players`.
    pub default_max_players: usize,

    /// Used when a create request omits `min_players`.
    pub default_min_players: usize,

    pub durations: PhaseDurations,

    /// Rooms untouched for this long are finished by the reaper.
    pub idle_timeout: Duration,

    /// How often the reaper sweeps.
    pub reaper_interval: Duration,

    /// Fixed seed for role shuffles. `None` seeds from the thread RNG.
    pub role_seed: Option<u64>,

    /// Command channel size of each phase driver.
    pub driver_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_attempts: 8,
            player_floor: 4,
            player_ceiling: 10,
            default_max_players: 8,
            default_min_players: 4,
            durations: PhaseDurations::default(),
            idle_timeout: Duration::from_secs(30 * 60),
            reaper_interval: Duration::from_secs(60),
            role_seed: None,
            driver_channel_size: 16,
        }
    }
}

impl EngineConfig {
    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called by `RoomManager::new`. Rules:
    /// - `code_length` and `code_attempts` are at least 1.
    /// - `player_ceiling` is at least `player_floor`.
    /// - Defaults are clamped into `player_floor..=player_ceiling` and
    ///   `default_min_players ≤ default_max_players`.
    /// - `driver_channel_size` is at least 1.
    pub fn validated(mut self) -> Self {
        if self.code_length == 0 {
            warn!("code_length is 0, using 6");
            self.code_length = 6;
        }
        self.code_attempts = self.code_attempts.max(1);
        if self.player_ceiling < self.player_floor {
            warn!(
                floor = self.player_floor,
                ceiling = self.player_ceiling,
                "player_ceiling below player_floor, raising it"
            );
            self.player_ceiling = self.player_floor;
        }
        self.default_max_players = self
            .default_max_players
            .clamp(self.player_floor, self.player_ceiling);
        self.default_min_players = self
            .default_min_players
            .clamp(self.player_floor, self.default_max_players);
        self.driver_channel_size = self.driver_channel_size.max(1);
        self
    }
}
