//! Session and phase engine for Lycan.
//!
//! A host opens a room, players join with its code, `start` pads the table
//! with bots and deals secret roles, and play cycles through timed
//! night / day / voting phases until the host finishes the session.
//!
//! # Key types
//!
//! - [`RoomManager`]: the façade every boundary operation goes through
//! - [`PhaseScheduler`]: the only writer of room status and phase; owns
//!   one deadline driver task per room in play
//! - [`Roster`], [`BotFiller`], [`RoleAssigner`], [`VoteTally`]: the
//!   building blocks the manager and scheduler compose
//! - [`CodeGenerator`]: shareable room codes
//! - [`EngineConfig`]: limits, phase durations, reaper settings
//!
//! All state lives in a [`lycan_store::RecordStore`]; the engine keeps
//! nothing authoritative in memory.

mod bots;
mod codegen;
mod config;
mod error;
mod manager;
mod roles;
mod roster;
mod scheduler;
mod votes;

pub use bots::{BotFiller, bot_name};
pub use codegen::{CodeGenerator, collisions};
pub use config::{EngineConfig, PhaseDurations};
pub use error::RoomError;
pub use manager::{RoomFeed, RoomManager, RoomStatusView};
pub use roles::{RoleAssigner, deck, werewolf_count};
pub use roster::{Candidate, Roster};
pub use scheduler::{PhaseCommand, PhaseScheduler};
pub use votes::{VoteTally, plurality};
