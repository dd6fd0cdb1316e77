//! Persistence contract for Lycan.
//!
//! The engine keeps no authoritative state in memory. Rooms, players and
//! votes live behind [`RecordStore`], whose atomic primitives (seat
//! insertion, compare-and-swap transitions, one-shot role assignment)
//! are what make concurrent joins and racing phase advances safe.
//!
//! [`MemoryStore`] is the in-process backend used by the server binary
//! and by tests.

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{Guard, PhaseState, PlayerDraft, RecordStore, RoomDraft, SeatGuard, VoteDraft};
