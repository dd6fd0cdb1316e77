//! Synthetic players that pad a room to its seat count at start.

use std::collections::HashSet;
use std::sync::Arc;

use lycan_protocol::{Player, Room, RoomStatus};
use lycan_store::{PlayerDraft, RecordStore, SeatGuard, StoreError};
use rand::Rng;
use tracing::{debug, info};

use crate::RoomError;

const BOT_PREFIX: &str = "AI_";
const BOT_SUFFIX_LEN: usize = 5;
const BOT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Inserts bots until a room reaches its target size.
///
/// Bots are only seated while the room is claimed by `start`
/// (`status = starting`). Each insert is seat-guarded, so a fill can
/// never push a room past `max_players` even if it runs twice.
pub struct BotFiller<S> {
    store: Arc<S>,
}

impl<S: RecordStore> BotFiller<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Seats `target - current` bots (none if `current ≥ target`).
    ///
    /// Bot names are `AI_` plus five `[a-z0-9]` characters and are unique
    /// within the room.
    pub async fn fill(
        &self,
        room: &Room,
        current: usize,
        target: usize,
    ) -> Result<Vec<Player>, RoomError> {
        let needed = target.saturating_sub(current);
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut taken: HashSet<String> = self
            .store
            .players(room.id)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        let seat = SeatGuard {
            status: RoomStatus::Starting,
            limit: target.min(room.max_players),
        };

        let mut bots = Vec::with_capacity(needed);
        while bots.len() < needed {
            let name = bot_name(&taken);
            let draft = PlayerDraft {
                room_id: room.id,
                user_id: None,
                name: name.clone(),
                is_ai: true,
            };
            match self.store.insert_player(draft, seat).await {
                Ok(bot) => {
                    taken.insert(name);
                    bots.push(bot);
                }
                Err(StoreError::NameTaken { .. }) => {
                    debug!(room_id = %room.id, %name, "bot name taken, retrying");
                    taken.insert(name);
                }
                Err(StoreError::StatusMismatch { actual, .. }) => {
                    return Err(RoomError::Conflict(format!(
                        "room {} is {actual}, bots are only seated during start",
                        room.code
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(room_id = %room.id, code = %room.code, bots = bots.len(), "bots seated");
        Ok(bots)
    }
}

/// A bot name not in `taken`.
pub fn bot_name(taken: &HashSet<String>) -> String {
    let mut rng = rand::rng();
    loop {
        let suffix: String = (0..BOT_SUFFIX_LEN)
            .map(|_| BOT_ALPHABET[rng.random_range(0..BOT_ALPHABET.len())] as char)
            .collect();
        let name = format!("{BOT_PREFIX}{suffix}");
        if !taken.contains(&name) {
            return name;
        }
    }
}
