//! Secret role dealing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use lycan_protocol::{Player, PlayerId, Role};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Number of werewolves for a table of `total` players.
pub fn werewolf_count(total: usize) -> usize {
    match total {
        0..6 => 1,
        6..12 => 2,
        _ => 3,
    }
}

/// The unshuffled role multiset for `total` players: the werewolves, one
/// seer, one guardian, then villagers for every remaining seat.
///
/// For tables smaller than `werewolves + 2` the deck is longer than the
/// table; [`RoleAssigner::assign`] deals only the first `total` cards
/// after shuffling.
pub fn deck(total: usize) -> Vec<Role> {
    let wolves = werewolf_count(total);
    let villagers = total.saturating_sub(wolves + 2);
    let mut deck = Vec::with_capacity(wolves + 2 + villagers);
    deck.extend(std::iter::repeat_n(Role::Werewolf, wolves));
    deck.push(Role::Seer);
    deck.push(Role::Guardian);
    deck.extend(std::iter::repeat_n(Role::Villager, villagers));
    deck
}

/// Shuffles the deck and deals it in join order.
///
/// The RNG is a `ChaCha8Rng`, seeded from a fixed `u64` for reproducible
/// deals or from the thread RNG otherwise.
pub struct RoleAssigner {
    rng: Mutex<ChaCha8Rng>,
    passes: AtomicU64,
}

impl RoleAssigner {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self {
            rng: Mutex::new(rng),
            passes: AtomicU64::new(0),
        }
    }

    /// Pairs each player (in the given order) with a role.
    ///
    /// Pure apart from advancing the RNG; persisting the result is the
    /// caller's job.
    pub fn assign(&self, players: &[Player]) -> Vec<(PlayerId, Role)> {
        let total = players.len();
        let mut deck = deck(total);
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            deck.shuffle(&mut *rng);
        }
        deck.truncate(total);

        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(pass, total, wolves = werewolf_count(total), "roles dealt");

        players.iter().map(|p| p.id).zip(deck).collect()
    }

    /// Completed [`Self::assign`] calls.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}
