//! Ballots and round results.

use std::collections::HashMap;
use std::sync::Arc;

use lycan_protocol::{PlayerId, RoomId, TallyResult, Vote};
use lycan_store::{RecordStore, VoteDraft};
use tracing::debug;

use crate::RoomError;

/// Records votes and computes round results. Never touches players;
/// the phase scheduler applies an elimination.
pub struct VoteTally<S> {
    store: Arc<S>,
}

impl<S: RecordStore> VoteTally<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Records `voter`'s ballot for `round`, replacing any earlier one.
    ///
    /// The store refuses the ballot unless `round` is the room's open
    /// voting round and both players are alive members of the room.
    pub async fn cast(
        &self,
        room: RoomId,
        round: u32,
        voter: PlayerId,
        target: PlayerId,
    ) -> Result<Vote, RoomError> {
        let vote = self
            .store
            .put_vote(VoteDraft {
                room_id: room,
                round,
                voter_id: voter,
                target_id: target,
            })
            .await?;
        debug!(room_id = %room, round, %voter, %target, "vote cast");
        Ok(vote)
    }

    /// Votes of `round` ordered by `cast_at`.
    pub async fn list(&self, room: RoomId, round: u32) -> Result<Vec<Vote>, RoomError> {
        Ok(self.store.votes(room, round).await?)
    }

    pub async fn tally(&self, room: RoomId, round: u32) -> Result<Option<TallyResult>, RoomError> {
        Ok(plurality(&self.list(room, round).await?))
    }
}

/// The target with the most votes.
///
/// `None` when there are no votes or when the top count is shared.
pub fn plurality(votes: &[Vote]) -> Option<TallyResult> {
    let mut per_target: HashMap<PlayerId, usize> = HashMap::new();
    for v in votes {
        *per_target.entry(v.target_id).or_default() += 1;
    }

    let mut ranked: Vec<(PlayerId, usize)> = per_target.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    match ranked.as_slice() {
        [] => None,
        [(_, top), (_, second), ..] if top == second => None,
        [(target_id, votes), ..] => Some(TallyResult {
            target_id: *target_id,
            votes: *votes,
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn ballot(voter: u64, target: u64) -> Vote {
        Vote {
            room_id: RoomId(1),
            round: 1,
            voter_id: PlayerId(voter),
            target_id: PlayerId(target),
            cast_at: Utc::now(),
        }
    }

    #[test]
    fn test_plurality_picks_top_target() {
        // A→X, B→X, C→Y
        let votes = [ballot(1, 10), ballot(2, 10), ballot(3, 20)];
        assert_eq!(
            plurality(&votes),
            Some(TallyResult {
                target_id: PlayerId(10),
                votes: 2
            })
        );
    }

    #[test]
    fn test_plurality_without_votes_is_none() {
        assert_eq!(plurality(&[]), None);
    }

    #[test]
    fn test_plurality_tie_is_none() {
        let votes = [ballot(1, 10), ballot(2, 20)];
        assert_eq!(plurality(&votes), None);

        let votes = [ballot(1, 10), ballot(2, 10), ballot(3, 20), ballot(4, 20), ballot(5, 30)];
        assert_eq!(plurality(&votes), None);
    }

    #[test]
    fn test_plurality_single_vote_wins() {
        let votes = [ballot(1, 1)];
        assert_eq!(plurality(&votes).map(|r| r.target_id), Some(PlayerId(1)));
    }
}
