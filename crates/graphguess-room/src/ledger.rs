//! Per-room score ledger.

use graphguess_protocol::{ConnectionId, Scoreboard};

/// Scores of the players in one room.
///
/// Entries exist exactly for current players: one is inserted at 0 on join
/// and removed on leave. Scores otherwise only grow.
#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    scores: Scoreboard,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player at 0. An existing score is kept.
    pub fn insert(&mut self, id: ConnectionId) {
        self.scores.entry(id).or_insert(0);
    }

    /// Adds `amount` to a player's score and returns the new total.
    /// Unknown players are ignored.
    pub fn credit(&mut self, id: ConnectionId, amount: u32) -> Option<u32> {
        let score = self.scores.get_mut(&id)?;
        *score = score.saturating_add(amount);
        Some(*score)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<u32> {
        self.scores.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<u32> {
        self.scores.get(&id).copied()
    }

    /// Copy of the scoreboard for broadcasting.
    pub fn snapshot(&self) -> Scoreboard {
        self.scores.clone()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_insert_starts_at_zero() {
        let mut ledger = ScoreLedger::new();
        ledger.insert(cid(1));
        assert_eq!(ledger.get(cid(1)), Some(0));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_insert_keeps_existing_score() {
        let mut ledger = ScoreLedger::new();
        ledger.insert(cid(1));
        ledger.credit(cid(1), 10);
        ledger.insert(cid(1));
        assert_eq!(ledger.get(cid(1)), Some(10));
    }

    #[test]
    fn test_credit_accumulates() {
        let mut ledger = ScoreLedger::new();
        ledger.insert(cid(1));
        assert_eq!(ledger.credit(cid(1), 10), Some(10));
        assert_eq!(ledger.credit(cid(1), 10), Some(20));
    }

    #[test]
    fn test_credit_unknown_player_is_ignored() {
        let mut ledger = ScoreLedger::new();
        assert_eq!(ledger.credit(cid(9), 10), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_drops_entry() {
        let mut ledger = ScoreLedger::new();
        ledger.insert(cid(1));
        ledger.insert(cid(2));
        assert_eq!(ledger.remove(cid(1)), Some(0));
        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&cid(2)));
    }
}
