//! Round Outcome and Scoring
//!
//! Collects who finished (in order), who died and who scored trap kills
//! during a round, then folds the outcome into the match points table.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

use crate::config::ScoringConfig;
use crate::game::body::ClientId;

/// What happened to the players in one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Finishers in arrival order
    pub finished: Vec<ClientId>,
    /// Players who died
    pub dead: BTreeSet<ClientId>,
    /// Kills credited to the placer of the trap
    pub trap_kills: BTreeMap<ClientId, u32>,
}

impl RoundOutcome {
    /// Empty outcome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finisher. Returns false if already finished or dead.
    pub fn record_finish(&mut self, client: ClientId) -> bool {
        if self.is_done(client) {
            return false;
        }
        self.finished.push(client);
        true
    }

    /// Record a death. Returns false if already finished or dead.
    pub fn record_death(&mut self, client: ClientId) -> bool {
        if self.is_done(client) {
            return false;
        }
        self.dead.insert(client);
        true
    }

    /// Credit a trap kill to the player who placed the trap.
    pub fn credit_trap_kill(&mut self, placer: ClientId) {
        *self.trap_kills.entry(placer).or_insert(0) += 1;
    }

    /// Whether the player has finished or died.
    pub fn is_done(&self, client: ClientId) -> bool {
        self.finished.contains(&client) || self.dead.contains(&client)
    }

    /// Whether the player finished.
    pub fn did_finish(&self, client: ClientId) -> bool {
        self.finished.contains(&client)
    }

    /// Whether every listed player has finished or died.
    pub fn all_done<'a>(&self, players: impl IntoIterator<Item = &'a ClientId>) -> bool {
        players.into_iter().all(|c| self.is_done(*c))
    }
}

/// Points awarded to one player for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Player
    pub client: ClientId,
    /// Reached the goal
    pub finish: u32,
    /// Finished while under half the leader's points
    pub underdog: u32,
    /// Only finisher
    pub single: u32,
    /// First of several finishers
    pub first: u32,
    /// Trap kills
    pub traps: u32,
}

impl ScoreBreakdown {
    /// Sum of all parts.
    pub fn total(&self) -> u32 {
        self.finish + self.underdog + self.single + self.first + self.traps
    }
}

/// Accumulated points across rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsTable {
    config: ScoringConfig,
    points: BTreeMap<ClientId, u32>,
    winner: Option<ClientId>,
}

impl PointsTable {
    /// Table with every player at zero.
    pub fn new(config: ScoringConfig, players: impl IntoIterator<Item = ClientId>) -> Self {
        Self {
            config,
            points: players.into_iter().map(|c| (c, 0)).collect(),
            winner: None,
        }
    }

    /// Add a player mid-match at zero points.
    pub fn add_player(&mut self, client: ClientId) {
        self.points.entry(client).or_insert(0);
    }

    /// Points of a player.
    pub fn points(&self, client: ClientId) -> u32 {
        self.points.get(&client).copied().unwrap_or(0)
    }

    /// All players' points in id order.
    pub fn standings(&self) -> impl Iterator<Item = (ClientId, u32)> + '_ {
        self.points.iter().map(|(c, p)| (*c, *p))
    }

    /// Winner, once someone reached `points_to_win`.
    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    /// Players under half the leader's points (integer halves).
    fn underdogs(&self) -> BTreeSet<ClientId> {
        let best = self.points.values().copied().max().unwrap_or(0);
        self.points
            .iter()
            .filter(|(_, p)| **p < best / 2)
            .map(|(c, _)| *c)
            .collect()
    }

    /// Award points for a round and update the winner.
    ///
    /// Underdog status is judged on points before this round.
    pub fn score_round(&mut self, outcome: &RoundOutcome) -> Vec<ScoreBreakdown> {
        let underdogs = self.underdogs();
        let anyone_finished = !outcome.finished.is_empty();
        let single = outcome.finished.len() == 1;
        let cfg = &self.config;

        let mut breakdowns = Vec::with_capacity(self.points.len());
        for (&client, points) in self.points.iter_mut() {
            let mut b = ScoreBreakdown { client, ..Default::default() };

            if let Some(rank) = outcome.finished.iter().position(|c| *c == client) {
                b.finish = cfg.finish;
                if underdogs.contains(&client) {
                    b.underdog = cfg.underdog;
                }
                if single {
                    b.single = cfg.single_finisher;
                } else if rank == 0 {
                    b.first = cfg.first_finisher;
                }
            }

            if anyone_finished {
                b.traps = outcome.trap_kills.get(&client).copied().unwrap_or(0) * cfg.trap;
            }

            *points += b.total();
            breakdowns.push(b);
        }

        // Highest points wins; ties go to the lowest client id
        let best = self
            .points
            .iter()
            .fold(None::<(ClientId, u32)>, |acc, (c, p)| match acc {
                Some((_, bp)) if bp >= *p => acc,
                _ => Some((*c, *p)),
            });
        if let Some((client, points)) = best {
            if points >= self.config.points_to_win {
                self.winner = Some(client);
            }
        }

        breakdowns
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const A: ClientId = ClientId(1);
    const B: ClientId = ClientId(2);
    const C: ClientId = ClientId(3);

    fn table() -> PointsTable {
        PointsTable::new(ScoringConfig::default(), [A, B, C])
    }

    #[test]
    fn test_single_finisher() {
        let mut t = table();
        let mut outcome = RoundOutcome::new();
        outcome.record_finish(A);
        outcome.record_death(B);

        let scores = t.score_round(&outcome);
        assert_eq!(scores[0].total(), 4 + 3);
        assert_eq!(scores[1].total(), 0);
        assert_eq!(t.points(A), 7);
    }

    #[test]
    fn test_first_of_many() {
        let mut t = table();
        let mut outcome = RoundOutcome::new();
        outcome.record_finish(B);
        outcome.record_finish(A);

        t.score_round(&outcome);
        assert_eq!(t.points(B), 4 + 2);
        assert_eq!(t.points(A), 4);
        assert_eq!(t.points(C), 0);
    }

    #[test]
    fn test_traps_only_count_if_someone_finished() {
        let mut t = table();
        let mut nobody = RoundOutcome::new();
        nobody.record_death(A);
        nobody.credit_trap_kill(C);
        t.score_round(&nobody);
        assert_eq!(t.points(C), 0);

        let mut someone = RoundOutcome::new();
        someone.record_finish(A);
        someone.credit_trap_kill(C);
        someone.credit_trap_kill(C);
        t.score_round(&someone);
        assert_eq!(t.points(C), 2);
    }

    #[test]
    fn test_underdog_bonus() {
        let mut t = table();
        // A pulls ahead to 7
        let mut r1 = RoundOutcome::new();
        r1.record_finish(A);
        t.score_round(&r1);

        // B at 0 < 7/2 finishes second
        let mut r2 = RoundOutcome::new();
        r2.record_finish(A);
        r2.record_finish(B);
        let scores = t.score_round(&r2);
        let b = scores.iter().find(|s| s.client == B).unwrap();
        assert_eq!(b.underdog, 4);
        assert_eq!(b.total(), 8);
        let a = scores.iter().find(|s| s.client == A).unwrap();
        assert_eq!(a.underdog, 0);
    }

    #[test]
    fn test_winner_at_threshold() {
        let mut t = table();
        let mut r = RoundOutcome::new();
        r.record_finish(A);
        t.score_round(&r); // 7
        t.score_round(&r); // 14
        assert_eq!(t.winner(), None);
        t.score_round(&r); // 21
        assert_eq!(t.winner(), Some(A));
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let mut t = PointsTable::new(
            ScoringConfig { points_to_win: 4, ..Default::default() },
            [A, B],
        );
        let mut r = RoundOutcome::new();
        r.record_finish(B);
        r.record_finish(A);
        // B: 4 + 2, A: 4
        t.score_round(&r);
        assert_eq!(t.winner(), Some(B));

        let mut tied = PointsTable::new(
            ScoringConfig { points_to_win: 4, first_finisher: 0, ..Default::default() },
            [A, B],
        );
        tied.score_round(&r);
        assert_eq!(tied.winner(), Some(A));
    }

    #[test]
    fn test_outcome_ignores_repeat_records() {
        let mut r = RoundOutcome::new();
        assert!(r.record_finish(A));
        assert!(!r.record_death(A));
        assert!(!r.record_finish(A));
        assert!(r.all_done([A].iter()));
        assert!(!r.all_done([A, B].iter()));
    }
}
