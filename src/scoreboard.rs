//! Score tracking for the two competing parties
//!
//! Every finished round awards exactly one point to one party. The
//! scoreboard keeps the per-round history and derives the totals from it,
//! rebuilding them after deserialization.

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};

use crate::question::{Category, Difficulty};

/// One side of the game
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Enum,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// The players
    #[display("Команда")]
    Team,
    /// The side that scores whenever the players miss
    #[display("Противник")]
    Opponent,
}

/// Result of a single finished round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    /// Round number, starting at 1
    pub round: u32,
    /// Difficulty that was played
    pub difficulty: Difficulty,
    /// Category that was played
    pub category: Category,
    /// Party that received the point
    pub winner: Party,
}

/// Serialization helper for [`Scoreboard`]
#[derive(Deserialize)]
struct ScoreboardSerde {
    rounds: Vec<RoundRecord>,
}

/// Current score of both parties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMessage {
    /// Points of [`Party::Team`]
    pub team_score: u32,
    /// Points of [`Party::Opponent`]
    pub opponent_score: u32,
}

/// Round history and running totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "ScoreboardSerde")]
pub struct Scoreboard {
    /// Finished rounds in play order
    rounds: Vec<RoundRecord>,

    /// Points per party (cached)
    #[serde(skip)]
    totals: EnumMap<Party, u32>,
}

impl From<ScoreboardSerde> for Scoreboard {
    fn from(serde: ScoreboardSerde) -> Self {
        let mut totals = EnumMap::default();
        for record in &serde.rounds {
            totals[record.winner] += 1;
        }
        Self {
            rounds: serde.rounds,
            totals,
        }
    }
}

impl Scoreboard {
    /// Records a finished round and awards its point
    pub fn award(&mut self, record: RoundRecord) {
        self.totals[record.winner] += 1;
        self.rounds.push(record);
    }

    /// Points of `party`
    pub fn score(&self, party: Party) -> u32 {
        self.totals[party]
    }

    /// Both totals
    pub fn scores(&self) -> ScoreMessage {
        ScoreMessage {
            team_score: self.totals[Party::Team],
            opponent_score: self.totals[Party::Opponent],
        }
    }

    /// Finished rounds in play order
    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// The party with more points, `None` on a tie
    pub fn leader(&self) -> Option<Party> {
        let team = self.totals[Party::Team];
        let opponent = self.totals[Party::Opponent];
        match team.cmp(&opponent) {
            std::cmp::Ordering::Greater => Some(Party::Team),
            std::cmp::Ordering::Less => Some(Party::Opponent),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The party that has reached `threshold` points, if any
    pub fn winner(&self, threshold: u32) -> Option<Party> {
        self.totals
            .iter()
            .find(|(_, points)| **points >= threshold)
            .map(|(party, _)| party)
    }

    /// Forgets every round
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn record(round: u32, winner: Party) -> RoundRecord {
        RoundRecord {
            round,
            difficulty: Difficulty::Easy,
            category: Category::Miracles,
            winner,
        }
    }

    #[test]
    fn test_award_and_scores() {
        let mut scoreboard = Scoreboard::default();
        scoreboard.award(record(1, Party::Team));
        scoreboard.award(record(2, Party::Opponent));
        scoreboard.award(record(3, Party::Team));

        assert_eq!(scoreboard.score(Party::Team), 2);
        assert_eq!(
            scoreboard.scores(),
            ScoreMessage {
                team_score: 2,
                opponent_score: 1
            }
        );
        assert_eq!(scoreboard.rounds().len(), 3);
        assert_eq!(scoreboard.leader(), Some(Party::Team));
    }

    #[test]
    fn test_leader_tie() {
        let mut scoreboard = Scoreboard::default();
        assert_eq!(scoreboard.leader(), None);
        scoreboard.award(record(1, Party::Team));
        scoreboard.award(record(2, Party::Opponent));
        assert_eq!(scoreboard.leader(), None);
    }

    #[test]
    fn test_winner_threshold() {
        let mut scoreboard = Scoreboard::default();
        scoreboard.award(record(1, Party::Opponent));
        assert_eq!(scoreboard.winner(2), None);
        scoreboard.award(record(2, Party::Opponent));
        assert_eq!(scoreboard.winner(2), Some(Party::Opponent));
    }

    #[test]
    fn test_serde_rebuilds_totals() {
        let mut scoreboard = Scoreboard::default();
        scoreboard.award(record(1, Party::Team));
        scoreboard.award(record(2, Party::Team));

        let json = serde_json::to_string(&scoreboard).unwrap();
        assert!(json.contains("\"winner\":\"team\""));
        let restored: Scoreboard = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.score(Party::Team), 2);
        assert_eq!(restored.rounds(), scoreboard.rounds());
    }

    #[test]
    fn test_reset_and_display() {
        let mut scoreboard = Scoreboard::default();
        scoreboard.award(record(1, Party::Team));
        scoreboard.reset();
        assert_eq!(scoreboard.scores(), ScoreMessage::default());
        assert_eq!(Party::Opponent.to_string(), "Противник");
    }
}
