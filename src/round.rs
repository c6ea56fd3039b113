//! Round configuration and per-round state
//!
//! A round plays one difficulty and one category. The difficulty fixes how
//! many questions are asked and how long each may take through a
//! [`RoundTable`].

use std::time::Duration;

use enum_map::EnumMap;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    constants::round::*,
    question::{Category, Difficulty, Question},
};

/// Checks a duration against inclusive bounds given in seconds
pub fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> garde::Result {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Question count and time budget for one difficulty
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RoundConfig {
    /// Questions asked in the round
    #[garde(range(min = 1, max = MAX_QUESTIONS))]
    pub questions: usize,
    /// Time allowed for each question
    #[garde(custom(validate_duration::<MIN_TIME_LIMIT, MAX_TIME_LIMIT>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
}

impl RoundConfig {
    /// Creates a config from a count and a time budget in seconds
    pub const fn new(questions: usize, seconds: u64) -> Self {
        Self {
            questions,
            time_limit: Duration::from_secs(seconds),
        }
    }
}

/// Round configuration per difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RoundTable {
    /// Difficulty 1
    #[garde(dive)]
    pub easy: RoundConfig,
    /// Difficulty 2
    #[garde(dive)]
    pub medium: RoundConfig,
    /// Difficulty 3
    #[garde(dive)]
    pub hard: RoundConfig,
}

impl Default for RoundTable {
    fn default() -> Self {
        Self {
            easy: RoundConfig::new(1, 30),
            medium: RoundConfig::new(2, 25),
            hard: RoundConfig::new(3, 20),
        }
    }
}

impl RoundTable {
    /// The configuration for `difficulty`
    pub fn get(&self, difficulty: Difficulty) -> RoundConfig {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// What to do when a category holds fewer questions than a round needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shortfall {
    /// Refuse to start the round
    #[default]
    Fail,
    /// Repeat questions until the round is full
    Pad,
}

impl Shortfall {
    /// Smallest pool that can fill a round of `needed` questions
    pub fn minimum_pool(self, needed: usize) -> usize {
        match self {
            Self::Fail => needed,
            Self::Pad => 1,
        }
    }
}

/// A named step of the round state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum Phase {
    /// Waiting for the difficulty to be revealed
    #[display("awaiting difficulty")]
    AwaitingDifficulty,
    /// Difficulty known, waiting for the category
    #[display("awaiting topic")]
    AwaitingTopic,
    /// Asking question `index` (zero based) of `count`
    #[display("question {} of {count}", index + 1)]
    Questioning {
        /// Zero-based position of the current question
        index: usize,
        /// Questions in the round
        count: usize,
    },
    /// Every question is judged, the point is not yet awarded
    #[display("awaiting result")]
    AwaitingResult,
    /// The point is awarded, the next round has not started
    #[display("round complete")]
    RoundComplete,
    /// A party reached the win threshold
    #[display("game over")]
    GameOver,
}

/// State of the round being played
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    /// Round number, starting at 1
    pub number: u32,
    /// Revealed difficulty
    pub difficulty: Option<Difficulty>,
    /// Revealed category
    pub category: Option<Category>,
    /// Questions of the round in asking order
    pub questions: Vec<Question>,
    /// Verdicts of the questions judged so far
    pub verdicts: Vec<bool>,
}

impl RoundState {
    /// A fresh round with nothing revealed
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    /// Position of the question awaiting an answer
    pub fn index(&self) -> usize {
        self.verdicts.len()
    }

    /// The question awaiting an answer
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index())
    }

    /// Whether every question has a verdict
    pub fn is_complete(&self) -> bool {
        !self.questions.is_empty() && self.verdicts.len() == self.questions.len()
    }

    /// Whether every question was answered correctly
    pub fn all_correct(&self) -> bool {
        self.is_complete() && self.verdicts.iter().all(|correct| *correct)
    }
}

/// Draws a category uniformly among those holding at least `minimum` questions
pub fn pick_category(counts: &EnumMap<Category, usize>, minimum: usize) -> Option<Category> {
    let eligible = counts
        .iter()
        .filter(|(_, count)| **count >= minimum.max(1))
        .map(|(category, _)| category)
        .collect::<Vec<_>>();
    fastrand::choice(eligible)
}

/// Draws `count` questions from `pool` in random order
///
/// Returns `None` when the pool cannot fill the round under `shortfall`.
pub fn draw_questions(
    pool: &[&Question],
    count: usize,
    shortfall: Shortfall,
) -> Option<Vec<Question>> {
    if count == 0 || pool.len() < shortfall.minimum_pool(count) {
        return None;
    }

    let mut shuffled = pool.to_vec();
    fastrand::shuffle(&mut shuffled);

    Some(
        shuffled
            .into_iter()
            .cycle()
            .take(count)
            .cloned()
            .collect(),
    )
}
