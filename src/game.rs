//! Round and score engine
//!
//! This module contains the main game struct. A game is a sequence of
//! rounds played by the team against the opponent. Each round walks
//! through a fixed set of phases:
//!
//! `AwaitingDifficulty -> AwaitingTopic -> Questioning(n of N) ->
//! AwaitingResult -> RoundComplete`, and finally `GameOver` once a party
//! reaches the win threshold.
//!
//! Every operation checks the current phase first; a call made in the wrong
//! phase returns [`Error::OutOfPhase`] and changes nothing.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::{
    bank::{Filter, QuestionBank, Source},
    constants::round::{DEFAULT_WIN_THRESHOLD, MAX_WIN_THRESHOLD},
    judge::{Referee, Ruling},
    question::{Category, Difficulty},
    round::{Phase, RoundState, RoundTable, Shortfall, draw_questions, pick_category},
    scoreboard::{Party, RoundRecord, ScoreMessage, Scoreboard},
    storage::KeyValueStore,
    timer::{AlarmMessage, Alarms, Countdown},
};

/// Game configuration options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Points needed to win the game
    #[garde(range(min = 1, max = MAX_WIN_THRESHOLD))]
    pub win_threshold: u32,
    /// Whether answers go to the remote judge before local matching
    #[garde(skip)]
    pub ai_judging: bool,
    /// Which questions rounds are drawn from
    #[garde(skip)]
    pub source: Source,
    /// What to do when a category is too small for a round
    #[garde(skip)]
    pub shortfall: Shortfall,
    /// Question count and time budget per difficulty
    #[garde(dive)]
    pub rounds: RoundTable,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            win_threshold: DEFAULT_WIN_THRESHOLD,
            ai_judging: false,
            source: Source::default(),
            shortfall: Shortfall::default(),
            rounds: RoundTable::default(),
        }
    }
}

/// Errors raised by the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation is not allowed in the current phase
    #[error("cannot {action} while {phase}")]
    OutOfPhase {
        /// Operation that was attempted
        action: &'static str,
        /// Phase the game is in
        phase: Phase,
    },
    /// The bank cannot fill the round
    #[error(
        "not enough questions of difficulty {difficulty}{}: need {needed}, have {available}",
        .category.map(|c| format!(" in «{c}»")).unwrap_or_default()
    )]
    InsufficientQuestions {
        /// Requested difficulty
        difficulty: Difficulty,
        /// Requested category, `None` when drawn at random
        category: Option<Category>,
        /// Questions the round needs
        needed: usize,
        /// Largest matching pool found
        available: usize,
    },
    /// The options are out of bounds
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Announces the difficulty of a round
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyReveal {
    /// Round number
    pub round: u32,
    /// Revealed difficulty
    pub difficulty: Difficulty,
    /// Questions in the round
    pub questions: usize,
    /// Time allowed per question
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
}

/// Announces the topic of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicReveal {
    /// Revealed category
    pub category: Category,
    /// Questions in the round
    pub questions: usize,
}

/// A question being asked
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPrompt {
    /// Zero-based position in the round
    pub index: usize,
    /// Questions in the round
    pub count: usize,
    /// Question text
    pub text: String,
    /// Topic
    pub category: Category,
    /// Difficulty
    pub difficulty: Difficulty,
    /// Time left to answer
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub remaining: Duration,
}

/// Result of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    /// Zero-based position in the round
    pub index: usize,
    /// Questions in the round
    pub count: usize,
    /// The verdict
    pub ruling: Ruling,
    /// Canonical answer, revealed after judging
    pub correct_answer: String,
    /// Whether this was the last question of the round
    pub round_finished: bool,
}

/// Result of a finished round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    /// Round number
    pub round: u32,
    /// Party awarded the point
    pub winner: Party,
    /// Totals after the award
    pub scores: ScoreMessage,
    /// Whether the winner of the round has also won the game
    pub game_over: bool,
}

/// The game engine
#[derive(Debug)]
pub struct Game {
    /// Game configuration options
    options: Options,
    /// Totals and round history
    scoreboard: Scoreboard,
    /// The round being played
    round: RoundState,
    /// Current phase
    phase: Phase,
    /// Countdown of the question being asked
    countdown: Option<Countdown>,
}

impl Default for Game {
    fn default() -> Self {
        Self::with_valid_options(Options::default())
    }
}

impl Game {
    /// Creates a game waiting for the first difficulty
    ///
    /// # Errors
    ///
    /// Fails if `options` are out of bounds.
    pub fn new(options: Options) -> Result<Self, Error> {
        options
            .validate()
            .map_err(|report| Error::InvalidOptions(report.to_string()))?;
        Ok(Self::with_valid_options(options))
    }

    fn with_valid_options(options: Options) -> Self {
        Self {
            options,
            scoreboard: Scoreboard::default(),
            round: RoundState::new(1),
            phase: Phase::AwaitingDifficulty,
            countdown: None,
        }
    }

    /// Game configuration options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The round being played
    pub fn round(&self) -> &RoundState {
        &self.round
    }

    /// Totals and round history
    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Time left for the current question, if its countdown is running
    pub fn remaining_time(&self) -> Option<Duration> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    /// The party that has won the game, if any
    pub fn winner(&self) -> Option<Party> {
        self.scoreboard.winner(self.options.win_threshold)
    }

    fn out_of_phase<T>(&self, action: &'static str) -> Result<T, Error> {
        Err(Error::OutOfPhase {
            action,
            phase: self.phase,
        })
    }

    fn change_phase(&mut self, before: Phase, after: Phase) -> bool {
        if self.phase == before {
            debug!(round = self.round.number, from = %before, to = %after, "phase change");
            self.phase = after;
            true
        } else {
            false
        }
    }

    /// Reveals the difficulty of the round, drawing one if none is chosen
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::AwaitingDifficulty`].
    pub fn reveal_difficulty(
        &mut self,
        chosen: Option<Difficulty>,
    ) -> Result<DifficultyReveal, Error> {
        if self.phase != Phase::AwaitingDifficulty {
            return self.out_of_phase("reveal the difficulty");
        }

        let difficulty = chosen.unwrap_or_else(Difficulty::random);
        let config = self.options.rounds.get(difficulty);
        self.round.difficulty = Some(difficulty);
        self.change_phase(Phase::AwaitingDifficulty, Phase::AwaitingTopic);

        Ok(DifficultyReveal {
            round: self.round.number,
            difficulty,
            questions: config.questions,
            time_limit: config.time_limit,
        })
    }

    /// Reveals the topic and draws the questions of the round
    ///
    /// Without a chosen category, one is drawn among the categories that can
    /// fill the round. On [`Error::InsufficientQuestions`] the phase stays
    /// [`Phase::AwaitingTopic`] so another category can be tried.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::AwaitingTopic`] or when the bank cannot fill
    /// the round.
    pub fn reveal_topic<S: KeyValueStore>(
        &mut self,
        bank: &QuestionBank<S>,
        chosen: Option<Category>,
    ) -> Result<TopicReveal, Error> {
        let (Phase::AwaitingTopic, Some(difficulty)) = (self.phase, self.round.difficulty) else {
            return self.out_of_phase("reveal the topic");
        };
        let needed = self.options.rounds.get(difficulty).questions;
        let shortfall = self.options.shortfall;

        let category = match chosen {
            Some(category) => category,
            None => {
                let counts = bank.category_counts(self.options.source, difficulty);
                pick_category(&counts, shortfall.minimum_pool(needed)).ok_or_else(|| {
                    Error::InsufficientQuestions {
                        difficulty,
                        category: None,
                        needed,
                        available: counts.values().copied().max().unwrap_or_default(),
                    }
                })?
            }
        };

        let pool = bank.list(
            self.options.source,
            Filter::any().difficulty(difficulty).category(category),
        );
        let questions = draw_questions(&pool, needed, shortfall).ok_or(
            Error::InsufficientQuestions {
                difficulty,
                category: Some(category),
                needed,
                available: pool.len(),
            },
        )?;

        self.round.category = Some(category);
        self.round.questions = questions;
        self.round.verdicts.clear();
        self.change_phase(
            Phase::AwaitingTopic,
            Phase::Questioning {
                index: 0,
                count: needed,
            },
        );

        Ok(TopicReveal {
            category,
            questions: needed,
        })
    }

    /// Shows the current question and starts its countdown
    ///
    /// Calling it again while the countdown runs only reports the remaining
    /// time.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::Questioning`].
    pub fn start_question<A: Alarms + ?Sized>(
        &mut self,
        alarms: &mut A,
    ) -> Result<QuestionPrompt, Error> {
        let Phase::Questioning { index, count } = self.phase else {
            return self.out_of_phase("start a question");
        };
        let (Some(question), Some(difficulty)) = (self.round.current(), self.round.difficulty)
        else {
            return self.out_of_phase("start a question");
        };

        let limit = self.options.rounds.get(difficulty).time_limit;
        let countdown = *self
            .countdown
            .get_or_insert_with(|| Countdown::start(limit, alarms));

        Ok(QuestionPrompt {
            index,
            count,
            text: question.text.clone(),
            category: question.category,
            difficulty: question.difficulty,
            remaining: countdown.remaining(),
        })
    }

    /// Judges an answer to the current question
    ///
    /// The countdown is cancelled first. An answer arriving after the time
    /// budget is a miss. With AI judging enabled the referee is consulted and
    /// falls back to local matching on failure; otherwise local matching
    /// decides.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::Questioning`] or when the question was not
    /// started with [`Game::start_question`].
    pub async fn submit_answer<A: Alarms + ?Sized>(
        &mut self,
        answer: &str,
        referee: &Referee,
        alarms: &mut A,
    ) -> Result<AnswerOutcome, Error> {
        if !matches!(self.phase, Phase::Questioning { .. }) {
            return self.out_of_phase("submit an answer");
        }
        let Some(question) = self.round.current().cloned() else {
            return self.out_of_phase("submit an answer");
        };

        let Some(countdown) = self.countdown.take() else {
            return self.out_of_phase("answer before the question is shown");
        };
        countdown.cancel(alarms);
        let expired = countdown.expired();

        let ruling = if expired {
            debug!("answer arrived after the time budget");
            Ruling::expired(&question)
        } else if self.options.ai_judging {
            referee.rule(&question, answer).await
        } else {
            Ruling::local(&question, answer)
        };

        Ok(self.record(ruling))
    }

    /// Handles a timer alarm
    ///
    /// An expired countdown counts as a wrong answer. Alarms of cancelled or
    /// replaced countdowns are ignored and yield `None`.
    pub fn receive_alarm(&mut self, message: AlarmMessage) -> Option<AnswerOutcome> {
        match message {
            AlarmMessage::CountdownExpired { timer } => {
                let active = self.countdown.is_some_and(|countdown| countdown.id == timer);
                if !active || !matches!(self.phase, Phase::Questioning { .. }) {
                    trace!(%timer, "ignoring stale alarm");
                    return None;
                }
                self.countdown = None;
                let question = self.round.current()?.clone();
                debug!("question time ran out");
                Some(self.record(Ruling::expired(&question)))
            }
        }
    }

    fn record(&mut self, ruling: Ruling) -> AnswerOutcome {
        let index = self.round.index();
        let count = self.round.questions.len();
        let correct_answer = self
            .round
            .current()
            .map(|question| question.correct_answer.clone())
            .unwrap_or_default();

        self.round.verdicts.push(ruling.is_correct());
        let round_finished = self.round.is_complete();
        let before = Phase::Questioning { index, count };
        if round_finished {
            self.change_phase(before, Phase::AwaitingResult);
        } else {
            self.change_phase(
                before,
                Phase::Questioning {
                    index: index + 1,
                    count,
                },
            );
        }

        AnswerOutcome {
            index,
            count,
            ruling,
            correct_answer,
            round_finished,
        }
    }

    /// Awards the point of the finished round
    ///
    /// All answers correct gives the team the point; any miss gives it to
    /// the opponent.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::AwaitingResult`].
    pub fn finish_round(&mut self) -> Result<RoundOutcome, Error> {
        let (Phase::AwaitingResult, Some(difficulty), Some(category)) =
            (self.phase, self.round.difficulty, self.round.category)
        else {
            return self.out_of_phase("finish the round");
        };

        let winner = if self.round.all_correct() {
            Party::Team
        } else {
            Party::Opponent
        };
        self.scoreboard.award(RoundRecord {
            round: self.round.number,
            difficulty,
            category,
            winner,
        });

        let game_over = self.winner().is_some();
        let after = if game_over {
            Phase::GameOver
        } else {
            Phase::RoundComplete
        };
        self.change_phase(Phase::AwaitingResult, after);

        let scores = self.scoreboard.scores();
        info!(
            round = self.round.number,
            %winner,
            team = scores.team_score,
            opponent = scores.opponent_score,
            game_over,
            "round finished"
        );

        Ok(RoundOutcome {
            round: self.round.number,
            winner,
            scores,
            game_over,
        })
    }

    /// Starts the next round
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::RoundComplete`].
    pub fn next_round(&mut self) -> Result<u32, Error> {
        if self.phase != Phase::RoundComplete {
            return self.out_of_phase("start the next round");
        }
        self.round = RoundState::new(self.round.number + 1);
        self.change_phase(Phase::RoundComplete, Phase::AwaitingDifficulty);
        Ok(self.round.number)
    }

    /// Leaves the current round without scoring it
    ///
    /// Cancels any running countdown and returns the same round to
    /// [`Phase::AwaitingDifficulty`].
    ///
    /// # Errors
    ///
    /// Fails once the game is over.
    pub fn abandon<A: Alarms + ?Sized>(&mut self, alarms: &mut A) -> Result<(), Error> {
        if self.phase == Phase::GameOver {
            return self.out_of_phase("abandon the round");
        }
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel(alarms);
        }
        self.round = RoundState::new(self.round.number);
        self.change_phase(self.phase, Phase::AwaitingDifficulty);
        Ok(())
    }

    /// Resets scores and starts over from round 1
    pub fn restart<A: Alarms + ?Sized>(&mut self, alarms: &mut A) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel(alarms);
        }
        self.scoreboard.reset();
        self.round = RoundState::new(1);
        self.change_phase(self.phase, Phase::AwaitingDifficulty);
    }
}
