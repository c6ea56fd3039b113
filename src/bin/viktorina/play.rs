use std::collections::HashSet;

use anyhow::{Result, bail};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use viktorina::{
    Difficulty, Game, QuestionBank,
    game::{AnswerOutcome, Error as GameError},
    judge::{JudgedBy, Referee},
    round::Phase,
    scoreboard::Party,
    settings::Settings,
    storage::FileStore,
    timer::TokioAlarms,
};

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Play every round at this difficulty (1-3 or easy/medium/hard)
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// Judge answers with the remote AI judge
    #[arg(long)]
    ai: bool,
}

fn referee(settings: &Settings, ai_judging: bool) -> Referee {
    if !ai_judging {
        return Referee::local();
    }
    match Referee::from_settings(&settings.judge) {
        Ok(referee) => referee,
        Err(e) => {
            warn!("remote judge unavailable, judging locally: {e}");
            eprintln!("ИИ-проверка недоступна ({e}), ответы проверяются локально.");
            Referee::local()
        }
    }
}

fn print_outcome(outcome: &AnswerOutcome) {
    let verdict = &outcome.ruling.verdict;
    let mark = if verdict.is_correct { "✔" } else { "✘" };
    println!("{mark} {}", verdict.feedback);
    if outcome.ruling.judged_by == JudgedBy::Remote && !verdict.is_correct {
        println!("  Правильный ответ: {}", outcome.correct_answer);
    }
    if let Some(warning) = &outcome.ruling.warning {
        println!("  ({warning})");
    }
}

pub async fn run(settings: Settings, args: PlayArgs) -> Result<()> {
    let bank = QuestionBank::open(FileStore::new(&settings.storage.dir));
    let mut options = settings.game;
    options.ai_judging |= args.ai;
    let referee = referee(&settings, options.ai_judging);

    let (mut alarms, mut expired) = TokioAlarms::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut game = Game::new(options)?;
    let mut unplayable = HashSet::new();

    println!(
        "Игра до {} очков. Ответ вводится строкой, пустая строка пропускает вопрос.",
        options.win_threshold
    );

    loop {
        match game.phase() {
            Phase::AwaitingDifficulty => {
                let reveal = game.reveal_difficulty(args.difficulty)?;
                println!();
                println!(
                    "Раунд {}. Сложность {}: вопросов {}, по {} с на каждый.",
                    reveal.round,
                    reveal.difficulty,
                    reveal.questions,
                    reveal.time_limit.as_secs()
                );
            }
            Phase::AwaitingTopic => match game.reveal_topic(&bank, None) {
                Ok(topic) => {
                    unplayable.clear();
                    println!("Тема: {}", topic.category);
                }
                Err(e @ GameError::InsufficientQuestions { difficulty, .. }) => {
                    warn!("{e}");
                    unplayable.insert(difficulty);
                    if args.difficulty.is_some() || unplayable.len() == Difficulty::ALL.len() {
                        bail!("{e}");
                    }
                    game.abandon(&mut alarms)?;
                }
                Err(e) => return Err(e.into()),
            },
            Phase::Questioning { .. } => {
                let prompt = game.start_question(&mut alarms)?;
                println!();
                println!(
                    "Вопрос {} из {} ({} с): {}",
                    prompt.index + 1,
                    prompt.count,
                    prompt.remaining.as_secs(),
                    prompt.text
                );

                let outcome = tokio::select! {
                    line = lines.next_line() => match line? {
                        Some(answer) => Some(game.submit_answer(&answer, &referee, &mut alarms).await?),
                        None => {
                            game.abandon(&mut alarms)?;
                            println!("Игра прервана.");
                            return Ok(());
                        }
                    },
                    Some(alarm) = expired.recv() => game.receive_alarm(alarm),
                };
                if let Some(outcome) = outcome {
                    print_outcome(&outcome);
                }
            }
            Phase::AwaitingResult => {
                let result = game.finish_round()?;
                let verb = match result.winner {
                    Party::Team => "Очко получает команда!",
                    Party::Opponent => "Очко получает противник.",
                };
                let standing = match game.scoreboard().leader() {
                    Some(Party::Team) => "ведёт команда",
                    Some(Party::Opponent) => "ведёт противник",
                    None => "ничья",
                };
                println!(
                    "{verb} Счёт {}:{}, {standing}.",
                    result.scores.team_score, result.scores.opponent_score
                );
            }
            Phase::RoundComplete => {
                game.next_round()?;
            }
            Phase::GameOver => {
                match game.winner() {
                    Some(Party::Team) => println!("Победа команды!"),
                    Some(Party::Opponent) => println!("Победил противник."),
                    None => {}
                }
                return Ok(());
            }
        }
    }
}
