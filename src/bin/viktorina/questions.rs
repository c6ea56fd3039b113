use std::{fs, io::Write, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use viktorina::{
    Category, Difficulty, MatchType, Question, QuestionBank,
    bank::{Filter, Source},
    settings::Settings,
    storage::FileStore,
};

#[derive(Debug, Subcommand)]
pub enum QuestionsCommand {
    /// List questions
    List {
        /// Which questions to list (all, base, custom)
        #[arg(short, long, default_value = "all")]
        source: Source,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Count questions per category
    Stats {
        /// Which questions to count (all, base, custom)
        #[arg(short, long, default_value = "all")]
        source: Source,
    },
    /// Add a custom question
    Add(QuestionArgs),
    /// Replace the custom question at INDEX
    Update {
        /// Position in the custom list
        index: usize,
        #[command(flatten)]
        question: QuestionArgs,
    },
    /// Delete the custom question at INDEX
    Delete {
        /// Position in the custom list
        index: usize,
    },
    /// Delete every custom question
    Clear,
    /// Write the custom questions as JSON
    Export {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Append questions from a JSON file
    Import {
        /// File holding a JSON array of questions
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Only this difficulty
    #[arg(short, long)]
    difficulty: Option<Difficulty>,
    /// Only this category
    #[arg(long)]
    category: Option<Category>,
}

impl From<FilterArgs> for Filter {
    fn from(args: FilterArgs) -> Self {
        Filter {
            difficulty: args.difficulty,
            category: args.category,
        }
    }
}

#[derive(Debug, Args)]
pub struct QuestionArgs {
    /// Question text
    #[arg(long)]
    text: String,
    /// Correct answer
    #[arg(long)]
    answer: String,
    /// Category key, e.g. old_testament
    #[arg(long)]
    category: Category,
    /// Difficulty, 1-3
    #[arg(long)]
    difficulty: Difficulty,
    /// Acceptable keyword, repeatable
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,
    /// Local matching rule (exact, fuzzy)
    #[arg(long, default_value = "exact")]
    match_type: MatchType,
}

impl From<QuestionArgs> for Question {
    fn from(args: QuestionArgs) -> Self {
        Question::new(args.text, args.answer, args.category, args.difficulty)
            .with_keywords(args.keywords)
            .with_match_type(args.match_type)
    }
}

fn print_question(label: &str, question: &Question) {
    println!(
        "{label:>6}  [{} · {}] {} → {}",
        question.difficulty, question.category, question.text, question.correct_answer
    );
}

pub fn run(settings: &Settings, command: QuestionsCommand) -> Result<()> {
    let mut bank = QuestionBank::open(FileStore::new(&settings.storage.dir));

    match command {
        QuestionsCommand::List { source, filter } => {
            let filter = Filter::from(filter);
            if source != Source::Custom {
                for question in bank.built_in().iter().filter(|q| filter.matches(q)) {
                    print_question("base", question);
                }
            }
            if source != Source::Base {
                for (index, question) in bank.custom().iter().enumerate() {
                    if filter.matches(question) {
                        print_question(&format!("#{index}"), question);
                    }
                }
            }
        }
        QuestionsCommand::Stats { source } => {
            for difficulty in Difficulty::ALL {
                println!("Сложность {difficulty}:");
                for (category, count) in bank.category_counts(source, difficulty) {
                    println!("  {:<22} {count}", category.to_string());
                }
            }
        }
        QuestionsCommand::Add(args) => {
            let index = bank.add(args.into())?;
            println!("Добавлен вопрос #{index}");
        }
        QuestionsCommand::Update { index, question } => {
            if !bank.update(index, question.into())? {
                bail!(
                    "no custom question #{index} (there are {})",
                    bank.custom().len()
                );
            }
            println!("Вопрос #{index} обновлён");
        }
        QuestionsCommand::Delete { index } => match bank.delete(index)? {
            Some(question) => println!("Удалён вопрос #{index}: {}", question.text),
            None => bail!(
                "no custom question #{index} (there are {})",
                bank.custom().len()
            ),
        },
        QuestionsCommand::Clear => {
            let removed = bank.clear_custom()?;
            println!("Удалено вопросов: {removed}");
        }
        QuestionsCommand::Export { output } => {
            let json = bank.export()?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("could not write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(json.as_bytes())?;
                    writeln!(stdout)?;
                }
            }
        }
        QuestionsCommand::Import { file } => {
            let raw =
                fs::read(&file).with_context(|| format!("could not read {}", file.display()))?;
            let summary = bank.import(&raw)?;
            println!("Импортировано вопросов: {}", summary.added);
            for rejected in &summary.rejected {
                eprintln!("  запись {} пропущена: {}", rejected.index, rejected.reason);
            }
        }
    }

    Ok(())
}
