//! Terminal front end for the quiz
//!
//! Plays the game in the terminal, manages the custom question bank and
//! checks single answers against the configured judge.

mod check;
mod play;
mod questions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use viktorina::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "viktorina", version, about = "Библейская викторина: команда против противника")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to ./viktorina.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play the game in the terminal
    Play(play::PlayArgs),
    /// Manage the question bank
    #[command(subcommand)]
    Questions(questions::QuestionsCommand),
    /// Judge a single answer with the configured judge
    Check(check::CheckArgs),
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("could not load settings")?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Command::Play(args) => play::run(settings, args).await,
        Command::Questions(command) => questions::run(&settings, command),
        Command::Check(args) => check::run(&settings, args).await,
    }
}
