use anyhow::{Result, bail};
use clap::Args;
use tracing::warn;
use viktorina::{
    Category, Difficulty, MatchType, Question,
    judge::{AnswerCheck, Backend, InferenceJudge, Referee, Ruling},
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Question text
    #[arg(long)]
    question: String,
    /// Correct answer
    #[arg(long)]
    answer: String,
    /// Acceptable keyword, repeatable
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,
    /// Local matching rule used for the fallback (exact, fuzzy)
    #[arg(long, default_value = "exact")]
    match_type: MatchType,
    /// Skip the remote judge
    #[arg(long, conflicts_with = "function_reply")]
    local: bool,
    /// Ask the inference backend directly and print the reply in the judge
    /// function's wire format
    #[arg(long)]
    function_reply: bool,
    /// The answer to judge
    user_answer: String,
}

pub async fn run(settings: &Settings, args: CheckArgs) -> Result<()> {
    let question = Question::new(
        args.question,
        args.answer,
        Category::OldTestament,
        Difficulty::Easy,
    )
    .with_keywords(args.keywords)
    .with_match_type(args.match_type);

    if args.function_reply {
        let Backend::Inference { endpoint, model } = &settings.judge.backend else {
            bail!("--function-reply needs the inference backend");
        };
        let judge = InferenceJudge::new(
            endpoint,
            model,
            settings.judge.api_key.clone(),
            settings.judge.timeout,
        )?;
        let reply = judge
            .respond(&AnswerCheck::new(&question, &args.user_answer))
            .await;
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    let ruling: Ruling = if args.local {
        Ruling::local(&question, &args.user_answer)
    } else {
        let referee = Referee::from_settings(&settings.judge).unwrap_or_else(|e| {
            warn!("remote judge unavailable, judging locally: {e}");
            Referee::local()
        });
        referee.rule(&question, &args.user_answer).await
    };

    println!("{}", serde_json::to_string_pretty(&ruling)?);
    Ok(())
}
