//! Local answer matching
//!
//! Never fails and needs no network. Used when remote judging is disabled
//! and as the fallback when the remote judge cannot deliver a verdict.

use std::collections::HashSet;

use itertools::Itertools;

use super::Verdict;
use crate::{
    constants::matching::*,
    question::{MatchType, Question},
};

/// Normalizes an answer string for comparison
///
/// # Arguments
/// * `answer` - The answer string to clean
///
/// # Returns
/// * Lowercased text with `ё` folded to `е`, punctuation dropped and
///   whitespace collapsed to single spaces
pub fn normalize(answer: &str) -> String {
    answer
        .to_lowercase()
        .replace('ё', "е")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

fn stem(word: &str) -> String {
    word.chars().take(STEM_LENGTH).collect()
}

/// Stems of the words long enough to carry meaning
fn stems(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|word| word.chars().count() >= MIN_WORD_LENGTH)
        .map(stem)
        .collect()
}

fn keywords(question: &Question) -> impl Iterator<Item = String> + '_ {
    question
        .acceptable_keywords
        .iter()
        .map(|keyword| normalize(keyword))
        .filter(|keyword| !keyword.is_empty())
}

fn matches_exact(question: &Question, answer: &str) -> bool {
    answer == normalize(&question.correct_answer)
        || keywords(question).any(|keyword| answer.contains(&keyword))
}

fn matches_fuzzy(question: &Question, answer: &str) -> bool {
    if matches_exact(question, answer) {
        return true;
    }

    let given = stems(answer);
    if given.is_empty() {
        return false;
    }

    if keywords(question).any(|keyword| stems(&keyword).iter().any(|s| given.contains(s))) {
        return true;
    }

    let expected = stems(&normalize(&question.correct_answer));
    if expected.is_empty() {
        return false;
    }
    let shared = expected.intersection(&given).count();

    #[allow(clippy::cast_precision_loss)]
    let overlap = shared as f64 / expected.len() as f64;
    overlap >= FUZZY_OVERLAP
}

/// Whether `answer` is acceptable for `question` under its match rule
pub fn is_correct(question: &Question, answer: &str) -> bool {
    let answer = normalize(answer);
    if answer.is_empty() {
        return false;
    }
    match question.match_type {
        MatchType::Exact => matches_exact(question, &answer),
        MatchType::Fuzzy => matches_fuzzy(question, &answer),
    }
}

/// Judges `answer` locally
pub fn judge(question: &Question, answer: &str) -> Verdict {
    if is_correct(question, answer) {
        Verdict::correct("Верно!")
    } else {
        Verdict::incorrect(format!(
            "Неверно. Правильный ответ: {}",
            question.correct_answer
        ))
    }
}

/// Verdict for a question whose time ran out
pub fn expired(question: &Question) -> Verdict {
    Verdict::incorrect(format!(
        "Время вышло. Правильный ответ: {}",
        question.correct_answer
    ))
}
