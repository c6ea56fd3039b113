//! Question model
//!
//! Defines the question record shared by the built-in bank, the custom
//! question store and the round engine, together with its closed sets of
//! difficulties, categories and match rules. Questions are validated with
//! `garde` before they are stored.

use std::{fmt::Display, str::FromStr};

use enum_map::Enum;
use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::question::*;

/// How hard a question is, serialized as the integer 1, 2 or 3
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    /// Level 1
    Easy = 1,
    /// Level 2
    Medium = 2,
    /// Level 3
    Hard = 3,
}

/// Errors raised while reading closed-set values from text or numbers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The number is not one of the difficulty levels
    #[error("difficulty must be 1, 2 or 3, got {0}")]
    Difficulty(u8),
    /// The text names no known difficulty
    #[error("unknown difficulty `{0}`")]
    DifficultyName(String),
    /// The text names no known category
    #[error("unknown category `{0}`")]
    Category(String),
    /// The text names no known match rule
    #[error("unknown match type `{0}`")]
    MatchType(String),
}

impl Difficulty {
    /// Every difficulty, in ascending order
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Draws a difficulty uniformly at random
    pub fn random() -> Self {
        Self::ALL[fastrand::usize(..Self::ALL.len())]
    }

    /// The numeric level (1 to 3)
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Easy),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Hard),
            other => Err(Error::Difficulty(other)),
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.level()
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "easy" => Ok(Self::Easy),
            "2" | "medium" => Ok(Self::Medium),
            "3" | "hard" => Ok(Self::Hard),
            _ => Err(Error::DifficultyName(s.to_owned())),
        }
    }
}

/// Topic a question belongs to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Enum,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Books of the Old Testament
    #[display("Ветхий Завет")]
    OldTestament,
    /// Gospels, Acts and the Epistles
    #[display("Новый Завет")]
    NewTestament,
    /// People of the Bible
    #[display("Библейские персонажи")]
    Characters,
    /// Miracles and signs
    #[display("Чудеса")]
    Miracles,
    /// Parables and teachings
    #[display("Притчи")]
    Parables,
    /// Places, seas and journeys
    #[display("География")]
    Geography,
}

impl Category {
    /// Every category in declaration order
    pub const ALL: [Category; 6] = [
        Self::OldTestament,
        Self::NewTestament,
        Self::Characters,
        Self::Miracles,
        Self::Parables,
        Self::Geography,
    ];

    /// The identifier used in JSON and on the command line
    pub fn key(self) -> &'static str {
        match self {
            Self::OldTestament => "old_testament",
            Self::NewTestament => "new_testament",
            Self::Characters => "characters",
            Self::Miracles => "miracles",
            Self::Parables => "parables",
            Self::Geography => "geography",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.key() == wanted)
            .ok_or_else(|| Error::Category(s.to_owned()))
    }
}

/// Rule used to judge an answer locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Case-insensitive equality or keyword substring match
    #[default]
    Exact,
    /// Keyword or word-stem overlap
    Fuzzy,
}

impl FromStr for MatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            _ => Err(Error::MatchType(s.to_owned())),
        }
    }
}

/// Rejects strings made only of whitespace
#[allow(clippy::ptr_arg)]
fn not_blank(value: &String, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("must not be blank"))
    } else {
        Ok(())
    }
}

/// A single quiz question
///
/// Its identity is its position in the bank. The JSON shape uses camelCase
/// names (`correctAnswer`, `acceptableKeywords`, `matchType`), which is the
/// format of both the persisted store and the import/export files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// What is being asked
    #[garde(length(chars, min = 1, max = MAX_TEXT_LENGTH), custom(not_blank))]
    pub text: String,
    /// The canonical answer, shown after the question resolves
    #[garde(length(chars, min = 1, max = MAX_ANSWER_LENGTH), custom(not_blank))]
    pub correct_answer: String,
    /// Words whose presence in an answer makes it acceptable
    #[garde(
        length(max = MAX_KEYWORD_COUNT),
        inner(length(chars, min = 1, max = MAX_KEYWORD_LENGTH))
    )]
    #[serde(default)]
    pub acceptable_keywords: Vec<String>,
    /// Topic of the question
    #[garde(skip)]
    pub category: Category,
    /// Difficulty level
    #[garde(skip)]
    pub difficulty: Difficulty,
    /// Local matching rule
    #[garde(skip)]
    pub match_type: MatchType,
}

impl Question {
    /// Creates an exact-match question without keywords
    pub fn new(
        text: impl Into<String>,
        correct_answer: impl Into<String>,
        category: Category,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            text: text.into(),
            correct_answer: correct_answer.into(),
            acceptable_keywords: Vec::new(),
            category,
            difficulty,
            match_type: MatchType::Exact,
        }
    }

    /// Replaces the acceptable keywords
    #[must_use]
    pub fn with_keywords<I, K>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.acceptable_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the local matching rule
    #[must_use]
    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn ark() -> Question {
        Question::new(
            "Кто построил ковчег?",
            "Ной",
            Category::OldTestament,
            Difficulty::Easy,
        )
        .with_keywords(["ной"])
    }

    #[test]
    fn test_question_json_shape() {
        let json = serde_json::to_value(ark()).unwrap();

        assert_eq!(json["correctAnswer"], "Ной");
        assert_eq!(json["acceptableKeywords"][0], "ной");
        assert_eq!(json["difficulty"], 1);
        assert_eq!(json["category"], "old_testament");
        assert_eq!(json["matchType"], "exact");
    }

    #[test]
    fn test_question_from_json() {
        let question: Question = serde_json::from_str(
            r#"{
                "text": "Кто построил ковчег?",
                "correctAnswer": "Ной",
                "acceptableKeywords": ["ной"],
                "category": "old_testament",
                "difficulty": 1,
                "matchType": "exact"
            }"#,
        )
        .unwrap();

        assert_eq!(question, ark());
    }

    #[test]
    fn test_question_keywords_default_to_empty() {
        let question: Question = serde_json::from_str(
            r#"{"text": "q", "correctAnswer": "a", "category": "miracles",
                "difficulty": 2, "matchType": "fuzzy"}"#,
        )
        .unwrap();

        assert!(question.acceptable_keywords.is_empty());
        assert_eq!(question.match_type, MatchType::Fuzzy);
    }

    #[test]
    fn test_difficulty_out_of_range_rejected() {
        let result = serde_json::from_str::<Question>(
            r#"{"text": "q", "correctAnswer": "a", "category": "miracles",
                "difficulty": 4, "matchType": "exact"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_match_type_rejected() {
        let result = serde_json::from_str::<Question>(
            r#"{"text": "q", "correctAnswer": "a", "category": "miracles",
                "difficulty": 1, "matchType": "approximate"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_answer_rejected() {
        let result = serde_json::from_str::<Question>(
            r#"{"text": "q", "category": "miracles", "difficulty": 1, "matchType": "exact"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_accepts_ark() {
        assert!(ark().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_blank_text() {
        let mut question = ark();
        question.text = "   ".to_string();
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_too_many_keywords() {
        let question = ark().with_keywords(vec!["слово"; MAX_KEYWORD_COUNT + 1]);
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_keyword() {
        let question = ark().with_keywords([""]);
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_difficulty_conversions() {
        assert_eq!(Difficulty::try_from(2), Ok(Difficulty::Medium));
        assert_eq!(Difficulty::try_from(0), Err(Error::Difficulty(0)));
        assert_eq!(u8::from(Difficulty::Hard), 3);
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("1".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("4".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_random_in_range() {
        for _ in 0..100 {
            assert!(Difficulty::ALL.contains(&Difficulty::random()));
        }
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!(
            "new-testament".parse::<Category>(),
            Ok(Category::NewTestament)
        );
        assert_eq!(Category::Miracles.to_string(), "Чудеса");
        assert!("psalms".parse::<Category>().is_err());
        for category in Category::ALL {
            assert_eq!(category.key().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_match_type_parse() {
        assert_eq!("Fuzzy".parse::<MatchType>(), Ok(MatchType::Fuzzy));
        assert!("loose".parse::<MatchType>().is_err());
    }
}
