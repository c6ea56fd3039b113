//! Answer judging
//!
//! An answer is judged either locally ([`local`]) or by a remote AI judge
//! implementing [`AnswerJudge`]. Two remote transports exist: a
//! [`FunctionJudge`] calling a deployed judge function, and an
//! [`InferenceJudge`] that runs the function's logic itself against a
//! chat-completions endpoint. The [`Referee`] combines a remote judge with
//! the local fallback.

pub mod function;
pub mod inference;
pub mod local;
pub mod referee;
pub mod reply;

use std::time::Duration;

use async_trait::async_trait;
use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use function::FunctionJudge;
pub use inference::InferenceJudge;
pub use referee::{JudgedBy, Referee, Ruling};

use crate::{
    constants::judge::*,
    question::Question,
    round::validate_duration,
};

/// Request body sent to a judge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCheck {
    /// Question text
    pub question: String,
    /// Canonical answer
    pub correct_answer: String,
    /// What the player answered
    pub user_answer: String,
    /// Keywords that make an answer acceptable
    #[serde(default)]
    pub acceptable_keywords: Vec<String>,
}

impl AnswerCheck {
    /// Builds the request for `user_answer` to `question`
    pub fn new(question: &Question, user_answer: &str) -> Self {
        Self {
            question: question.text.clone(),
            correct_answer: question.correct_answer.clone(),
            user_answer: user_answer.to_owned(),
            acceptable_keywords: question.acceptable_keywords.clone(),
        }
    }
}

/// A judge's decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether the answer counts as correct
    pub is_correct: bool,
    /// Short explanation shown to the players
    pub feedback: String,
}

impl Verdict {
    /// A correct verdict
    pub fn correct(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: true,
            feedback: feedback.into(),
        }
    }

    /// An incorrect verdict
    pub fn incorrect(feedback: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            feedback: feedback.into(),
        }
    }
}

/// Errors raised by a remote judge
#[derive(Error, Debug)]
pub enum Error {
    /// The judge cannot be built from the supplied settings
    #[error("judge is not configured: {0}")]
    Configuration(String),
    /// The request could not be sent or its reply not received
    #[error("judge request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The judge replied with a non-success status
    #[error("judge replied with status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
    /// No verdict arrived within the time budget
    #[error("judge did not answer within {0:?}")]
    Timeout(Duration),
    /// The judge reported its own failure
    #[error("judge reported an error: {0}")]
    Remote(String),
    /// The reply could not be decoded
    #[error("judge reply is malformed: {0}")]
    Parse(#[source] serde_json::Error),
}

/// A remote service deciding whether an answer is correct
#[async_trait]
pub trait AnswerJudge: Send + Sync {
    /// Judges one answer
    ///
    /// # Errors
    ///
    /// Returns an error when no verdict could be obtained.
    async fn check_answer(&self, check: &AnswerCheck) -> Result<Verdict, Error>;
}

/// Where remote verdicts come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    /// A deployed judge function
    Function {
        /// Function URL
        url: String,
    },
    /// An OpenAI-compatible chat-completions API
    Inference {
        /// API base, without the `/chat/completions` suffix
        endpoint: String,
        /// Model identifier
        model: String,
    },
}

impl Default for Backend {
    fn default() -> Self {
        Self::Inference {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }
}

/// Remote judge settings
#[serde_with::serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct JudgeSettings {
    /// Transport and target
    #[garde(skip)]
    pub backend: Backend,
    /// Bearer credential
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upper bound on one remote check
    #[garde(custom(validate_duration::<MIN_TIMEOUT, MAX_TIMEOUT>))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }
}

impl std::fmt::Debug for JudgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeSettings")
            .field("backend", &self.backend)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl JudgeSettings {
    /// Builds the remote judge these settings describe
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a required value is missing.
    pub fn build(&self) -> Result<Box<dyn AnswerJudge>, Error> {
        let judge: Box<dyn AnswerJudge> = match &self.backend {
            Backend::Function { url } => Box::new(FunctionJudge::new(
                url,
                self.api_key.clone(),
                self.timeout,
            )?),
            Backend::Inference { endpoint, model } => Box::new(InferenceJudge::new(
                endpoint,
                model,
                self.api_key.clone(),
                self.timeout,
            )?),
        };
        Ok(judge)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::question::{Category, Difficulty};

    #[test]
    fn test_answer_check_body() {
        let question = Question::new(
            "Кто построил ковчег?",
            "Ной",
            Category::OldTestament,
            Difficulty::Easy,
        )
        .with_keywords(["ной"]);

        let body = serde_json::to_value(AnswerCheck::new(&question, "Ной")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "question": "Кто построил ковчег?",
                "correctAnswer": "Ной",
                "userAnswer": "Ной",
                "acceptableKeywords": ["ной"],
            })
        );
    }

    #[test]
    fn test_verdict_json() {
        let verdict: Verdict =
            serde_json::from_str(r#"{"isCorrect": true, "feedback": "Верно"}"#).unwrap();
        assert_eq!(verdict, Verdict::correct("Верно"));
    }

    #[test]
    fn test_settings_default_and_validation() {
        let settings = JudgeSettings::default();
        assert!(settings.validate().is_ok());
        assert!(matches!(settings.backend, Backend::Inference { .. }));

        let slow = JudgeSettings {
            timeout: Duration::from_secs(MAX_TIMEOUT + 1),
            ..JudgeSettings::default()
        };
        assert!(slow.validate().is_err());
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let settings = JudgeSettings {
            api_key: Some("secret-token".to_owned()),
            ..JudgeSettings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_backend_tagged_json() {
        let backend: Backend = serde_json::from_str(
            r#"{"kind": "function", "url": "https://example.org/check-answer"}"#,
        )
        .unwrap();
        assert_eq!(
            backend,
            Backend::Function {
                url: "https://example.org/check-answer".to_owned()
            }
        );
    }

    #[test]
    fn test_build_requires_key_for_inference() {
        let settings = JudgeSettings::default();
        assert!(matches!(settings.build(), Err(Error::Configuration(_))));

        let settings = JudgeSettings {
            api_key: Some("key".to_owned()),
            ..JudgeSettings::default()
        };
        assert!(settings.build().is_ok());
    }
}
