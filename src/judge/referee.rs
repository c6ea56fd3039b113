//! Remote judging with local fallback

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, warn};

use super::{AnswerCheck, AnswerJudge, Error, JudgeSettings, Verdict, local};
use crate::{constants::judge::DEFAULT_TIMEOUT, question::Question};

/// Who produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgedBy {
    /// Local matching rule
    Local,
    /// The remote judge
    Remote,
    /// The countdown ran out before an answer arrived
    Expired,
}

/// A verdict with its provenance
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruling {
    /// The decision
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Who decided
    pub judged_by: JudgedBy,
    /// Set when the remote judge failed and local matching decided instead
    pub warning: Option<String>,
}

impl Ruling {
    /// Ruling by local matching
    pub fn local(question: &Question, answer: &str) -> Self {
        Self {
            verdict: local::judge(question, answer),
            judged_by: JudgedBy::Local,
            warning: None,
        }
    }

    /// Ruling for a question whose time ran out
    pub fn expired(question: &Question) -> Self {
        Self {
            verdict: local::expired(question),
            judged_by: JudgedBy::Expired,
            warning: None,
        }
    }

    /// Whether the answer counts as correct
    pub fn is_correct(&self) -> bool {
        self.verdict.is_correct
    }
}

/// Decides answers, preferring the remote judge when one is configured
pub struct Referee {
    remote: Option<Box<dyn AnswerJudge>>,
    timeout: Duration,
}

impl std::fmt::Debug for Referee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Referee")
            .field("remote", &self.remote.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Referee {
    fn default() -> Self {
        Self::local()
    }
}

impl Referee {
    /// Judges with local matching only
    pub fn local() -> Self {
        Self {
            remote: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
        }
    }

    /// Judges with `remote`, bounded by `timeout`
    pub fn with_remote(remote: Box<dyn AnswerJudge>, timeout: Duration) -> Self {
        Self {
            remote: Some(remote),
            timeout,
        }
    }

    /// Builds a remote referee from settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the judge cannot be built.
    pub fn from_settings(settings: &JudgeSettings) -> Result<Self, Error> {
        Ok(Self::with_remote(settings.build()?, settings.timeout))
    }

    /// Whether a remote judge is consulted
    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    async fn ask(&self, remote: &dyn AnswerJudge, check: &AnswerCheck) -> Result<Verdict, Error> {
        tokio::time::timeout(self.timeout, remote.check_answer(check))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    /// Judges `answer` to `question`; always produces a ruling
    pub async fn rule(&self, question: &Question, answer: &str) -> Ruling {
        let remote = match &self.remote {
            Some(remote) if !local::normalize(answer).is_empty() => remote,
            _ => return Ruling::local(question, answer),
        };

        match self.ask(remote.as_ref(), &AnswerCheck::new(question, answer)).await {
            Ok(verdict) => {
                debug!(correct = verdict.is_correct, "remote verdict");
                Ruling {
                    verdict,
                    judged_by: JudgedBy::Remote,
                    warning: None,
                }
            }
            Err(e) => {
                warn!("remote judge failed, using local matching: {e}");
                Ruling {
                    warning: Some(format!("ИИ-проверка недоступна: {e}")),
                    ..Ruling::local(question, answer)
                }
            }
        }
    }
}
