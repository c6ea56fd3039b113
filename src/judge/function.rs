//! Client for a deployed judge function

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::debug;

use super::{AnswerCheck, AnswerJudge, Error, Verdict};
use crate::constants::judge::MAX_ERROR_BODY;

/// Body returned by the judge function
///
/// A failure carries `error` next to `isCorrect: false` and a feedback
/// message.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    /// Whether the answer counts as correct
    pub is_correct: bool,
    /// Explanation for the players
    #[serde(default)]
    pub feedback: String,
    /// What went wrong on the remote side
    pub error: Option<String>,
}

impl From<Verdict> for FunctionResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            is_correct: verdict.is_correct,
            feedback: verdict.feedback,
            error: None,
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Turns a status and body from the judge function into a verdict
pub(crate) fn decode_reply(status: StatusCode, body: &str) -> Result<Verdict, Error> {
    let value = serde_json::from_str::<serde_json::Value>(body);

    if let Some(message) = value
        .as_ref()
        .ok()
        .and_then(|value| value.get("error"))
        .and_then(serde_json::Value::as_str)
    {
        return Err(Error::Remote(message.to_owned()));
    }

    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            body: truncate(body),
        });
    }

    let response: FunctionResponse =
        serde_json::from_value(value.map_err(Error::Parse)?).map_err(Error::Parse)?;
    Ok(Verdict {
        is_correct: response.is_correct,
        feedback: response.feedback,
    })
}

/// Posts answer checks to a judge function over HTTP
#[derive(Debug, Clone)]
pub struct FunctionJudge {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl FunctionJudge {
    /// Creates a client for the function at `url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `url` is empty and
    /// [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, Error> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Configuration("judge function URL is empty".into()));
        }
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.to_owned(),
            api_key,
        })
    }
}

#[async_trait]
impl AnswerJudge for FunctionJudge {
    async fn check_answer(&self, check: &AnswerCheck) -> Result<Verdict, Error> {
        let mut request = self.client.post(&self.url).json(check);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "judge function replied");

        decode_reply(status, &body)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_configuration_error() {
        assert!(matches!(
            FunctionJudge::new("  ", None, Duration::from_secs(5)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_decode_success() {
        let verdict = decode_reply(
            StatusCode::OK,
            r#"{"isCorrect": true, "feedback": "Верно!"}"#,
        )
        .unwrap();
        assert_eq!(verdict, Verdict::correct("Верно!"));
    }

    #[test]
    fn test_decode_remote_error() {
        let reply = decode_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "key missing", "isCorrect": false, "feedback": "Ошибка проверки"}"#,
        );
        assert!(matches!(reply, Err(Error::Remote(message)) if message == "key missing"));

        let reply = decode_reply(StatusCode::OK, r#"{"error": "quota"}"#);
        assert!(matches!(reply, Err(Error::Remote(_))));
    }

    #[test]
    fn test_decode_status_error() {
        let reply = decode_reply(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(reply, Err(Error::Status { status: 502, .. })));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode_reply(StatusCode::OK, "not json"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            decode_reply(StatusCode::OK, r#"{"feedback": "нет вердикта"}"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(FunctionResponse::from(Verdict::incorrect("Нет"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isCorrect": false, "feedback": "Нет"})
        );
    }

    #[tokio::test]
    async fn test_unreachable_function_is_transport_error() {
        let judge = FunctionJudge::new("http://127.0.0.1:9/check-answer", None, Duration::from_secs(2))
            .unwrap();
        let check = AnswerCheck {
            question: "Кто построил ковчег?".into(),
            correct_answer: "Ной".into(),
            user_answer: "Ной".into(),
            acceptable_keywords: vec![],
        };
        assert!(matches!(
            judge.check_answer(&check).await,
            Err(Error::Transport(_))
        ));
    }
}
