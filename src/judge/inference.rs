//! Judge backed by an OpenAI-compatible chat-completions API
//!
//! This is the logic the deployed judge function runs. It can be used
//! directly when the game holds the API credential itself, and
//! [`InferenceJudge::respond`] produces exactly the body the function
//! returns to its callers.

use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    AnswerCheck, AnswerJudge, Error, Verdict, function::FunctionResponse, reply::parse_verdict,
};
use crate::constants::judge::MAX_ERROR_BODY;

const SYSTEM_PROMPT: &str = "\
Ты проверяешь ответы в библейской викторине. Тебе дают вопрос, правильный \
ответ, допустимые ключевые слова и ответ игрока. Засчитай ответ, если он \
по смыслу совпадает с правильным, даже при опечатках, другой форме слова \
или лишних словах. Не засчитывай ответ, если он называет другое лицо, место \
или событие. Ответь строго одним JSON-объектом без пояснений и без Markdown: \
{\"isCorrect\": true или false, \"feedback\": \"одно короткое предложение на русском\"}";

/// Feedback sent along with an error reply
const FAILURE_FEEDBACK: &str = "Не удалось проверить ответ.";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

fn user_prompt(check: &AnswerCheck) -> String {
    let keywords = if check.acceptable_keywords.is_empty() {
        "нет".to_owned()
    } else {
        check.acceptable_keywords.iter().join(", ")
    };
    format!(
        "Вопрос: {}\nПравильный ответ: {}\nКлючевые слова: {}\nОтвет игрока: {}",
        check.question, check.correct_answer, keywords, check.user_answer
    )
}

/// Asks a chat model to judge answers
#[derive(Debug, Clone)]
pub struct InferenceJudge {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl InferenceJudge {
    /// Creates a judge talking to `endpoint` with `model`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] without a credential, endpoint or
    /// model, and [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Configuration("inference API key is not set".into()))?;
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(Error::Configuration("inference endpoint is empty".into()));
        }
        if model.trim().is_empty() {
            return Err(Error::Configuration("inference model is empty".into()));
        }

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.to_owned(),
            model: model.trim().to_owned(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    /// Judges `check` and shapes the outcome as the judge function's reply
    ///
    /// Never fails: errors become `{error, isCorrect: false, feedback}`.
    pub async fn respond(&self, check: &AnswerCheck) -> FunctionResponse {
        match self.check_answer(check).await {
            Ok(verdict) => verdict.into(),
            Err(e) => {
                warn!("inference judge failed: {e}");
                FunctionResponse {
                    is_correct: false,
                    feedback: FAILURE_FEEDBACK.to_owned(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl AnswerJudge for InferenceJudge {
    async fn check_answer(&self, check: &AnswerCheck) -> Result<Verdict, Error> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new("user", user_prompt(check)),
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let reply: ChatResponse = serde_json::from_str(&body).map_err(Error::Parse)?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Remote("model returned no choices".into()))?;
        debug!(model = %self.model, reply = %content, "model replied");

        Ok(parse_verdict(&content))
    }
}
