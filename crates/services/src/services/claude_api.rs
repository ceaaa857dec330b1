//! Client for the Anthropic messages API, used to write team insights.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{error, warn};

use super::config::Config;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("ANTHROPIC_API_KEY is not configured")]
    MissingApiKey,
}

impl ClaudeApiError {
    /// Transient failures worth another attempt.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
}

impl ClaudeApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, ClaudeApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("crm-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: CLAUDE_API_URL.to_string(),
        })
    }

    /// `MissingApiKey` when no key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ClaudeApiError> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .ok_or(ClaudeApiError::MissingApiKey)?;
        Self::new(api_key, config.anthropic_model.clone())
    }

    /// Point the client at another messages endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(
        &self,
        messages: &[Message],
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<MessagesResponse, ClaudeApiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages,
            system,
        };

        (|| async { self.send(&request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(20))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(ClaudeApiError::should_retry)
            .notify(|e, dur| {
                warn!(
                    error = %e,
                    retry_in_secs = dur.as_secs_f64(),
                    "Claude API call failed, retrying"
                )
            })
            .await
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, ClaudeApiError> {
        let res = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<MessagesResponse>()
                .await
                .map_err(|e| ClaudeApiError::InvalidResponse(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeApiError::RateLimited),
            s => {
                let body = res.text().await.unwrap_or_default();
                Err(ClaudeApiError::Http {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }

    pub async fn ask(&self, prompt: &str, system: Option<&str>) -> Result<String, ClaudeApiError> {
        let response = self
            .complete(&[Message::user(prompt)], system, DEFAULT_MAX_TOKENS)
            .await?;
        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| ClaudeApiError::InvalidResponse("no text content".to_string()))
    }

    /// Ask for a JSON answer and decode it into `T`.
    pub async fn ask_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<T, ClaudeApiError> {
        let response = self.ask(prompt, system).await?;
        parse_json_reply(&response)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeApiError {
    if e.is_timeout() {
        ClaudeApiError::Timeout
    } else {
        ClaudeApiError::Transport(e.to_string())
    }
}

pub(crate) fn parse_json_reply<T: DeserializeOwned>(response: &str) -> Result<T, ClaudeApiError> {
    let json = extract_json(response);
    if json.is_empty() {
        return Err(ClaudeApiError::InvalidResponse("empty reply".to_string()));
    }
    serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(300).collect();
        error!(json_error = %e, %preview, "could not decode JSON reply");
        ClaudeApiError::InvalidResponse(e.to_string())
    })
}

/// The JSON payload of a reply that may wrap it in a fenced code block or prose.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```") {
        let after_fence = start + 3;
        // Skip the language tag, if any
        let body_start = text[after_fence..]
            .find('\n')
            .map_or(after_fence, |i| after_fence + i + 1);
        if let Some(end) = text[body_start..].find("```") {
            return text[body_start..body_start + end].trim();
        }
    }

    // Prose around a bare object
    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if open < close => &text[open..=close],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        key: String,
    }

    #[test]
    fn extracts_plain_json() {
        assert_eq!(extract_json(r#" {"key": "value"} "#), r#"{"key": "value"}"#);
    }

    #[test]
    fn extracts_fenced_json() {
        let tagged = "Here you go:\n```json\n{\"key\": \"value\"}\n```\nThanks";
        assert_eq!(extract_json(tagged), r#"{"key": "value"}"#);

        let untagged = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(untagged), r#"{"key": "value"}"#);
    }

    #[test]
    fn extracts_object_from_prose() {
        let text = "Sure. {\"key\": \"value\"} Let me know if you need more.";
        let reply: Reply = parse_json_reply(text).unwrap();
        assert_eq!(reply.key, "value");
    }

    #[test]
    fn bad_reply_is_invalid_response() {
        assert!(matches!(
            parse_json_reply::<Reply>("   "),
            Err(ClaudeApiError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_json_reply::<Reply>("{\"other\": 1}"),
            Err(ClaudeApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn retries_only_transient_errors() {
        assert!(ClaudeApiError::Timeout.should_retry());
        assert!(ClaudeApiError::RateLimited.should_retry());
        assert!(
            ClaudeApiError::Http {
                status: 529,
                body: String::new()
            }
            .should_retry()
        );
        assert!(
            !ClaudeApiError::Http {
                status: 400,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!ClaudeApiError::InvalidApiKey.should_retry());
    }

    #[test]
    fn response_text_skips_other_blocks() {
        let body = r#"{"id":"msg_1","model":"m","stop_reason":"end_turn","content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"hello"}]}"#;
        let response: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), Some("hello"));
    }

    #[test]
    fn client_requires_key() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(matches!(
            ClaudeApiClient::from_config(&config),
            Err(ClaudeApiError::MissingApiKey)
        ));
    }
}
