//! OpenAI-compatible chat completions client

use super::sse::{SseDecoder, SseEvent};
use super::{ChatRequest, ChunkStream, ModelClient};
use crate::config::EngineConfig;
use crate::error::{EngineError, ModelError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

/// Characters of an error body kept in messages
const ERROR_BODY_LEN: usize = 300;

/// Client for `/chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create client from configuration
    ///
    /// # Errors
    /// `EngineError::Configuration` when no API key is configured or the
    /// HTTP client cannot be built
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EngineError::Configuration("no API key configured".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(model = %request.model, stream = request.stream, "Dispatching chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body, &request.model))
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let mut request = request.clone();
        request.stream = false;

        let body: Value = self
            .send(&request)
            .await?
            .json()
            .await
            .map_err(|e| ModelError::Provider(format!("invalid completion body: {e}")))?;

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::Provider("completion has no message content".to_string()))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, ModelError> {
        let mut request = request.clone();
        request.stream = true;

        let bytes = Box::pin(self.send(&request).await?.bytes_stream());
        let state = (bytes, SseDecoder::new(), VecDeque::new(), false);

        let chunks = stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (bytes, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        for event in decoder.push(&chunk) {
                            match event {
                                SseEvent::Done => {
                                    done = true;
                                    break;
                                }
                                SseEvent::Data(data) => {
                                    if let Some(item) = delta_content(&data) {
                                        pending.push_back(item);
                                    }
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        done = true;
                        pending.push_back(Err(ModelError::Network(e.to_string())));
                    }
                    None => done = true,
                }
            }
        });

        Ok(chunks.boxed())
    }
}

/// Text delta of one stream chunk, `None` when it carries no text
fn delta_content(data: &str) -> Option<Result<String, ModelError>> {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => return Some(Err(ModelError::Provider(format!("malformed stream chunk: {e}")))),
    };
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| Ok(text.to_string()))
}

/// Map a non-success response to a [`ModelError`]
fn classify_failure(status: StatusCode, body: &str, model: &str) -> ModelError {
    let detail: String = body.chars().take(ERROR_BODY_LEN).collect();
    let lowered = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS || lowered.contains("rate limit") {
        ModelError::RateLimit(detail)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ModelError::Auth(detail)
    } else if status == StatusCode::NOT_FOUND || lowered.contains("model_not_found") {
        ModelError::ModelNotFound(model.to_string())
    } else {
        ModelError::Provider(format!("HTTP {status}: {detail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_configuration_error() {
        let err = OpenAiClient::from_config(&EngineConfig::new()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));

        let err = OpenAiClient::from_config(&EngineConfig::new().with_api_key("  ")).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn base_url_is_normalized() {
        let config = EngineConfig::new().with_api_key("k").with_api_base("http://localhost:8080/v1/");
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.api_base, "http://localhost:8080/v1");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "", "m"),
            ModelError::RateLimit(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "bad key", "m"),
            ModelError::Auth(_)
        ));
        assert_eq!(
            classify_failure(StatusCode::NOT_FOUND, "", "gpt-x"),
            ModelError::ModelNotFound("gpt-x".to_string())
        );
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "{\"error\":{\"code\":\"model_not_found\"}}", "m"),
            ModelError::ModelNotFound(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "oops", "m"),
            ModelError::Provider(_)
        ));
    }

    #[test]
    fn delta_extraction() {
        let chunk = r#"{"choices":[{"delta":{"content":"<div>"}}]}"#;
        assert_eq!(delta_content(chunk), Some(Ok("<div>".to_string())));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_content(role_only), None);

        assert!(matches!(delta_content("{oops"), Some(Err(ModelError::Provider(_)))));
    }
}
