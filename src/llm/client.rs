//! OpenAI-compatible chat completions client
//!
//! Talks to any provider exposing `POST {base_url}/chat/completions`
//! (Groq by default). Sends the configured model and temperature with every
//! request and never retries.

use super::sse::{SseDecoder, SseEvent};
use super::types::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest};
use super::{FragmentStream, LlmClient, Message};
use crate::config::{ApiKey, LlmConfig};
use crate::error::{AppError, AppResult, ModelQueryError};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Connection establishment bound; streamed bodies are bounded per chunk by `timeout`
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsClient {
    /// Build a client with an already-resolved credential
    pub fn new(config: &LlmConfig, api_key: ApiKey) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url().trim_end_matches('/')),
            model: config.model().to_string(),
            temperature: config.temperature(),
            timeout: Duration::from_secs(config.timeout_seconds()),
        })
    }

    /// Build a client whose credential is read through `lookup`
    ///
    /// Fails with a configuration error before any network call when the
    /// variable is absent or still holds the placeholder.
    pub fn from_lookup<F>(config: &LlmConfig, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ApiKey::resolve(config.api_key_env(), config.api_key_placeholder(), lookup)?;
        Self::new(config, api_key)
    }

    /// Full URL requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, ModelQueryError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            message_count = messages.len(),
            stream,
            "Sending chat completion request"
        );

        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body);
        if !stream {
            request = request.timeout(self.timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                endpoint = %self.endpoint,
                error = %e,
                timeout = e.is_timeout(),
                "Chat completion request failed"
            );
            ModelQueryError::Request {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Chat completion provider returned an error status"
            );
            return Err(ModelQueryError::status(
                self.endpoint.clone(),
                status.as_u16(),
                &body,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelQueryError> {
        let response = self.send(messages, false).await?;

        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|e| ModelQueryError::Decode {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })?;

        let text = completion
            .into_text()
            .ok_or_else(|| ModelQueryError::EmptyResponse {
                endpoint: self.endpoint.clone(),
            })?;

        tracing::debug!(
            endpoint = %self.endpoint,
            response_length = text.len(),
            "Received chat completion"
        );
        Ok(text)
    }

    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream, ModelQueryError> {
        let response = self.send(messages, true).await?;
        let endpoint = self.endpoint.clone();
        let idle_timeout = self.timeout;
        let mut body = response.bytes_stream();

        Ok(Box::pin(async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut bytes_received = 0usize;
            let mut fragments = 0usize;
            let mut pending = Vec::new();
            let mut finished = false;

            loop {
                let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        tracing::warn!(
                            endpoint = %endpoint,
                            bytes_received,
                            error = %e,
                            "Stream error during content delivery"
                        );
                        yield Err(interrupted(&endpoint, bytes_received, e.to_string()));
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!(
                            endpoint = %endpoint,
                            bytes_received,
                            idle_seconds = idle_timeout.as_secs(),
                            "Stream stalled"
                        );
                        yield Err(interrupted(
                            &endpoint,
                            bytes_received,
                            format!("no data for {} seconds", idle_timeout.as_secs()),
                        ));
                        return;
                    }
                };
                bytes_received += chunk.len();

                match decoder.push(&chunk) {
                    Ok(events) => pending.extend(events),
                    Err(e) => {
                        yield Err(interrupted(&endpoint, bytes_received, e.to_string()));
                        return;
                    }
                }

                for event in pending.drain(..) {
                    match event {
                        SseEvent::Done => {
                            finished = true;
                            break;
                        }
                        SseEvent::Data(data) => match decode_chunk(&endpoint, &data) {
                            Ok(Some(text)) => {
                                fragments += 1;
                                yield Ok(text);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!(endpoint = %endpoint, error = %e, "Stream failed");
                                yield Err(e);
                                return;
                            }
                        },
                    }
                }
                if finished {
                    break;
                }
            }

            if !finished {
                match decoder.finish() {
                    Some(SseEvent::Done) => finished = true,
                    Some(SseEvent::Data(data)) => match decode_chunk(&endpoint, &data) {
                        Ok(Some(text)) => {
                            fragments += 1;
                            yield Ok(text);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    None => {}
                }
            }

            if !finished {
                tracing::warn!(endpoint = %endpoint, bytes_received, fragments, "Stream closed before [DONE]");
                yield Err(interrupted(
                    &endpoint,
                    bytes_received,
                    "connection closed before [DONE]".to_string(),
                ));
                return;
            }
            if fragments == 0 {
                yield Err(ModelQueryError::EmptyResponse { endpoint: endpoint.clone() });
                return;
            }
            tracing::debug!(endpoint = %endpoint, fragments, "Stream finished");
        }))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Decode one `data:` payload into its content delta
fn decode_chunk(endpoint: &str, data: &str) -> Result<Option<String>, ModelQueryError> {
    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| ModelQueryError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(error) = chunk.error {
        return Err(ModelQueryError::Provider {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        });
    }
    Ok(chunk.into_fragment())
}

fn interrupted(endpoint: &str, bytes_received: usize, reason: String) -> ModelQueryError {
    ModelQueryError::StreamInterrupted {
        endpoint: endpoint.to_string(),
        bytes_received,
        reason,
    }
}
