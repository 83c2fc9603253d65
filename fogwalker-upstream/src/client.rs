//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use fogwalker_core::constants::SYSTEM_PROMPT;
use fogwalker_core::error::{FogwalkerError, Result};
use fogwalker_core::traits::{TextGenerator, TextStream};
use fogwalker_core::types::GenerationParams;

use crate::config::UpstreamConfig;
use crate::sse::{SseDecoder, SseEvent};

/// Text generator backed by an OpenAI-compatible HTTP API.
pub struct OpenAiClient {
    config: UpstreamConfig,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Creates a client. The timeout applies per call, not to the connection pool.
    pub fn with_config(config: UpstreamConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| FogwalkerError::Upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Creates a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(UpstreamConfig::from_env())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams, stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": stream,
        });
        if params.structured_output {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    async fn send(&self, prompt: &str, params: &GenerationParams, stream: bool) -> Result<reqwest::Response> {
        let api_key = self.config.require_api_key()?;
        let url = self.config.completions_url()?;

        let mut request = self
            .http_client
            .post(url)
            .bearer_auth(api_key)
            .json(&self.request_body(prompt, params, stream));
        if !stream {
            request = request.timeout(self.config.timeout);
        }

        let send = request.send();
        let response = if stream {
            tokio::time::timeout(self.config.timeout, send)
                .await
                .map_err(|_| self.timed_out())?
        } else {
            send.await
        }
        .map_err(map_reqwest_error)?;

        check_status(response).await
    }

    fn timed_out(&self) -> FogwalkerError {
        FogwalkerError::Timeout(format!(
            "AI API request timed out after {}ms",
            self.config.timeout.as_millis()
        ))
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let response = self.send(prompt, params, false).await?;

        let body: Value = response.json().await.map_err(map_reqwest_error)?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(FogwalkerError::EmptyResponse)?;

        debug!(chars = content.len(), "Upstream generation complete");
        Ok(content.to_string())
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        let response = self.send(prompt, params, true).await?;
        let idle = self.config.timeout;
        let timed_out = self.timed_out();

        let stream = async_stream::stream! {
            let mut body = response.bytes_stream();
            let mut sse = SseDecoder::default();

            'read: loop {
                let next = match tokio::time::timeout(idle, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(timed_out);
                        break 'read;
                    }
                };
                match next {
                    None => {
                        match sse.finish() {
                            Some(SseEvent::Delta(text)) => yield Ok(text),
                            Some(SseEvent::Error(message)) => {
                                warn!(error = %message, "Upstream reported error mid-stream");
                                yield Err(FogwalkerError::Upstream(message));
                            }
                            Some(SseEvent::Done) | None => {}
                        }
                        break 'read;
                    }
                    Some(Err(e)) => {
                        yield Err(map_reqwest_error(e));
                        break 'read;
                    }
                    Some(Ok(bytes)) => {
                        for event in sse.push(&bytes) {
                            match event {
                                SseEvent::Delta(text) => yield Ok(text),
                                SseEvent::Done => break 'read,
                                SseEvent::Error(message) => {
                                    warn!(error = %message, "Upstream reported error mid-stream");
                                    yield Err(FogwalkerError::Upstream(message));
                                    break 'read;
                                }
                            }
                        }
                    }
                }
            }
            debug!("Upstream stream ended");
        };

        Ok(stream.boxed())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FogwalkerError {
    if err.is_timeout() {
        FogwalkerError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        FogwalkerError::Network(err.to_string())
    } else if err.is_decode() {
        FogwalkerError::Upstream(format!("Malformed response body: {err}"))
    } else {
        FogwalkerError::Upstream(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FogwalkerError::Unauthorized(text),
        StatusCode::TOO_MANY_REQUESTS => FogwalkerError::RateLimited(text),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FogwalkerError::Timeout(text),
        _ => FogwalkerError::Upstream(format!("HTTP {status}: {text}")),
    })
}
