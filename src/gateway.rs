//! Prompt relay: validates the prompt, forwards it to the inference server and
//! enriches the reply with timing and usage metadata.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    error::{ServiceError, truncate_chars},
    upstream::{
        ChatCompletionRequest, ChatCompletionResponse, ChatMessage, InferenceClient, Role,
        TokenUsage,
    },
};

pub const SYSTEM_INSTRUCTION: &str = "You are an expert programming assistant. \
Generate high-quality, well-commented code and briefly explain how it works.";

/// Substituted when the upstream reply carries no message content.
pub const NO_CONTENT: &str = "no content generated";

const PROMPT_PREVIEW_CHARS: usize = 100;

pub const BACKEND_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedResponse {
    pub choices: Vec<GeneratedChoice>,
    pub usage: TokenUsage,
    pub timing: Timing,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedChoice {
    pub message: ChatMessage,
}

/// Wall-clock breakdown of one generation, in milliseconds (two decimals).
///
/// `processing_time_ms` is `total_time_ms - lm_studio_time_ms` and is left
/// unclamped; a negative value means the two spans were measured overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Timing {
    pub total_time_ms: f64,
    pub lm_studio_time_ms: f64,
    pub processing_time_ms: f64,
}

impl Timing {
    pub fn from_durations(total: Duration, upstream: Duration) -> Self {
        let total_ms = total.as_secs_f64() * 1000.0;
        let upstream_ms = upstream.as_secs_f64() * 1000.0;
        Self {
            total_time_ms: round2(total_ms),
            lm_studio_time_ms: round2(upstream_ms),
            processing_time_ms: round2(total_ms - upstream_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub backend_version: &'static str,
    pub prompt_length: usize,
    pub response_length: usize,
}

pub struct GenerationGateway {
    config: Arc<AppConfig>,
    client: InferenceClient,
}

impl GenerationGateway {
    pub fn new(config: Arc<AppConfig>, client: InferenceClient) -> Self {
        Self { config, client }
    }

    /// System instruction followed by the user prompt, with the configured
    /// model and sampling parameters.
    pub fn build_payload(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.default_model.clone(),
            messages: vec![
                ChatMessage::new(Role::System, SYSTEM_INSTRUCTION),
                ChatMessage::new(Role::User, prompt),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<EnrichedResponse, ServiceError> {
        let started = Instant::now();
        info!(
            prompt = %truncate_chars(prompt, PROMPT_PREVIEW_CHARS),
            "sending prompt to inference server"
        );

        match self.relay(prompt, started).await {
            Ok(response) => {
                info!(
                    elapsed_s = started.elapsed().as_secs_f64(),
                    total_tokens = response.usage.total_tokens,
                    "generation finished"
                );
                Ok(response)
            }
            Err(err) => {
                error!(
                    elapsed_s = started.elapsed().as_secs_f64(),
                    status = err.status_code().as_u16(),
                    error = %err,
                    "generation failed"
                );
                Err(err)
            }
        }
    }

    async fn relay(&self, prompt: &str, started: Instant) -> Result<EnrichedResponse, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::InvalidInput("prompt must not be empty".into()));
        }

        let payload = self.build_payload(prompt);

        let request_start = Instant::now();
        let reply = self
            .client
            .post_chat(&payload, self.config.generate_timeout)
            .await?;
        let upstream_elapsed = request_start.elapsed();

        if !reply.is_success() {
            return Err(ServiceError::UpstreamError {
                status: reply.status,
                body: reply.body,
            });
        }

        let result: ChatCompletionResponse = match serde_json::from_str(&reply.body) {
            Ok(result) => result,
            Err(err) => {
                let err = ServiceError::protocol(err, &reply.body);
                if let ServiceError::UpstreamProtocolError { snippet, .. } = &err {
                    error!(%snippet, "unparseable inference server body");
                }
                return Err(err);
            }
        };
        info!(bytes = reply.body.len(), "inference server replied");

        Ok(enrich(prompt, &result, started.elapsed(), upstream_elapsed))
    }
}

/// Builds the client-facing response from a parsed upstream reply.
pub fn enrich(
    prompt: &str,
    result: &ChatCompletionResponse,
    total: Duration,
    upstream: Duration,
) -> EnrichedResponse {
    let content = result.first_content().unwrap_or(NO_CONTENT);
    let usage = result.token_usage();

    EnrichedResponse {
        choices: vec![GeneratedChoice {
            message: ChatMessage::new(Role::Assistant, content),
        }],
        usage,
        timing: Timing::from_durations(total, upstream),
        metadata: ResponseMetadata {
            timestamp: Utc::now(),
            backend_version: BACKEND_VERSION,
            prompt_length: prompt.chars().count(),
            response_length: content.chars().count(),
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use tokio::net::TcpListener;

    const CHAT_PATH: &str = "/v1/chat/completions";

    fn gateway_for(url: String, timeout: Duration) -> GenerationGateway {
        let config = Arc::new(AppConfig {
            lm_studio_url: url,
            generate_timeout: timeout,
            ..AppConfig::default()
        });
        let client = InferenceClient::new(&config).unwrap();
        GenerationGateway::new(config, client)
    }

    fn gateway_for_server(server: &ServerGuard) -> GenerationGateway {
        gateway_for(
            format!("{}{CHAT_PATH}", server.url()),
            Duration::from_secs(10),
        )
    }

    fn success_body() -> String {
        json!({
            "choices": [{"message": {"role": "assistant", "content": "print('hi')"}}],
            "usage": {"prompt_tokens": 11, "completion_tokens": 7, "total_tokens": 18}
        })
        .to_string()
    }

    #[tokio::test]
    async fn relays_prompt_and_enriches_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", CHAT_PATH)
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek-coder-v2-lite-instruct",
                "max_tokens": 2048,
                "temperature": 0.7,
                "stream": false,
                "messages": [
                    {"role": "system", "content": SYSTEM_INSTRUCTION},
                    {"role": "user", "content": "write hello world in python"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(success_body())
            .expect(1)
            .create_async()
            .await;

        let gateway = gateway_for_server(&server);
        let response = gateway
            .generate("write hello world in python")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.usage.total_tokens, 18);
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.role, Role::Assistant);
        assert_eq!(response.choices[0].message.content, "print('hi')");
        assert_eq!(response.metadata.prompt_length, 27);
        assert_eq!(response.metadata.response_length, 11);
        assert_eq!(response.metadata.backend_version, BACKEND_VERSION);
        assert!(response.timing.total_time_ms >= 0.0);
        assert!(response.timing.lm_studio_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn blank_prompts_never_reach_upstream() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(success_body())
            .expect(0)
            .create_async()
            .await;

        let gateway = gateway_for_server(&server);
        for prompt in ["", "   ", "\n\t "] {
            let err = gateway.generate(prompt).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)), "{err:?}");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_failure_status_and_body_pass_through() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", CHAT_PATH)
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let err = gateway_for_server(&server)
            .generate("hello")
            .await
            .unwrap_err();
        match err {
            ServiceError::UpstreamError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error_with_snippet() {
        let mut server = Server::new_async().await;
        let garbage = format!("<html>not json</html>{}", "x".repeat(1000));
        server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(&garbage)
            .create_async()
            .await;

        let err = gateway_for_server(&server)
            .generate("hello")
            .await
            .unwrap_err();
        match err {
            ServiceError::UpstreamProtocolError { snippet, .. } => {
                assert!(snippet.starts_with("<html>not json</html>"));
                assert!(snippet.chars().count() <= 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_and_usage_fall_back_to_defaults() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let response = gateway_for_server(&server).generate("hello").await.unwrap();
        assert_eq!(response.choices[0].message.content, NO_CONTENT);
        assert_eq!(response.usage, TokenUsage::default());
        assert_eq!(response.metadata.response_length, NO_CONTENT.chars().count());
    }

    #[tokio::test]
    async fn hung_upstream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let gateway = gateway_for(
            format!("http://{addr}{CHAT_PATH}"),
            Duration::from_millis(300),
        );
        let started = Instant::now();
        let err = gateway.generate("hello").await.unwrap_err();

        assert!(matches!(err, ServiceError::UpstreamTimeout), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gateway = gateway_for(
            format!("http://127.0.0.1:{port}{CHAT_PATH}"),
            Duration::from_secs(5),
        );

        let err = gateway.generate("hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamUnreachable), "{err:?}");
    }

    #[test]
    fn timing_rounds_to_two_decimals() {
        let timing =
            Timing::from_durations(Duration::from_micros(1_234_567), Duration::from_micros(1_000_001));
        assert_eq!(timing.total_time_ms, 1234.57);
        assert_eq!(timing.lm_studio_time_ms, 1000.0);
        assert_eq!(timing.processing_time_ms, 234.57);
    }

    #[test]
    fn processing_time_is_not_clamped() {
        // Overlapping measurements surface as a negative processing time.
        let timing = Timing::from_durations(Duration::from_millis(10), Duration::from_millis(12));
        assert_eq!(timing.processing_time_ms, -2.0);
    }

    #[test]
    fn prompt_length_counts_characters() {
        let response = enrich(
            "héllo wörld",
            &ChatCompletionResponse::default(),
            Duration::ZERO,
            Duration::ZERO,
        );
        assert_eq!(response.metadata.prompt_length, 11);
    }
}
