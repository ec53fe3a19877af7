use std::time::Duration;

use reqwest::Client;

use crate::{config::AppConfig, error::ServiceError, upstream::ChatCompletionRequest};

/// Status and raw body of one upstream exchange.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin HTTP client for the inference server.
///
/// Every call carries its own timeout, which covers connecting, sending and
/// reading the whole body. Transport failures are classified by
/// `From<reqwest::Error> for ServiceError`.
#[derive(Clone)]
pub struct InferenceClient {
    http: Client,
    chat_url: String,
    models_url: String,
}

impl InferenceClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            chat_url: config.lm_studio_url.clone(),
            models_url: config.models_url(),
        })
    }

    pub fn models_url(&self) -> &str {
        &self.models_url
    }

    pub async fn post_chat(
        &self,
        payload: &ChatCompletionRequest,
        timeout: Duration,
    ) -> Result<UpstreamReply, ServiceError> {
        let response = self
            .http
            .post(&self.chat_url)
            .json(payload)
            .timeout(timeout)
            .send()
            .await?;
        read_reply(response).await
    }

    pub async fn get_models(&self, timeout: Duration) -> Result<UpstreamReply, ServiceError> {
        let response = self
            .http
            .get(&self.models_url)
            .timeout(timeout)
            .send()
            .await?;
        read_reply(response).await
    }
}

async fn read_reply(response: reqwest::Response) -> Result<UpstreamReply, ServiceError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(UpstreamReply { status, body })
}
