//! Liveness probe against the inference server's model listing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::upstream::{InferenceClient, ModelList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LmStudioStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub backend_status: &'static str,
    pub lm_studio_status: LmStudioStatus,
    pub available_models: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct HealthProber {
    client: InferenceClient,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(client: InferenceClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Probes the inference server. Never fails: every problem is folded into
    /// [`LmStudioStatus`].
    pub async fn check_health(&self) -> HealthStatus {
        let (lm_studio_status, available_models) = self.probe().await;
        HealthStatus {
            backend_status: "healthy",
            lm_studio_status,
            available_models,
            timestamp: Utc::now(),
        }
    }

    async fn probe(&self) -> (LmStudioStatus, Vec<String>) {
        let reply = match self.client.get_models(self.timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(url = self.client.models_url(), error = %err, "inference server probe failed");
                return (LmStudioStatus::Error, Vec::new());
            }
        };

        if reply.status != 200 {
            debug!(status = reply.status, "inference server answered probe without 200");
            return (LmStudioStatus::Disconnected, Vec::new());
        }

        match serde_json::from_str::<ModelList>(&reply.body) {
            Ok(list) => {
                let models: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
                debug!(count = models.len(), "inference server connected");
                (LmStudioStatus::Connected, models)
            }
            Err(err) => {
                error!(error = %err, "unreadable model listing");
                (LmStudioStatus::Error, Vec::new())
            }
        }
    }
}
