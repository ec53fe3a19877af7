use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{config::AppConfig, gateway::BACKEND_VERSION};

pub const SERVICE_NAME: &str = "Veridia Backend";

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub lm_studio_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub server_info: ServerInfo,
    pub configuration: ConfigurationSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationSnapshot {
    pub lm_studio_url: String,
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub generate_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

pub struct StatsReporter {
    config: Arc<AppConfig>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StatsReporter {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            service: SERVICE_NAME,
            version: BACKEND_VERSION,
            status: "active",
            lm_studio_url: self.config.lm_studio_url.clone(),
        }
    }

    pub fn snapshot(&self) -> StatsReport {
        StatsReport {
            server_info: ServerInfo {
                name: SERVICE_NAME,
                version: BACKEND_VERSION,
                started_at: self.started_at,
                uptime_seconds: self.started.elapsed().as_secs(),
            },
            configuration: ConfigurationSnapshot {
                lm_studio_url: self.config.lm_studio_url.clone(),
                default_model: self.config.default_model.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                generate_timeout_secs: self.config.generate_timeout.as_secs(),
                health_timeout_secs: self.config.health_timeout.as_secs(),
            },
        }
    }
}
