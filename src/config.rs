use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Chat-completions endpoint of the inference server.
    pub lm_studio_url: String,
    pub default_model: String,
    /// Single origin allowed by CORS, with credentials.
    pub frontend_origin: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub generate_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
            lm_studio_url: "http://localhost:1234/v1/chat/completions".to_string(),
            default_model: "deepseek-coder-v2-lite-instruct".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            generate_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let listen_addr = env::var("SERVER_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.listen_addr);

        let lm_studio_url = env::var("LM_STUDIO_API_URL").unwrap_or(defaults.lm_studio_url);
        let default_model = env::var("DEFAULT_MODEL").unwrap_or(defaults.default_model);
        let frontend_origin = env::var("FRONTEND_ORIGIN").unwrap_or(defaults.frontend_origin);

        let max_tokens = env::var("MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_tokens);
        let temperature = env::var("TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.temperature);

        let generate_timeout = env::var("GENERATE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.generate_timeout);
        let health_timeout = env::var("HEALTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.health_timeout);

        if lm_studio_url.trim().is_empty() {
            anyhow::bail!("LM_STUDIO_API_URL must not be empty");
        }

        Ok(Self {
            listen_addr,
            lm_studio_url,
            default_model,
            frontend_origin,
            max_tokens,
            temperature,
            generate_timeout,
            health_timeout,
        })
    }

    /// Model-listing endpoint next to the chat-completions endpoint.
    ///
    /// `.../v1/chat/completions` becomes `.../v1/models`; anything else is
    /// treated as a base URL and gets `/models` appended.
    pub fn models_url(&self) -> String {
        let url = self.lm_studio_url.trim_end_matches('/');
        match url.strip_suffix(CHAT_COMPLETIONS_SUFFIX) {
            Some(base) => format!("{base}/models"),
            None => format!("{url}/models"),
        }
    }
}
