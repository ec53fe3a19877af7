use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    config::AppConfig,
    error::ServiceError,
    gateway::{EnrichedResponse, GenerationGateway, GenerationRequest},
    health::{HealthProber, HealthStatus},
    stats::{ServiceInfo, StatsReport, StatsReporter},
    upstream::InferenceClient,
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GenerationGateway>,
    pub prober: Arc<HealthProber>,
    pub stats: Arc<StatsReporter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, client: InferenceClient) -> Self {
        Self {
            gateway: Arc::new(GenerationGateway::new(config.clone(), client.clone())),
            prober: Arc::new(HealthProber::new(client, config.health_timeout)),
            stats: Arc::new(StatsReporter::new(config)),
        }
    }
}

pub fn build_router(config: Arc<AppConfig>, client: InferenceClient) -> Router {
    let cors = build_cors_layer(&config.frontend_origin);
    let state = AppState::new(config, client);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/generate", post(generate))
        .route("/api/stats", get(stats))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Single allowed origin with credentials. Methods and headers are mirrored
/// from the preflight since wildcards cannot be combined with credentials.
fn build_cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(AllowOrigin::list([origin])),
        Err(err) => {
            warn!(%origin, error = %err, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.stats.service_info())
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.prober.check_health().await)
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<EnrichedResponse>, ServiceError> {
    let Json(request) =
        payload.map_err(|rejection| ServiceError::InvalidInput(rejection.body_text()))?;
    let response = state.gateway.generate(&request.prompt).await?;
    Ok(Json(response))
}

async fn stats(State(state): State<AppState>) -> Json<StatsReport> {
    Json(state.stats.snapshot())
}
