pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod server;
pub mod stats;
pub mod upstream;

pub use config::AppConfig;
pub use error::ServiceError;
pub use gateway::{EnrichedResponse, GenerationGateway, GenerationRequest};
pub use health::{HealthProber, HealthStatus, LmStudioStatus};
pub use server::build_router;
pub use stats::StatsReporter;
pub use upstream::InferenceClient;
