pub mod client;
pub mod config;
pub mod error;
pub mod kie;
pub mod logger;
pub mod models;
pub mod poll;
pub mod provider;
#[cfg(feature = "server")]
pub mod server;
pub mod validation;

pub use client::GenerationsClient;
pub use config::{Config, KieConfig};
pub use error::{GenerationError, Result};
pub use kie::{KieClient, StatusClient, TaskClient};
pub use models::{
    supported_models, GenerationRequest, ModelInfo, ModelInput, TaskCreated, TaskState,
    TaskStatus, VideoModel,
};
pub use poll::{Failure, GenerationPhase, PollController, PollSchedule};
pub use provider::TaskProvider;
pub use validation::{normalize, normalize_body};
