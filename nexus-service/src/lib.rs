pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod reader;
pub mod service;
pub mod tasks;
pub mod workflow;

pub use config::ServiceConfig;
pub use orchestrator::{Orchestrator, Phase, StateSnapshot};
pub use service::{AppState, build_router, create_app};
pub use workflow::{build_ingestion_workflow, create_ingestion_session};
