pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, PushSettings, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, NudgeServer, ServerBuilder, build_app};
