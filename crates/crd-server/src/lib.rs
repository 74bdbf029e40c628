pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use error::{ApiError, Result};
pub use server::{CrdServer, ServerBuilder, build_app};
