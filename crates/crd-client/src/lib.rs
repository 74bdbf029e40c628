pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod prefetch;
pub mod server;
pub mod store;

pub use config::AppConfig;
pub use dispatch::{Dispatcher, InvokeOutcome, InvokeRequest};
pub use error::{ClientError, Result};
pub use server::{CrdClientServer, ServerBuilder, build_app};
pub use store::RequestStore;
