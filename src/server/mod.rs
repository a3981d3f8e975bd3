//! Server module - HTTP API, pushed events and server lifecycle

mod connection;
mod error;
mod handlers;
mod listener;
mod router;

pub use error::ApiError;
pub use listener::GatewayServer;
pub use router::{create_router, AppState};
