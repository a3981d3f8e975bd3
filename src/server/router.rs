//! Route table and shared handler state

use super::{connection, handlers};
use crate::delegate::SimulatedDelegate;
use crate::lifecycle::LifecycleController;
use crate::protocol::API_PREFIX;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub controller: LifecycleController,

    /// Present when the simulation routes are enabled
    pub simulator: Option<Arc<SimulatedDelegate>>,
}

pub fn create_router(state: AppState) -> Router {
    let mut api_router = Router::new()
        .route("/create", post(handlers::create_connection))
        .route("/qr/:id", get(handlers::get_qr))
        .route("/connections", get(handlers::list_connections))
        .route("/connections/:id", patch(handlers::rename_connection))
        .route("/status/:id", get(handlers::get_status))
        .route("/send/:id", post(handlers::send_message))
        .route("/disconnect/:id", delete(handlers::disconnect))
        .route("/refresh/:id", post(handlers::refresh_qr))
        .route("/events", get(connection::events_handler));

    if state.simulator.is_some() {
        api_router = api_router
            .route("/simulate/:id/pair", post(handlers::simulate_pair))
            .route("/simulate/:id/lose", post(handlers::simulate_lose))
            .route("/simulate/:id/message", post(handlers::simulate_message));
    }

    Router::new()
        .nest(API_PREFIX, api_router)
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
