//! HTTP handlers for the session routes

use super::error::ApiError;
use super::router::AppState;
use crate::delegate::SimulatedDelegate;
use crate::error::GatewayError;
use crate::protocol::{
    ActionResponse, ConnectionSummary, CreateRequest, CreateResponse, IncomingRequest,
    LoseRequest, PairRequest, QrFormat, QrQuery, QrResponse, RenameRequest, SendRequest,
    StatusResponse,
};
use crate::qr;
use crate::session::SessionId;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// POST /create
pub async fn create_connection(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<CreateResponse> {
    let requested = req
        .connection_id
        .filter(|id| !id.trim().is_empty())
        .map(SessionId::new);

    let id = match requested {
        Some(id) => {
            state
                .controller
                .create_connection_with_id(id, &req.name)
                .await?
        }
        None => state.controller.create_connection(&req.name).await?,
    };

    Ok(Json(CreateResponse {
        success: true,
        connection_id: id.to_string(),
        message: "Connection started. Wait for the QR code.".to_string(),
    }))
}

/// GET /qr/:id
pub async fn get_qr(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<QrQuery>,
) -> ApiResult<QrResponse> {
    let payload = state
        .controller
        .get_pairing_artifact(&id)
        .await?
        .ok_or_else(|| ApiError::qr_unavailable(&id))?;

    let qr_code = match query.format {
        QrFormat::Image => qr::encode_as_image(&payload)?,
        QrFormat::Payload => payload,
    };

    Ok(Json(QrResponse { qr_code }))
}

/// GET /connections
pub async fn list_connections(State(state): State<AppState>) -> Json<Vec<ConnectionSummary>> {
    let connections = state.controller.list().await;
    Json(connections.iter().map(ConnectionSummary::from).collect())
}

/// GET /status/:id
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    let status = state.controller.get_status(&id).await?;
    Ok(Json(status.into()))
}

/// POST /send/:id
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> ApiResult<ActionResponse> {
    state.controller.send(&id, &req.to, &req.message).await?;
    Ok(Json(ActionResponse::ok("Message sent")))
}

/// DELETE /disconnect/:id
///
/// Disconnects and then removes the connection. A delegate failure while
/// disconnecting is returned as-is and the entry stays listed as
/// disconnected, so a retry can remove it.
pub async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
    match state.controller.disconnect(&id).await {
        Ok(()) | Err(GatewayError::InvalidTransition { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    state.controller.remove(&id).await?;
    Ok(Json(ActionResponse::ok("Connection disconnected")))
}

/// POST /refresh/:id
pub async fn refresh_qr(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
    state.controller.refresh_pairing(&id).await?;
    Ok(Json(ActionResponse::ok("QR code refreshed")))
}

/// PATCH /connections/:id
pub async fn rename_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<ActionResponse> {
    state.controller.rename(&id, &req.name).await?;
    Ok(Json(ActionResponse::ok("Connection renamed")))
}

fn simulator(state: &AppState) -> Result<&Arc<SimulatedDelegate>, ApiError> {
    state
        .simulator
        .as_ref()
        .ok_or_else(ApiError::simulation_disabled)
}

/// POST /simulate/:id/pair
pub async fn simulate_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PairRequest>,
) -> ApiResult<ActionResponse> {
    let simulator = simulator(&state)?;
    let phone = req.phone_number.trim();
    if phone.is_empty() {
        return Err(GatewayError::Validation("phoneNumber is required".to_string()).into());
    }

    let status = state.controller.get_status(&id).await?;
    simulator
        .simulate_pairing(&status.connection_id, phone)
        .await
        .map_err(GatewayError::from)?;

    Ok(Json(ActionResponse::ok("Pairing signal delivered")))
}

/// POST /simulate/:id/lose
pub async fn simulate_lose(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LoseRequest>,
) -> ApiResult<ActionResponse> {
    let simulator = simulator(&state)?;
    let status = state.controller.get_status(&id).await?;
    let reason = req.reason.unwrap_or_else(|| "simulated connection loss".to_string());

    simulator
        .simulate_loss(&status.connection_id, reason)
        .await
        .map_err(GatewayError::from)?;

    Ok(Json(ActionResponse::ok("Loss signal delivered")))
}

/// POST /simulate/:id/message
pub async fn simulate_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IncomingRequest>,
) -> ApiResult<ActionResponse> {
    let simulator = simulator(&state)?;
    if req.from.trim().is_empty() || req.body.trim().is_empty() {
        return Err(GatewayError::Validation("from and body are required".to_string()).into());
    }

    let status = state.controller.get_status(&id).await?;
    simulator
        .simulate_incoming(&status.connection_id, req.from, req.body)
        .await
        .map_err(GatewayError::from)?;

    Ok(Json(ActionResponse::ok("Message delivered")))
}
