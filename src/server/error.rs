//! Mapping of domain errors onto HTTP responses

use crate::error::GatewayError;
use crate::protocol::ErrorResponse;
use crate::qr::QrError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Error returned by every handler; renders as `{error, kind}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    /// The connection exists but has no QR code right now
    pub fn qr_unavailable(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "qr_unavailable",
            format!("QR code not available for connection '{}'", id),
        )
    }

    pub fn simulation_disabled() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "simulation_disabled",
            "Simulation routes are disabled",
        )
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::DuplicateSession(_) | GatewayError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::NotConnected(_) | GatewayError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            GatewayError::DelegateFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<QrError> for ApiError {
    fn from(err: QrError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "render", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} ({})", self.message, self.kind);
        } else {
            tracing::debug!("{} ({})", self.message, self.kind);
        }

        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}
