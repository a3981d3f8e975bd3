//! Request and response bodies

use crate::session::{SessionState, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /create`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Caller-chosen id; minted by the server when absent
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub success: bool,
    pub connection_id: String,
    pub message: String,
}

/// `GET /qr/:id` query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QrQuery {
    #[serde(default)]
    pub format: QrFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrFormat {
    /// SVG image as a `data:` URL
    #[default]
    Image,
    /// Raw pairing payload
    Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResponse {
    pub qr_code: String,
}

/// Entry of `GET /connections`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub status: SessionState,
    pub created_at: DateTime<Utc>,
    pub phone_number: Option<String>,
}

impl From<&SessionStatus> for ConnectionSummary {
    fn from(status: &SessionStatus) -> Self {
        Self {
            id: status.connection_id.to_string(),
            name: status.name.clone(),
            status: status.state,
            created_at: status.created_at,
            phone_number: status.phone_number.clone(),
        }
    }
}

/// `GET /status/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connection_id: String,
    pub name: String,
    pub status: SessionState,
    pub phone_number: Option<String>,
    pub has_qr_code: bool,
}

impl From<SessionStatus> for StatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            connection_id: status.connection_id.to_string(),
            name: status.name,
            status: status.state,
            phone_number: status.phone_number,
            has_qr_code: status.has_qr_code,
        }
    }
}

/// `POST /send/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

/// `PATCH /connections/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub name: String,
}

/// `POST /simulate/:id/pair`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    #[serde(default)]
    pub phone_number: String,
}

/// `POST /simulate/:id/lose`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoseRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /simulate/:id/message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
}

/// Generic `{success, message}` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error body: human message plus machine-readable kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
