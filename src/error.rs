//! Error taxonomy for session lifecycle operations

use crate::delegate::DelegateError;
use crate::session::{SessionId, SessionState};
use thiserror::Error;

/// Errors surfaced by the registry and the lifecycle controller
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Connection '{0}' not found")]
    NotFound(SessionId),

    #[error("Connection '{0}' already exists")]
    DuplicateSession(SessionId),

    #[error("Connection '{0}' is not connected")]
    NotConnected(SessionId),

    #[error("Cannot {action} connection '{id}' while it is {from}")]
    InvalidTransition {
        id: SessionId,
        from: SessionState,
        action: &'static str,
    },

    #[error("Messaging delegate failed: {0}")]
    DelegateFailure(#[from] DelegateError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Lifecycle controller has been shut down")]
    ShutDown,
}

impl GatewayError {
    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "not_found",
            GatewayError::DuplicateSession(_) => "duplicate_session",
            GatewayError::NotConnected(_) => "not_connected",
            GatewayError::InvalidTransition { .. } => "invalid_transition",
            GatewayError::DelegateFailure(_) => "delegate_failure",
            GatewayError::Validation(_) => "validation",
            GatewayError::ShutDown => "shut_down",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
