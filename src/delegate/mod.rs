//! Messaging delegate - the external library that performs protocol-level work
//!
//! The lifecycle controller only sees this narrow interface: it initializes a
//! session, consumes the event stream, asks for fresh pairing codes, sends
//! messages and destroys the session.

mod simulated;

pub use simulated::{SentMessage, SimulatedConfig, SimulatedDelegate};

use crate::error::GatewayError;
use crate::session::SessionId;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a delegate implementation
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("Failed to initialize session: {0}")]
    Initialization(String),

    #[error("Unknown delegate handle '{0}'")]
    UnknownHandle(DelegateHandle),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to release session: {0}")]
    Destroy(String),

    #[error("Delegate did not answer within {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque reference to a session inside the delegate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateHandle(String);

impl DelegateHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DelegateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session settings handed to the delegate
#[derive(Debug, Clone)]
pub struct DelegateSessionConfig {
    /// Directory where the delegate may persist auth material
    pub auth_dir: PathBuf,
}

/// Events emitted by the delegate for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEvent {
    /// A pairing payload is ready to be shown as a QR code
    Qr(String),
    /// Pairing completed; carries the bound phone number
    Ready { identity: String },
    /// Credentials accepted
    Authenticated,
    /// Credentials rejected
    AuthFailure(String),
    /// Connection dropped
    Disconnected(String),
    /// Inbound message
    Message { from: String, body: String },
}

/// A session freshly initialized by the delegate
#[derive(Debug)]
pub struct DelegateSession {
    pub handle: DelegateHandle,
    pub events: mpsc::Receiver<DelegateEvent>,
}

/// Acknowledgement for a delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAck {
    pub message_id: String,
}

#[async_trait]
pub trait MessagingDelegate: Send + Sync + 'static {
    async fn initialize_session(
        &self,
        id: &SessionId,
        config: &DelegateSessionConfig,
    ) -> Result<DelegateSession, DelegateError>;

    /// Produce a fresh pairing payload, replacing any previous one
    async fn request_pairing_code(&self, handle: &DelegateHandle) -> Result<String, DelegateError>;

    async fn send_message(
        &self,
        handle: &DelegateHandle,
        address: &str,
        body: &str,
    ) -> Result<MessageAck, DelegateError>;

    async fn destroy(&self, handle: &DelegateHandle) -> Result<(), DelegateError>;
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("static pattern is valid"))
}

/// Normalize a recipient into a chat address.
///
/// Addresses that already contain `@` pass through; phone numbers become
/// `<digits>@c.us`.
pub fn chat_address(to: &str) -> Result<String, GatewayError> {
    let to = to.trim();
    if to.contains('@') {
        return Ok(to.to_string());
    }

    let compact: String = to
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if !phone_pattern().is_match(&compact) {
        return Err(GatewayError::Validation(format!(
            "'{}' is neither a chat address nor a phone number",
            to
        )));
    }

    Ok(format!("{}@c.us", compact.trim_start_matches('+')))
}
