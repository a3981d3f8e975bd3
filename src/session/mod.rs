//! Session data model - identifiers, states and invariant-preserving transitions

mod registry;

pub use registry::SessionRegistry;

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Opaque connection identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a caller-supplied identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh identifier of the form `wa_<unix-millis>_<9 alphanumerics>`
    pub fn mint() -> Self {
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(9)
            .collect();
        Self(format!("wa_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session allocated, pairing artifact not produced yet
    Connecting,
    /// A pairing artifact is available for scanning
    AwaitingPairing,
    /// Paired and bound to an identity
    Connected,
    /// Torn down; terminal for this id
    Disconnected,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disconnected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical messaging connection.
///
/// Fields are private so the pairing artifact only exists while awaiting
/// pairing and the identity only while connected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    display_name: String,
    state: SessionState,
    pairing_artifact: Option<String>,
    identity: Option<String>,
    created_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl Session {
    /// Create a session in the `Connecting` state
    pub fn new(id: SessionId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            state: SessionState::Connecting,
            pairing_artifact: None,
            identity: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pairing_artifact(&self) -> Option<&str> {
        self.pairing_artifact.as_deref()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    pub fn rename(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
    }

    /// `Connecting -> AwaitingPairing` with the first artifact
    pub fn begin_pairing(&mut self, artifact: String) -> Result<()> {
        self.expect_state(SessionState::Connecting, "begin pairing")?;
        self.pairing_artifact = Some(artifact);
        self.transition(SessionState::AwaitingPairing);
        Ok(())
    }

    /// `AwaitingPairing -> AwaitingPairing` replacing the artifact
    pub fn renew_pairing(&mut self, artifact: String) -> Result<()> {
        self.expect_state(SessionState::AwaitingPairing, "renew pairing for")?;
        self.pairing_artifact = Some(artifact);
        self.transition(SessionState::AwaitingPairing);
        Ok(())
    }

    /// `AwaitingPairing -> Connected`, clearing the artifact
    pub fn connect(&mut self, identity: String) -> Result<()> {
        self.expect_state(SessionState::AwaitingPairing, "pair")?;
        self.pairing_artifact = None;
        self.identity = Some(identity);
        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Any non-terminal state `-> Disconnected`, clearing artifact and identity
    pub fn disconnect(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid("disconnect"));
        }
        self.pairing_artifact = None;
        self.identity = None;
        self.transition(SessionState::Disconnected);
        Ok(())
    }

    /// Polling snapshot
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connection_id: self.id.clone(),
            name: self.display_name.clone(),
            state: self.state,
            phone_number: self.identity.clone(),
            has_qr_code: self.pairing_artifact.is_some(),
            created_at: self.created_at,
            last_seen_at: self.last_seen_at,
        }
    }

    fn transition(&mut self, to: SessionState) {
        self.state = to;
        self.last_seen_at = Utc::now();
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> GatewayError {
        GatewayError::InvalidTransition {
            id: self.id.clone(),
            from: self.state,
            action,
        }
    }
}

/// Snapshot returned to pollers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub connection_id: SessionId,
    pub name: String,
    pub state: SessionState,
    pub phone_number: Option<String>,
    pub has_qr_code: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(session: &Session) {
        assert_eq!(
            session.pairing_artifact().is_some(),
            session.state() == SessionState::AwaitingPairing
        );
        assert_eq!(
            session.identity().is_some(),
            session.state() == SessionState::Connected
        );
    }

    #[test]
    fn minted_ids_have_expected_shape() {
        let id = SessionId::mint();
        let parts: Vec<&str> = id.as_str().splitn(3, '_').collect();
        assert_eq!(parts[0], "wa");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(SessionId::mint(), SessionId::mint());
    }

    #[test]
    fn full_lifecycle_keeps_invariants() {
        let mut session = Session::new("a".into(), "Sales");
        assert_invariants(&session);

        session.begin_pairing("qr-1".into()).unwrap();
        assert_invariants(&session);

        session.renew_pairing("qr-2".into()).unwrap();
        assert_eq!(session.pairing_artifact(), Some("qr-2"));
        assert_invariants(&session);

        session.connect("+15551234".into()).unwrap();
        assert_invariants(&session);
        assert_eq!(session.identity(), Some("+15551234"));

        session.disconnect().unwrap();
        assert_invariants(&session);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn rejects_pairing_before_artifact() {
        let mut session = Session::new("b".into(), "Support");
        let err = session.connect("+1555".into()).unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn disconnect_is_rejected_once_terminal() {
        let mut session = Session::new("c".into(), "Support");
        session.disconnect().unwrap();
        assert!(matches!(
            session.disconnect(),
            Err(GatewayError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn transitions_advance_last_seen() {
        let mut session = Session::new("d".into(), "Ops");
        let before = session.last_seen_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        session.begin_pairing("qr".into()).unwrap();
        assert!(session.last_seen_at() > before);
        assert_eq!(session.created_at(), before);
    }
}
