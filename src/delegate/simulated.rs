//! In-memory delegate that simulates the pairing lifecycle for demos and tests

use super::{
    DelegateError, DelegateEvent, DelegateHandle, DelegateSession, DelegateSessionConfig,
    MessageAck, MessagingDelegate,
};
use crate::session::SessionId;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Knobs for the simulation
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Delay before the first QR payload is emitted
    pub qr_delay: Duration,

    /// Artificial latency added to every send
    pub send_latency: Option<Duration>,

    /// Make `initialize_session` fail
    pub fail_initialization: bool,

    /// Make `send_message` fail
    pub fail_sends: bool,

    /// Make `destroy` fail; the session is kept
    pub fail_destroy: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            qr_delay: Duration::from_millis(1000),
            send_latency: None,
            fail_initialization: false,
            fail_sends: false,
            fail_destroy: false,
        }
    }
}

/// A message recorded by the simulated delegate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub session_id: SessionId,
    pub address: String,
    pub body: String,
    pub message_id: String,
    pub sent_at: DateTime<Utc>,
}

struct SimulatedSession {
    session_id: SessionId,
    events: mpsc::Sender<DelegateEvent>,
    qr_task: JoinHandle<()>,
}

/// Delegate that never touches the network
pub struct SimulatedDelegate {
    config: SimulatedConfig,
    sessions: Mutex<HashMap<DelegateHandle, SimulatedSession>>,
    sent: Mutex<Vec<SentMessage>>,
    next_message: AtomicU64,
}

impl SimulatedDelegate {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            next_message: AtomicU64::new(1),
        }
    }

    /// Simulate the phone scanning the QR code
    pub async fn simulate_pairing(
        &self,
        id: &SessionId,
        identity: impl Into<String>,
    ) -> Result<(), DelegateError> {
        let events = self.sender_for(id)?;
        let _ = events.send(DelegateEvent::Authenticated).await;
        events
            .send(DelegateEvent::Ready {
                identity: identity.into(),
            })
            .await
            .map_err(|_| DelegateError::UnknownHandle(DelegateHandle::new(id.as_str())))
    }

    /// Simulate the remote side dropping the connection
    pub async fn simulate_loss(
        &self,
        id: &SessionId,
        reason: impl Into<String>,
    ) -> Result<(), DelegateError> {
        let events = self.sender_for(id)?;
        events
            .send(DelegateEvent::Disconnected(reason.into()))
            .await
            .map_err(|_| DelegateError::UnknownHandle(DelegateHandle::new(id.as_str())))
    }

    /// Simulate an inbound message
    pub async fn simulate_incoming(
        &self,
        id: &SessionId,
        from: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<(), DelegateError> {
        let events = self.sender_for(id)?;
        events
            .send(DelegateEvent::Message {
                from: from.into(),
                body: body.into(),
            })
            .await
            .map_err(|_| DelegateError::UnknownHandle(DelegateHandle::new(id.as_str())))
    }

    /// Messages sent so far, oldest first
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of sessions the delegate still holds
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn sender_for(&self, id: &SessionId) -> Result<mpsc::Sender<DelegateEvent>, DelegateError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .values()
            .find(|s| &s.session_id == id)
            .map(|s| s.events.clone())
            .ok_or_else(|| DelegateError::UnknownHandle(DelegateHandle::new(id.as_str())))
    }
}

impl Default for SimulatedDelegate {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

/// Payload shaped like the ones WhatsApp Web encodes in its QR codes
fn pairing_payload() -> String {
    format!(
        "2@{},{}",
        Uuid::new_v4().simple(),
        STANDARD.encode(Uuid::new_v4().as_bytes())
    )
}

#[async_trait]
impl MessagingDelegate for SimulatedDelegate {
    async fn initialize_session(
        &self,
        id: &SessionId,
        config: &DelegateSessionConfig,
    ) -> Result<DelegateSession, DelegateError> {
        if self.config.fail_initialization {
            return Err(DelegateError::Initialization(format!(
                "simulated failure for '{}'",
                id
            )));
        }

        tokio::fs::create_dir_all(&config.auth_dir).await?;

        let handle = DelegateHandle::new(format!("sim-{}", Uuid::new_v4().simple()));
        let (tx, rx) = mpsc::channel(64);

        let qr_tx = tx.clone();
        let qr_delay = self.config.qr_delay;
        let qr_task = tokio::spawn(async move {
            tokio::time::sleep(qr_delay).await;
            let _ = qr_tx.send(DelegateEvent::Qr(pairing_payload())).await;
        });

        tracing::debug!("Simulated session {} initialized for '{}'", handle, id);

        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                handle.clone(),
                SimulatedSession {
                    session_id: id.clone(),
                    events: tx,
                    qr_task,
                },
            );

        Ok(DelegateSession { handle, events: rx })
    }

    async fn request_pairing_code(&self, handle: &DelegateHandle) -> Result<String, DelegateError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if !sessions.contains_key(handle) {
            return Err(DelegateError::UnknownHandle(handle.clone()));
        }
        Ok(pairing_payload())
    }

    async fn send_message(
        &self,
        handle: &DelegateHandle,
        address: &str,
        body: &str,
    ) -> Result<MessageAck, DelegateError> {
        let session_id = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions
                .get(handle)
                .map(|s| s.session_id.clone())
                .ok_or_else(|| DelegateError::UnknownHandle(handle.clone()))?
        };

        if let Some(latency) = self.config.send_latency {
            tokio::time::sleep(latency).await;
        }

        if self.config.fail_sends {
            return Err(DelegateError::Send(format!(
                "simulated failure sending to {}",
                address
            )));
        }

        let message_id = format!("sim_{}", self.next_message.fetch_add(1, Ordering::Relaxed));
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                session_id,
                address: address.to_string(),
                body: body.to_string(),
                message_id: message_id.clone(),
                sent_at: Utc::now(),
            });

        Ok(MessageAck { message_id })
    }

    async fn destroy(&self, handle: &DelegateHandle) -> Result<(), DelegateError> {
        if self.config.fail_destroy {
            return Err(DelegateError::Destroy(format!(
                "simulated failure releasing {}",
                handle
            )));
        }

        let session = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle)
            .ok_or_else(|| DelegateError::UnknownHandle(handle.clone()))?;

        session.qr_task.abort();
        tracing::debug!("Simulated session {} destroyed", handle);
        Ok(())
    }
}
