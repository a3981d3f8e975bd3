//! Lifecycle controller - owns every session transition and timer

use super::events::{DisconnectReason, EventBus, EventKind, LifecycleEvent, RemovalReason, Subscription};
use super::LifecycleConfig;
use crate::delegate::{
    chat_address, DelegateError, DelegateEvent, DelegateHandle, DelegateSession,
    DelegateSessionConfig, MessageAck, MessagingDelegate,
};
use crate::error::{GatewayError, Result};
use crate::session::{Session, SessionId, SessionRegistry, SessionState, SessionStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Background work attached to one session
#[derive(Default)]
struct SessionRuntime {
    /// Delegate handle once initialization finished
    handle: Option<DelegateHandle>,

    /// Task forwarding delegate events into the controller
    pump: Option<JoinHandle<()>>,

    /// Pairing artifact expiry timer
    renewal: Option<JoinHandle<()>>,

    /// Bumped whenever the renewal timer is cancelled; a timer only acts
    /// while its epoch is current
    epoch: u64,
}

impl SessionRuntime {
    fn cancel_renewal(&mut self) {
        if let Some(timer) = self.renewal.take() {
            timer.abort();
        }
        self.epoch += 1;
    }

    fn cancel_all(&mut self) {
        self.cancel_renewal();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

struct ControllerState {
    registry: SessionRegistry,
    runtimes: HashMap<SessionId, SessionRuntime>,
    shut_down: bool,
}

impl ControllerState {
    fn ensure_running(&self) -> Result<()> {
        if self.shut_down {
            return Err(GatewayError::ShutDown);
        }
        Ok(())
    }
}

/// Drives sessions through
/// `Connecting -> AwaitingPairing -> Connected -> Disconnected`.
///
/// Cheap to clone; clones share the same registry, timers and event bus.
#[derive(Clone)]
pub struct LifecycleController {
    state: Arc<RwLock<ControllerState>>,
    delegate: Arc<dyn MessagingDelegate>,
    events: EventBus,
    config: Arc<LifecycleConfig>,
}

impl LifecycleController {
    pub fn new(config: LifecycleConfig, delegate: Arc<dyn MessagingDelegate>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ControllerState {
                registry: SessionRegistry::new(),
                runtimes: HashMap::new(),
                shut_down: false,
            })),
            delegate,
            events: EventBus::new(),
            config: Arc::new(config),
        }
    }

    /// Subscribe to lifecycle events of the given kinds (all kinds if empty)
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        self.events.subscribe(kinds)
    }

    /// Create a connection under a freshly minted id
    pub async fn create_connection(&self, name: &str) -> Result<SessionId> {
        self.create_connection_with_id(SessionId::mint(), name)
            .await
    }

    /// Create a connection under a caller-supplied id and start pairing
    pub async fn create_connection_with_id(&self, id: SessionId, name: &str) -> Result<SessionId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("name is required".to_string()));
        }
        if id.as_str().trim().is_empty() {
            return Err(GatewayError::Validation(
                "connectionId must not be empty".to_string(),
            ));
        }

        {
            let mut state = self.state.write().await;
            state.ensure_running()?;

            state.registry.create(id.clone(), name)?;
            state
                .runtimes
                .insert(id.clone(), SessionRuntime::default());

            tracing::info!("Created connection '{}' ({})", id, name);
            self.events.emit(LifecycleEvent::Created {
                connection_id: id.clone(),
                name: name.to_string(),
            });
        }

        tokio::spawn(self.clone().initialize(id.clone()));

        Ok(id)
    }

    /// Current pairing artifact; `None` unless awaiting pairing
    pub async fn get_pairing_artifact(&self, id: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        let session = state.registry.get(id)?;
        Ok(session.pairing_artifact().map(str::to_owned))
    }

    /// Polling snapshot for one connection
    pub async fn get_status(&self, id: &str) -> Result<SessionStatus> {
        let state = self.state.read().await;
        Ok(state.registry.get(id)?.status())
    }

    /// Full session snapshot
    pub async fn session(&self, id: &str) -> Result<Session> {
        let state = self.state.read().await;
        state.registry.get(id).cloned()
    }

    /// Snapshot of every connection, oldest first
    pub async fn list(&self) -> Vec<SessionStatus> {
        let state = self.state.read().await;
        state.registry.list().iter().map(Session::status).collect()
    }

    /// External "paired" signal.
    ///
    /// Returns `true` only when the session actually transitioned. Signals for
    /// removed sessions are dropped; repeats with the same identity are no-ops.
    pub async fn mark_paired(&self, id: &str, identity: impl Into<String>) -> bool {
        let identity = identity.into();
        let mut state = self.state.write().await;
        if state.shut_down {
            tracing::debug!("Dropping pairing signal for '{}' after shutdown", id);
            return false;
        }
        let ControllerState {
            registry, runtimes, ..
        } = &mut *state;

        let Ok(session) = registry.get_mut(id) else {
            tracing::debug!("Dropping pairing signal for unknown connection '{}'", id);
            return false;
        };

        match session.state() {
            SessionState::AwaitingPairing => {
                if let Err(e) = session.connect(identity.clone()) {
                    tracing::warn!("{}", e);
                    return false;
                }
                if let Some(runtime) = runtimes.get_mut(id) {
                    runtime.cancel_renewal();
                }

                tracing::info!("Connection '{}' paired with {}", id, identity);
                self.events.emit(LifecycleEvent::Connected {
                    connection_id: session.id().clone(),
                    phone_number: identity,
                });
                true
            }
            SessionState::Connected if session.identity() == Some(identity.as_str()) => {
                tracing::debug!("Connection '{}' already paired with {}", id, identity);
                false
            }
            other => {
                tracing::warn!(
                    "Ignoring pairing signal for connection '{}' while it is {}",
                    id,
                    other
                );
                false
            }
        }
    }

    /// Explicit disconnect from any non-terminal state
    pub async fn disconnect(&self, id: &str) -> Result<()> {
        let handle = {
            let mut state = self.state.write().await;
            state.ensure_running()?;
            let ControllerState {
                registry, runtimes, ..
            } = &mut *state;

            let session = registry.get_mut(id)?;
            if let Err(e) = session.disconnect() {
                tracing::warn!("{}", e);
                return Err(e);
            }

            let handle = runtimes.get_mut(id).and_then(|runtime| {
                runtime.cancel_all();
                runtime.handle.take()
            });

            tracing::info!("Connection '{}' disconnected", id);
            self.events.emit(LifecycleEvent::Disconnected {
                connection_id: session.id().clone(),
                reason: DisconnectReason::Requested,
            });
            handle
        };

        if let Some(handle) = handle {
            self.delegate.destroy(&handle).await.map_err(|e| {
                tracing::error!("Failed to destroy delegate session for '{}': {}", id, e);
                GatewayError::from(e)
            })?;
        }

        Ok(())
    }

    /// External "lost" signal; ignored for unknown or already terminal sessions
    pub async fn connection_lost(&self, id: &str, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let handle = {
            let mut state = self.state.write().await;
            if state.shut_down {
                tracing::debug!("Dropping loss signal for '{}' after shutdown", id);
                return false;
            }
            let ControllerState {
                registry, runtimes, ..
            } = &mut *state;

            let Ok(session) = registry.get_mut(id) else {
                tracing::debug!("Dropping loss signal for unknown connection '{}'", id);
                return false;
            };
            if session.disconnect().is_err() {
                tracing::debug!("Connection '{}' already disconnected", id);
                return false;
            }

            let handle = runtimes.get_mut(id).and_then(|runtime| {
                runtime.cancel_renewal();
                runtime.handle.take()
            });

            tracing::warn!("Connection '{}' lost: {}", id, reason);
            self.events.emit(LifecycleEvent::Disconnected {
                connection_id: session.id().clone(),
                reason: DisconnectReason::Lost(reason),
            });
            handle
        };

        if let Some(handle) = handle {
            if let Err(e) = self.delegate.destroy(&handle).await {
                tracing::debug!("Delegate cleanup after loss of '{}' failed: {}", id, e);
            }
        }

        true
    }

    /// Delete a session in any state, cancelling its timers
    pub async fn remove(&self, id: &str) -> Result<()> {
        let handle = {
            let mut state = self.state.write().await;
            state.ensure_running()?;
            let session = state.registry.remove(id)?;
            let handle = state.runtimes.remove(id).and_then(|mut runtime| {
                runtime.cancel_all();
                runtime.handle.take()
            });

            tracing::info!("Removed connection '{}'", id);
            self.events.emit(LifecycleEvent::Removed {
                connection_id: session.id().clone(),
                reason: RemovalReason::Requested,
            });
            handle
        };

        if let Some(handle) = handle {
            if let Err(e) = self.delegate.destroy(&handle).await {
                tracing::warn!("Failed to destroy delegate session for '{}': {}", id, e);
            }
        }

        Ok(())
    }

    /// Send a message through a connected session
    pub async fn send(&self, id: &str, to: &str, body: &str) -> Result<MessageAck> {
        if body.trim().is_empty() {
            return Err(GatewayError::Validation("message is required".to_string()));
        }
        let address = chat_address(to)?;

        let (connection_id, handle) = {
            let state = self.state.read().await;
            state.ensure_running()?;
            let session = state.registry.get(id)?;
            if session.state() != SessionState::Connected {
                return Err(GatewayError::NotConnected(session.id().clone()));
            }
            let handle = state
                .runtimes
                .get(id)
                .and_then(|runtime| runtime.handle.clone())
                .ok_or_else(|| GatewayError::NotConnected(session.id().clone()))?;
            (session.id().clone(), handle)
        };

        let timeout = self.config.send_timeout;
        let ack = tokio::time::timeout(
            timeout,
            self.delegate.send_message(&handle, &address, body),
        )
        .await
        .map_err(|_| DelegateError::Timeout(timeout))??;

        tracing::info!("Message {} sent from '{}' to {}", ack.message_id, id, address);
        self.events.emit(LifecycleEvent::MessageSent {
            connection_id,
            to: address,
            message_id: ack.message_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(ack)
    }

    /// Replace the pairing artifact now and restart its expiry timer
    pub async fn refresh_pairing(&self, id: &str) -> Result<()> {
        let handle = {
            let state = self.state.read().await;
            state.ensure_running()?;
            let session = state.registry.get(id)?;
            state
                .runtimes
                .get(id)
                .and_then(|runtime| runtime.handle.clone())
                .filter(|_| session.state() == SessionState::AwaitingPairing)
                .ok_or_else(|| refresh_rejected(session))?
        };

        let payload = self.delegate.request_pairing_code(&handle).await?;

        let mut state = self.state.write().await;
        state.ensure_running()?;
        if self.apply_artifact(&mut state, id, payload, None) {
            return Ok(());
        }
        let session = state.registry.get(id)?;
        Err(refresh_rejected(session))
    }

    /// Change the display name
    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("name is required".to_string()));
        }

        let mut state = self.state.write().await;
        state.ensure_running()?;
        state.registry.get_mut(id)?.rename(name);
        tracing::info!("Renamed connection '{}' to {}", id, name);
        Ok(())
    }

    /// Cancel every timer, release every delegate session and empty the registry
    pub async fn shutdown(&self) {
        let handles: Vec<DelegateHandle> = {
            let mut state = self.state.write().await;
            if state.shut_down {
                return;
            }
            state.shut_down = true;

            let handles = state
                .runtimes
                .drain()
                .filter_map(|(_, mut runtime)| {
                    runtime.cancel_all();
                    runtime.handle.take()
                })
                .collect();
            let released = state.registry.clear();
            tracing::info!(
                "Lifecycle controller shut down, released {} connection(s)",
                released.len()
            );
            handles
        };

        for handle in handles {
            if let Err(e) = self.delegate.destroy(&handle).await {
                tracing::warn!("Failed to destroy delegate session {}: {}", handle, e);
            }
        }

        self.events.close();
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.read().await.shut_down
    }

    /// Ask the delegate for a session and wire up its event stream.
    ///
    /// On failure the half-created session is rolled back.
    async fn initialize(self, id: SessionId) {
        let config = DelegateSessionConfig {
            auth_dir: self.config.sessions_dir.join(id.as_str()),
        };

        match self.delegate.initialize_session(&id, &config).await {
            Ok(DelegateSession { handle, events }) => {
                let mut state = self.state.write().await;
                let ControllerState {
                    registry, runtimes, ..
                } = &mut *state;

                let alive = registry
                    .get(id.as_str())
                    .map(|session| !session.state().is_terminal())
                    .unwrap_or(false);

                if let Some(runtime) = runtimes.get_mut(&id).filter(|_| alive) {
                    tracing::debug!("Delegate session {} attached to '{}'", handle, id);
                    runtime.pump = Some(self.spawn_pump(id.clone(), events));
                    runtime.handle = Some(handle);
                    return;
                }
                drop(state);

                tracing::debug!(
                    "Connection '{}' went away during initialization, releasing {}",
                    id,
                    handle
                );
                if let Err(e) = self.delegate.destroy(&handle).await {
                    tracing::warn!("Failed to release delegate session {}: {}", handle, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to initialize connection '{}': {}", id, e);
                let mut state = self.state.write().await;
                if state.registry.remove(id.as_str()).is_ok() {
                    if let Some(mut runtime) = state.runtimes.remove(&id) {
                        runtime.cancel_all();
                    }
                    self.events.emit(LifecycleEvent::Removed {
                        connection_id: id,
                        reason: RemovalReason::InitializationFailed,
                    });
                }
            }
        }
    }

    fn spawn_pump(&self, id: SessionId, mut events: mpsc::Receiver<DelegateEvent>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_delegate_event(&id, event).await;
            }
            tracing::debug!("Delegate event stream for '{}' closed", id);
        })
    }

    async fn handle_delegate_event(&self, id: &SessionId, event: DelegateEvent) {
        match event {
            DelegateEvent::Qr(payload) => {
                tracing::info!("Pairing code generated for '{}'", id);
                let mut state = self.state.write().await;
                self.apply_artifact(&mut state, id.as_str(), payload, None);
            }
            DelegateEvent::Ready { identity } => {
                self.mark_paired(id.as_str(), identity).await;
            }
            DelegateEvent::Authenticated => {
                tracing::info!("Connection '{}' authenticated", id);
            }
            DelegateEvent::AuthFailure(message) => {
                tracing::error!("Authentication failed for '{}': {}", id, message);
                self.events.emit(LifecycleEvent::AuthFailure {
                    connection_id: id.clone(),
                    message,
                });
            }
            DelegateEvent::Disconnected(reason) => {
                self.connection_lost(id.as_str(), reason).await;
            }
            DelegateEvent::Message { from, body } => {
                tracing::info!("Message received on '{}' from {}", id, from);
                self.events.emit(LifecycleEvent::MessageReceived {
                    connection_id: id.clone(),
                    from,
                    body,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Install a pairing artifact.
    ///
    /// `epoch` is `Some` when the renewal timer produced the artifact; the
    /// artifact is then only accepted while that timer is still current.
    /// Artifacts from any other source restart the expiry timer.
    fn apply_artifact(
        &self,
        state: &mut ControllerState,
        id: &str,
        payload: String,
        epoch: Option<u64>,
    ) -> bool {
        let ControllerState {
            registry, runtimes, ..
        } = state;

        let (Ok(session), Some(runtime)) = (registry.get_mut(id), runtimes.get_mut(id)) else {
            tracing::debug!("Dropping pairing artifact for unknown connection '{}'", id);
            return false;
        };

        if epoch.is_some_and(|epoch| epoch != runtime.epoch) {
            tracing::debug!("Dropping stale pairing artifact for '{}'", id);
            return false;
        }

        let applied = match session.state() {
            SessionState::Connecting => session.begin_pairing(payload.clone()),
            SessionState::AwaitingPairing => session.renew_pairing(payload.clone()),
            other => {
                tracing::debug!(
                    "Ignoring pairing artifact for '{}' while it is {}",
                    id,
                    other
                );
                return false;
            }
        };
        if let Err(e) = applied {
            tracing::warn!("{}", e);
            return false;
        }

        if epoch.is_none() {
            runtime.cancel_renewal();
            runtime.renewal = Some(self.spawn_renewal(session.id().clone(), runtime.epoch));
        }

        self.events.emit(LifecycleEvent::Qr {
            connection_id: session.id().clone(),
            qr_code: payload,
        });
        true
    }

    fn spawn_renewal(&self, id: SessionId, epoch: u64) -> JoinHandle<()> {
        let controller = self.clone();
        let interval = self.config.renewal_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let handle = {
                    let state = controller.state.read().await;
                    match (state.registry.get(id.as_str()), state.runtimes.get(&id)) {
                        (Ok(session), Some(runtime))
                            if session.state() == SessionState::AwaitingPairing
                                && runtime.epoch == epoch =>
                        {
                            runtime.handle.clone()
                        }
                        _ => None,
                    }
                };
                let Some(handle) = handle else {
                    break;
                };

                match controller.delegate.request_pairing_code(&handle).await {
                    Ok(payload) => {
                        tracing::debug!("Pairing code for '{}' expired, renewed", id);
                        let mut state = controller.state.write().await;
                        if !controller.apply_artifact(&mut state, id.as_str(), payload, Some(epoch)) {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to renew pairing code for '{}': {}", id, e);
                    }
                }
            }
            tracing::debug!("Pairing renewal for '{}' stopped", id);
        })
    }
}

fn refresh_rejected(session: &Session) -> GatewayError {
    GatewayError::InvalidTransition {
        id: session.id().clone(),
        from: session.state(),
        action: "refresh pairing for",
    }
}
