//! Lifecycle events and the per-controller observer registry

use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Event kinds observers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Qr,
    Connected,
    Disconnected,
    Removed,
    MessageSent,
    MessageReceived,
    AuthFailure,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Created,
        EventKind::Qr,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Removed,
        EventKind::MessageSent,
        EventKind::MessageReceived,
        EventKind::AuthFailure,
    ];
}

/// Why a session went to `Disconnected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "detail")]
pub enum DisconnectReason {
    /// Explicit disconnect request
    Requested,
    /// The delegate reported the connection lost
    Lost(String),
}

/// Why a session was deleted from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Requested,
    InitializationFailed,
}

/// Notification published by the lifecycle controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum LifecycleEvent {
    Created {
        connection_id: SessionId,
        name: String,
    },
    Qr {
        connection_id: SessionId,
        qr_code: String,
    },
    Connected {
        connection_id: SessionId,
        phone_number: String,
    },
    Disconnected {
        connection_id: SessionId,
        reason: DisconnectReason,
    },
    Removed {
        connection_id: SessionId,
        reason: RemovalReason,
    },
    MessageSent {
        connection_id: SessionId,
        to: String,
        message_id: String,
        timestamp: DateTime<Utc>,
    },
    MessageReceived {
        connection_id: SessionId,
        from: String,
        body: String,
        timestamp: DateTime<Utc>,
    },
    AuthFailure {
        connection_id: SessionId,
        message: String,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::Created { .. } => EventKind::Created,
            LifecycleEvent::Qr { .. } => EventKind::Qr,
            LifecycleEvent::Connected { .. } => EventKind::Connected,
            LifecycleEvent::Disconnected { .. } => EventKind::Disconnected,
            LifecycleEvent::Removed { .. } => EventKind::Removed,
            LifecycleEvent::MessageSent { .. } => EventKind::MessageSent,
            LifecycleEvent::MessageReceived { .. } => EventKind::MessageReceived,
            LifecycleEvent::AuthFailure { .. } => EventKind::AuthFailure,
        }
    }

    pub fn connection_id(&self) -> &SessionId {
        match self {
            LifecycleEvent::Created { connection_id, .. }
            | LifecycleEvent::Qr { connection_id, .. }
            | LifecycleEvent::Connected { connection_id, .. }
            | LifecycleEvent::Disconnected { connection_id, .. }
            | LifecycleEvent::Removed { connection_id, .. }
            | LifecycleEvent::MessageSent { connection_id, .. }
            | LifecycleEvent::MessageReceived { connection_id, .. }
            | LifecycleEvent::AuthFailure { connection_id, .. } => connection_id,
        }
    }
}

type Subscribers = HashMap<EventKind, Vec<mpsc::UnboundedSender<LifecycleEvent>>>;

/// Observer registry keyed by event kind.
///
/// `emit` enqueues to every live subscriber of the event's kind in
/// registration order before returning, so a caller that emits while holding
/// its state lock gets per-session ordering for free.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the given kinds; an empty slice means every kind
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let kinds: HashSet<EventKind> = if kinds.is_empty() {
            EventKind::ALL.into_iter().collect()
        } else {
            kinds.iter().copied().collect()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        for kind in kinds {
            subscribers.entry(kind).or_default().push(tx.clone());
        }

        Subscription { receiver: rx }
    }

    /// Deliver an event to all subscribers of its kind
    pub fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(
            "Emitting {:?} for connection {}",
            event.kind(),
            event.connection_id()
        );

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = subscribers.get_mut(&event.kind()) {
            list.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Number of live subscriptions for a kind
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers
            .get(&kind)
            .map(|list| list.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscription
    pub fn close(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Receiving end of an `EventBus` subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl Subscription {
    /// Wait for the next event; `None` once the bus is closed
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered event, if any
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything delivered so far
    pub fn drain(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
