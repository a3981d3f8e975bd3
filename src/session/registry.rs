//! Session registry - authoritative id -> session mapping

use super::{Session, SessionId};
use crate::error::{GatewayError, Result};
use std::collections::{HashMap, HashSet};

/// Holds every live session plus the ids that have been retired.
///
/// No timers, no notifications: the lifecycle controller owns those.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Live sessions by id
    sessions: HashMap<SessionId, Session>,

    /// Ids that were removed and may not be handed out again
    retired: HashSet<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `Connecting` session
    pub fn create(&mut self, id: SessionId, name: impl Into<String>) -> Result<&Session> {
        if self.sessions.contains_key(&id) || self.retired.contains(&id) {
            return Err(GatewayError::DuplicateSession(id));
        }

        let session = Session::new(id.clone(), name);
        Ok(self.sessions.entry(id).or_insert(session))
    }

    pub fn get(&self, id: &str) -> Result<&Session> {
        self.sessions
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(id.into()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.into()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of all sessions, oldest first
    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        sessions
    }

    /// Delete a session and retire its id
    pub fn remove(&mut self, id: &str) -> Result<Session> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| GatewayError::NotFound(id.into()))?;
        self.retired.insert(session.id().clone());
        Ok(session)
    }

    /// Delete every session, retiring all ids
    pub fn clear(&mut self) -> Vec<Session> {
        let drained: Vec<Session> = self.sessions.drain().map(|(_, s)| s).collect();
        self.retired
            .extend(drained.iter().map(|s| s.id().clone()));
        drained
    }

    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn create_inserts_connecting_session() {
        let mut registry = SessionRegistry::new();
        let session = registry.create("wa_1".into(), "Sales").unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.display_name(), "Sales");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_create_leaves_registry_unchanged() {
        let mut registry = SessionRegistry::new();
        registry.create("dup".into(), "First").unwrap();

        let err = registry.create("dup".into(), "Second").unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateSession(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dup").unwrap().display_name(), "First");
    }

    #[test]
    fn get_and_remove_unknown_report_not_found() {
        let mut registry = SessionRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            registry.remove("missing"),
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn removed_ids_are_never_reused() {
        let mut registry = SessionRegistry::new();
        registry.create("gone".into(), "Temp").unwrap();
        registry.remove("gone").unwrap();

        assert!(registry.is_retired("gone"));
        assert!(matches!(
            registry.create("gone".into(), "Again"),
            Err(GatewayError::DuplicateSession(_))
        ));
    }

    #[test]
    fn names_are_not_deduplicated() {
        let mut registry = SessionRegistry::new();
        registry.create("a".into(), "Support").unwrap();
        registry.create("b".into(), "Support").unwrap();
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn clear_retires_everything() {
        let mut registry = SessionRegistry::new();
        registry.create("a".into(), "A").unwrap();
        registry.create("b".into(), "B").unwrap();

        let drained = registry.clear();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.is_retired("a") && registry.is_retired("b"));
    }
}
