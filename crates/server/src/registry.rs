//! Session Registry (C9): tracks every live [`Session`] by id so the
//! WebSocket handler can hand off a disconnected socket's session for
//! teardown and an operator surface could, in principle, enumerate them.

use dashmap::DashMap;

use crate::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.id().to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Atomically evicts the session and stops it (§4.9): callers never need
    /// to call `Session::stop` themselves before removing. `stop` is
    /// idempotent, so a session already stopped by its own peer-connection
    /// watcher is stopped again here at no cost.
    pub async fn remove(&self, id: &str, reason: &str) -> Option<Session> {
        let session = self.sessions.remove(id).map(|(_, session)| session);
        if let Some(session) = &session {
            session.stop(reason).await;
        }
        session
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stops every live session concurrently, used at shutdown.
    pub async fn stop_all(&self, reason: &str) {
        let sessions: Vec<Session> = self.sessions.iter().map(|entry| entry.value().clone()).collect();
        futures::future::join_all(sessions.iter().map(|s| s.stop(reason))).await;
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stt_gateway_config::Settings;
    use stt_gateway_persistence::InMemoryTranscriptStore;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn new_session() -> Session {
        let (tx, _rx) = mpsc::unbounded_channel();
        Session::new(
            Arc::new(Settings::default()),
            Arc::new(InMemoryTranscriptStore::new()),
            Arc::new(|| unreachable!()),
            tx,
        )
    }

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let registry = SessionRegistry::new();
        let session = new_session();
        let id = session.id().to_string();
        registry.insert(session);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id, "test").await.is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remove_stops_the_session() {
        let registry = SessionRegistry::new();
        let session = new_session();
        let id = session.id().to_string();
        registry.insert(session);

        let removed = registry.remove(&id, "test").await.unwrap();
        assert_eq!(removed.state(), crate::session::SignalingState::Closed);
    }

    #[tokio::test]
    async fn stop_all_empties_the_registry() {
        let registry = SessionRegistry::new();
        registry.insert(new_session());
        registry.insert(new_session());
        registry.stop_all("shutdown").await;
        assert!(registry.is_empty());
    }
}
