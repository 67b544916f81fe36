//! Session lookup table

use super::worker::SessionCommand;
use crate::error::{PipelineError, PipelineResult};
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::error;

/// Channels and task of one running session worker.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    pub inbox: mpsc::Sender<SessionCommand>,
    pub stop: oneshot::Sender<()>,
    pub task: JoinHandle<()>,
}

impl SessionHandle {
    /// Signal the worker and wait for it to finish.
    pub async fn shutdown(self) {
        let SessionHandle { inbox, stop, task } = self;
        let _ = stop.send(());
        drop(inbox);
        if let Err(e) = task.await {
            error!(error = %e, "Session worker panicked");
        }
    }
}

#[derive(Debug)]
enum SessionSlot {
    Active(SessionHandle),
    /// Tombstone kept so late callers get "stopped" instead of "unknown"
    Stopped { at: Instant },
}

/// Maps session ids to their workers.
///
/// Only channel handles live here; session state itself is owned by the
/// worker task. The lock is never held across an await.
#[derive(Debug)]
pub(crate) struct SessionRegistry {
    slots: RwLock<HashMap<SessionId, SessionSlot>>,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn insert(&self, session_id: SessionId, handle: SessionHandle) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let retention = self.retention;
        slots.retain(|_, slot| match slot {
            SessionSlot::Stopped { at } => at.elapsed() < retention,
            SessionSlot::Active(_) => true,
        });
        slots.insert(session_id, SessionSlot::Active(handle));
    }

    /// Inbox of an active session
    pub fn inbox(&self, session_id: &SessionId) -> PipelineResult<mpsc::Sender<SessionCommand>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        match slots.get(session_id) {
            Some(SessionSlot::Active(handle)) => Ok(handle.inbox.clone()),
            Some(SessionSlot::Stopped { .. }) => Err(PipelineError::stopped_session(session_id)),
            None => Err(PipelineError::unknown_session(session_id)),
        }
    }

    /// Tombstone an active session and hand back its handle.
    ///
    /// `Ok(None)` means the session was already stopped.
    pub fn begin_stop(&self, session_id: &SessionId) -> PipelineResult<Option<SessionHandle>> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match slots.get(session_id) {
            None => Err(PipelineError::unknown_session(session_id)),
            Some(SessionSlot::Stopped { .. }) => Ok(None),
            Some(SessionSlot::Active(_)) => {
                let previous = slots.insert(
                    session_id.clone(),
                    SessionSlot::Stopped { at: Instant::now() },
                );
                Ok(match previous {
                    Some(SessionSlot::Active(handle)) => Some(handle),
                    _ => None,
                })
            }
        }
    }

    /// Tombstone a session whose worker ended on its own.
    pub fn mark_stopped(&self, session_id: &SessionId) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(session_id) {
            if matches!(slot, SessionSlot::Active(_)) {
                *slot = SessionSlot::Stopped { at: Instant::now() };
            }
        }
    }

    /// Tombstone every active session, returning their handles.
    pub fn drain_active(&self) -> Vec<SessionHandle> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let active: Vec<SessionId> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, SessionSlot::Active(_)))
            .map(|(id, _)| id.clone())
            .collect();

        let now = Instant::now();
        active
            .into_iter()
            .filter_map(|id| match slots.insert(id, SessionSlot::Stopped { at: now }) {
                Some(SessionSlot::Active(handle)) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| matches!(slot, SessionSlot::Active(_)))
            .count()
    }

    #[cfg(test)]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_handle() -> (SessionHandle, oneshot::Receiver<()>) {
        let (inbox, _inbox_rx) = mpsc::channel(1);
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(async {});
        (SessionHandle { inbox, stop, task }, stop_rx)
    }

    #[tokio::test]
    async fn test_stop_leaves_tombstone() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let id = SessionId::from("a");
        let (handle, stop_rx) = idle_handle();
        registry.insert(id.clone(), handle);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.inbox(&id).is_ok());

        let handle = registry.begin_stop(&id).unwrap().unwrap();
        handle.shutdown().await;
        assert!(stop_rx.await.is_ok());

        assert_eq!(registry.active_count(), 0);
        assert!(registry.begin_stop(&id).unwrap().is_none());
        assert_eq!(
            registry.inbox(&id).unwrap_err(),
            PipelineError::stopped_session(&id)
        );
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let id = SessionId::from("missing");
        assert_eq!(
            registry.begin_stop(&id).unwrap_err(),
            PipelineError::unknown_session(&id)
        );
        assert_eq!(
            registry.inbox(&id).unwrap_err(),
            PipelineError::unknown_session(&id)
        );
    }

    #[tokio::test]
    async fn test_expired_tombstones_pruned() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let old = SessionId::from("old");
        let (handle, _stop_rx) = idle_handle();
        registry.insert(old.clone(), handle);
        registry.mark_stopped(&old);
        assert!(registry.contains(&old));

        let (handle, _stop_rx) = idle_handle();
        registry.insert(SessionId::from("new"), handle);
        assert!(!registry.contains(&old));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_active() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        for name in ["a", "b", "c"] {
            let (handle, _stop_rx) = idle_handle();
            registry.insert(SessionId::from(name), handle);
        }
        registry.mark_stopped(&SessionId::from("b"));

        let drained = registry.drain_active();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.active_count(), 0);
    }
}
