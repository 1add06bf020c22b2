use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use uuid::Uuid;
use crate::models::user_session::UserSession;

/// A session shared between requests; the mutex serialises turns.
pub type SharedSession = Arc<Mutex<UserSession>>;

/// Registry of live chat sessions, keyed by the id stored in the cookie.
#[derive(Clone, Default)]
pub struct GlobalSessionManager {
    sessions: Arc<Mutex<HashMap<String, SharedSession>>>,
}

impl GlobalSessionManager {
    pub fn new() -> Self {
        GlobalSessionManager::default()
    }

    /// Starts an empty session and returns its id.
    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions()
            .insert(session_id.clone(), Arc::new(Mutex::new(UserSession::new())));
        session_id
    }

    /// Retrieves a session if it exists
    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions().get(session_id).cloned()
    }

    /// Ends a session; its history goes with it.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions().remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SharedSession>> {
        // The map stays consistent even if a holder panicked.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Locks a single session, recovering from a poisoned lock.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, UserSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Locks a session unless a turn is already running on it.
pub fn try_lock_session(session: &SharedSession) -> Option<MutexGuard<'_, UserSession>> {
    match session.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
