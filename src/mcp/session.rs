use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Sessions unused for this long are forgotten; the client must `initialize` again.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Session {
    user_id: String,
    last_seen: Instant,
}

/// MCP session ids handed out by `initialize`, each owned by one user.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    idle_ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_idle_ttl(SESSION_IDLE_TTL)
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a session for a user. Returns the session id. Idle sessions are
    /// swept here, so the map stays bounded by recent activity.
    pub fn create_session(&self, user_id: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut sessions = self.lock();
        sessions.retain(|_, s| now.duration_since(s.last_seen) < self.idle_ttl);
        sessions.insert(
            session_id.clone(),
            Session {
                user_id: user_id.to_string(),
                last_seen: now,
            },
        );
        session_id
    }

    /// True when the session is live and belongs to the user. A hit counts as activity.
    pub fn is_owned_by(&self, session_id: &str, user_id: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return false;
        };
        if now.duration_since(session.last_seen) >= self.idle_ttl {
            sessions.remove(session_id);
            return false;
        }
        if session.user_id != user_id {
            return false;
        }
        session.last_seen = now;
        true
    }

    /// End a user's session. Returns false when there was nothing to end.
    pub fn remove_session(&self, session_id: &str, user_id: &str) -> bool {
        let mut sessions = self.lock();
        if sessions.get(session_id).is_some_and(|s| s.user_id == user_id) {
            sessions.remove(session_id);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_check_session() {
        let mgr = SessionManager::new();
        let sid = mgr.create_session("user-123");
        assert!(mgr.is_owned_by(&sid, "user-123"));
        assert!(!mgr.is_owned_by(&sid, "user-456"));
        // A foreign lookup does not end the owner's session.
        assert!(mgr.is_owned_by(&sid, "user-123"));
    }

    #[test]
    fn test_remove_session() {
        let mgr = SessionManager::new();
        let sid = mgr.create_session("user-123");
        assert!(!mgr.remove_session(&sid, "user-456"));
        assert!(mgr.remove_session(&sid, "user-123"));
        assert!(!mgr.is_owned_by(&sid, "user-123"));
        assert!(!mgr.remove_session(&sid, "user-123"));
    }

    #[test]
    fn test_unknown_session() {
        let mgr = SessionManager::new();
        assert!(!mgr.is_owned_by("nonexistent", "user-123"));
    }

    #[test]
    fn test_idle_session_expires() {
        let mgr = SessionManager::with_idle_ttl(Duration::ZERO);
        let sid = mgr.create_session("user-123");
        assert!(!mgr.is_owned_by(&sid, "user-123"));
        assert_eq!(mgr.len(), 0);
    }

    #[test]
    fn test_idle_sessions_swept_on_create() {
        let mgr = SessionManager::with_idle_ttl(Duration::ZERO);
        for _ in 0..5 {
            mgr.create_session("user-123");
        }
        // Only the session just created survives each sweep.
        assert_eq!(mgr.len(), 1);
    }
}
