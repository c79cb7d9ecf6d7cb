use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::model::ReviewForm;

const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// One logged-in reviewer and their current form draft.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub expires_at: SystemTime,
    pub draft: ReviewForm,
}

/// In-memory session map keyed by the cookie value. Sessions expire after
/// 24h and are pruned lazily on access.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, user: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session {
            user: user.to_string(),
            expires_at: SystemTime::now() + SESSION_DURATION,
            draft: ReviewForm::default(),
        };
        let mut sessions = self.inner.write().unwrap();
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(id.clone(), session);
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.inner.write().unwrap();
        match sessions.get(id) {
            Some(session) if session.expires_at > SystemTime::now() => Some(session.clone()),
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn set_draft(&self, id: &str, draft: ReviewForm) {
        if let Some(session) = self.inner.write().unwrap().get_mut(id) {
            session.draft = draft;
        }
    }

    pub fn remove(&self, id: &str) {
        self.inner.write().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new();
        let id = store.create("pedrina_freitas");
        let session = store.get(&id).unwrap();
        assert_eq!(session.user, "pedrina_freitas");
        assert!(session.draft.sectors.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        let store = SessionStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_expired_session_rejected() {
        let store = SessionStore::new();
        let id = store.create("joao");
        {
            let mut sessions = store.inner.write().unwrap();
            sessions.get_mut(&id).unwrap().expires_at =
                SystemTime::now() - Duration::from_secs(1);
        }
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_expired_session_pruned_on_get() {
        let store = SessionStore::new();
        let id = store.create("joao");
        {
            let mut sessions = store.inner.write().unwrap();
            sessions.get_mut(&id).unwrap().expires_at =
                SystemTime::now() - Duration::from_secs(1);
        }
        assert!(store.get(&id).is_none());
        assert!(!store.inner.read().unwrap().contains_key(&id));
    }

    #[test]
    fn test_set_draft_persists() {
        let store = SessionStore::new();
        let id = store.create("joao");
        let mut draft = ReviewForm::default();
        draft.select_sectors(&["Financeiro".to_string()]);
        store.set_draft(&id, draft);
        assert_eq!(store.get(&id).unwrap().draft.sectors.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new();
        let id = store.create("joao");
        store.remove(&id);
        assert!(store.get(&id).is_none());
    }
}
