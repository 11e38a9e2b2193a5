use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use shared::{domain::UserId, protocol::UserSummary};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::{error::SessionStoreError, navigation::Route};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserSummary,
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, SessionStoreError>;
    fn save(&self, session: &Session) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take();
        Ok(())
    }
}

/// Persists the session as a JSON document.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let encoded = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: UserId },
    SignedOut,
    /// The backend rejected the token. Every view must yield to `redirect`.
    Expired { redirect: Route },
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            current: RwLock::new(None),
            events,
        })
    }

    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(MemorySessionStore::default()))
    }

    /// Loads whatever the store holds. An unreadable store is cleared.
    pub async fn init(&self) -> Option<Session> {
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, "session: discarding unreadable stored session");
                self.clear_store();
                None
            }
        };
        let mut guard = self.current.write().await;
        *guard = loaded.clone();
        loaded
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn establish(&self, session: Session) -> Result<(), SessionStoreError> {
        self.store.save(&session)?;
        let user_id = session.user.id.clone();
        *self.current.write().await = Some(session);
        info!(user_id = %user_id, "session: signed in");
        let _ = self.events.send(SessionEvent::SignedIn { user_id });
        Ok(())
    }

    /// Refreshes the cached operator identity without touching the token.
    pub async fn replace_user(&self, user: UserSummary) {
        let mut guard = self.current.write().await;
        if let Some(session) = guard.as_mut() {
            session.user = user;
            if let Err(err) = self.store.save(session) {
                warn!(error = %err, "session: failed to persist refreshed identity");
            }
        }
    }

    pub async fn logout(&self) {
        self.current.write().await.take();
        self.clear_store();
        info!("session: signed out");
        let _ = self.events.send(SessionEvent::SignedOut);
    }

    /// Clears local state unconditionally and tells subscribers to route to login.
    pub async fn invalidate(&self) {
        self.current.write().await.take();
        self.clear_store();
        warn!("session: token rejected by backend, redirecting to login");
        let _ = self.events.send(SessionEvent::Expired {
            redirect: Route::Login,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "session: failed to clear stored session");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
