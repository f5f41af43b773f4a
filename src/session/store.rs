//! Session objects and their shared registry.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{SessionId, SessionState, TermSize, TerminalDevice};
use crate::error::ShellContextError;
use crate::Result;

/// Configuration for creating a new session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Human-readable label (host name, profile, ...).
    pub name: Option<String>,
    /// Initial terminal size. `None` keeps the device's own size.
    pub size: Option<TermSize>,
}

impl SessionConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// An interactive session.
///
/// Shared as `Arc<Session>`: the [`SessionStore`] owns it, worker threads
/// only hold a non-owning binding to it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: Option<String>,
    device: Arc<TerminalDevice>,
    state: Mutex<SessionState>,
    created_at: Instant,
    woken: Mutex<bool>,
    wake_cv: Condvar,
}

impl Session {
    /// Create a new session around a terminal device.
    pub fn new(id: SessionId, config: SessionConfig, device: TerminalDevice) -> Self {
        if let Some(size) = config.size {
            device.resize(size);
        }
        Self {
            id,
            name: config.name,
            device: Arc::new(device),
            state: Mutex::new(SessionState::Created),
            created_at: Instant::now(),
            woken: Mutex::new(false),
            wake_cv: Condvar::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The session's controlling terminal.
    pub fn device(&self) -> Arc<TerminalDevice> {
        Arc::clone(&self.device)
    }

    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move the session to a new lifecycle state.
    pub fn transition_to(&self, target: SessionState) -> Result<()> {
        self.state
            .lock()
            .map_err(|_| ShellContextError::LockPoisoned)?
            .transition_to(target)
    }

    /// Time since the session was created.
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Wake a worker blocked in [`wait_for_wake`](Self::wait_for_wake).
    ///
    /// A wake with nobody waiting is remembered and consumed by the next wait.
    pub fn wake(&self) {
        if let Ok(mut woken) = self.woken.lock() {
            *woken = true;
            self.wake_cv.notify_all();
        }
    }

    /// Block the calling thread until [`wake`](Self::wake) is called.
    pub fn wait_for_wake(&self) -> Result<()> {
        let mut woken = self
            .woken
            .lock()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        while !*woken {
            woken = self
                .wake_cv
                .wait(woken)
                .map_err(|_| ShellContextError::LockPoisoned)?;
        }
        *woken = false;
        Ok(())
    }

    /// Like [`wait_for_wake`](Self::wait_for_wake) with a deadline.
    ///
    /// Returns `true` if woken, `false` on timeout.
    pub fn wait_for_wake_timeout(&self, timeout: Duration) -> Result<bool> {
        let woken = self
            .woken
            .lock()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        let (mut woken, _) = self
            .wake_cv
            .wait_timeout_while(woken, timeout, |w| !*w)
            .map_err(|_| ShellContextError::LockPoisoned)?;
        let was_woken = *woken;
        *woken = false;
        Ok(was_woken)
    }
}

/// Thread-safe registry owning all live sessions.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionStore {
    /// Create a new empty session store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a session with a fresh ID.
    pub fn create(&self, config: SessionConfig, device: TerminalDevice) -> Result<Arc<Session>> {
        let session = Arc::new(Session::new(SessionId::new(), config, device));
        self.insert(Arc::clone(&session))?;
        Ok(session)
    }

    /// Register an existing session.
    pub fn insert(&self, session: Arc<Session>) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ShellContextError::LockPoisoned)?;

        let id = session.id();
        if sessions.contains_key(&id) {
            return Err(ShellContextError::SessionExists(id.to_string()));
        }
        sessions.insert(id, session);
        debug!(session = %id, "session registered");
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Result<Option<Arc<Session>>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        Ok(sessions.get(id).cloned())
    }

    pub fn contains(&self, id: &SessionId) -> Result<bool> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        Ok(sessions.contains_key(id))
    }

    /// Drop the store's ownership of a session.
    ///
    /// Workers still bound to it will fail loudly on their next lookup
    /// unless something else keeps it alive.
    pub fn remove(&self, id: &SessionId) -> Result<Option<Arc<Session>>> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        let removed = sessions.remove(id);
        if removed.is_some() {
            debug!(session = %id, "session removed");
        }
        Ok(removed)
    }

    /// Get the number of sessions in the store.
    pub fn count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// List all session IDs, sorted.
    pub fn list_ids(&self) -> Result<Vec<SessionId>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ShellContextError::LockPoisoned)?;
        let mut ids: Vec<SessionId> = sessions.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    /// Remove every session whose worker has finished.
    ///
    /// Returns the number of sessions removed.
    pub fn remove_finished(&self) -> Result<usize> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ShellContextError::LockPoisoned)?;

        let before = sessions.len();
        sessions.retain(|_, session| !session.state().is_terminal());
        Ok(before - sessions.len())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn detached() -> TerminalDevice {
        TerminalDevice::detached(TermSize::default())
    }

    #[test]
    fn test_create_session() {
        let store = SessionStore::new();
        let session = store.create(SessionConfig::named("prod"), detached()).unwrap();

        assert!(store.contains(&session.id()).unwrap());
        assert_eq!(store.count(), 1);
        assert_eq!(session.name(), Some("prod"));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn test_config_size_applied_to_device() {
        let config = SessionConfig {
            name: None,
            size: Some(TermSize::new(40, 100)),
        };
        let session = Session::new(SessionId::new(), config, detached());
        assert_eq!(session.device().size(), TermSize::new(40, 100));
    }

    #[test]
    fn test_device_size_kept_without_config_size() {
        let device = TerminalDevice::detached(TermSize::new(30, 100));
        let session = Session::new(SessionId::new(), SessionConfig::default(), device);
        assert_eq!(session.device().size(), TermSize::new(30, 100));
    }

    #[test]
    fn test_state_readable_after_poison() {
        let session = Arc::new(Session::new(
            SessionId::new(),
            SessionConfig::default(),
            detached(),
        ));
        session.transition_to(SessionState::Running).unwrap();
        session.transition_to(SessionState::Finished).unwrap();

        let poisoner = Arc::clone(&session);
        let _ = thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the state lock");
        })
        .join();

        assert!(session.state.is_poisoned());
        assert_eq!(session.state(), SessionState::Finished);

        let store = SessionStore::new();
        store.insert(session).unwrap();
        assert_eq!(store.remove_finished().unwrap(), 1);
    }

    #[test]
    fn test_insert_duplicate() {
        let store = SessionStore::new();
        let session = Arc::new(Session::new(
            SessionId::new(),
            SessionConfig::default(),
            detached(),
        ));
        store.insert(Arc::clone(&session)).unwrap();

        let err = store.insert(session).unwrap_err();
        assert!(matches!(err, ShellContextError::SessionExists(_)));
    }

    #[test]
    fn test_get_and_remove() {
        let store = SessionStore::new();
        let session = store.create(SessionConfig::default(), detached()).unwrap();
        let id = session.id();

        let fetched = store.get(&id).unwrap().unwrap();
        assert!(Arc::ptr_eq(&fetched, &session));

        assert!(store.remove(&id).unwrap().is_some());
        assert!(store.get(&id).unwrap().is_none());
        assert!(store.remove(&id).unwrap().is_none());
    }

    #[test]
    fn test_list_ids_sorted() {
        let store = SessionStore::new();
        let a = store.create(SessionConfig::default(), detached()).unwrap().id();
        let b = store.create(SessionConfig::default(), detached()).unwrap().id();

        assert_eq!(store.list_ids().unwrap(), vec![a, b]);
    }

    #[test]
    fn test_remove_finished() {
        let store = SessionStore::new();
        let done = store.create(SessionConfig::default(), detached()).unwrap();
        store.create(SessionConfig::default(), detached()).unwrap();

        done.transition_to(SessionState::Running).unwrap();
        done.transition_to(SessionState::Finished).unwrap();

        assert_eq!(store.remove_finished().unwrap(), 1);
        assert_eq!(store.count(), 1);
        assert!(!store.contains(&done.id()).unwrap());
    }

    #[test]
    fn test_wake_before_wait_is_remembered() {
        let session = Session::new(SessionId::new(), SessionConfig::default(), detached());
        session.wake();
        session.wait_for_wake().unwrap();
        assert!(!session.wait_for_wake_timeout(Duration::from_millis(10)).unwrap());
    }

    #[test]
    fn test_wake_from_other_thread() {
        let session = Arc::new(Session::new(
            SessionId::new(),
            SessionConfig::default(),
            detached(),
        ));

        let waiter = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.wait_for_wake_timeout(Duration::from_secs(10)).unwrap())
        };

        thread::sleep(Duration::from_millis(20));
        session.wake();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_concurrent_create() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .create(SessionConfig::default(), detached())
                        .unwrap()
                        .id()
                })
            })
            .collect();

        let ids: std::collections::HashSet<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 64);
        assert_eq!(store.count(), 64);
    }
}
