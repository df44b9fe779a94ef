// # Service Host
//
// Owns the single live playback service and the bindings to it.
//
// - `bind()` returns immediately; `Connected(handle)` arrives later on the
//   connection's event channel
// - `unbind()` revokes the handle at once; commands already in flight may be
//   dropped by the service
// - the service is created on the first binding and destroyed with the last
//   one, so a new instance starts with no memory of earlier sessions

use crate::config::Config;
use crate::playback::service::{EngineStatus, MediaLibrary, PlaybackService, ServiceHandle};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of the binding handshake, delivered asynchronously
pub enum ConnectionEvent {
    Connected(ServiceHandle),
    Disconnected,
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::Connected(_) => f.write_str("Connected"),
            ConnectionEvent::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// A pending or established binding, as seen by the binder
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub events: tokio_mpsc::UnboundedReceiver<ConnectionEvent>,
}

/// The binding handshake (allows faking the service in tests)
pub trait ServiceConnector: Send + Sync {
    fn bind(&self) -> Connection;
    fn unbind(&self, id: ConnectionId);
}

struct BindingEntry {
    events_tx: tokio_mpsc::UnboundedSender<ConnectionEvent>,
    /// Set while this binding holds a live handle
    alive: Option<Arc<AtomicBool>>,
}

impl BindingEntry {
    fn revoke(&mut self) {
        if let Some(alive) = self.alive.take() {
            alive.store(false, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct HostState {
    service: Option<PlaybackService>,
    bindings: HashMap<ConnectionId, BindingEntry>,
}

struct HostInner {
    state: Mutex<HostState>,
    next_id: AtomicU64,
    media: Arc<dyn MediaLibrary>,
    progress_interval: Duration,
    runtime_handle: tokio::runtime::Handle,
}

/// Process-wide host of the playback service
#[derive(Clone)]
pub struct ServiceHost {
    inner: Arc<HostInner>,
}

impl ServiceHost {
    pub fn new(
        config: &Config,
        media: Arc<dyn MediaLibrary>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        ServiceHost {
            inner: Arc::new(HostInner {
                state: Mutex::new(HostState::default()),
                next_id: AtomicU64::new(1),
                media,
                progress_interval: config.progress_interval,
                runtime_handle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Complete the handshake for `id` if it is still registered
    fn connect(&self, state: &mut HostState, id: ConnectionId) {
        let Some(entry) = state.bindings.get_mut(&id) else {
            debug!("Connection {} unbound before it connected", id);
            return;
        };
        if entry.alive.is_some() {
            return;
        }

        let service = state.service.get_or_insert_with(|| {
            PlaybackService::start(
                self.inner.media.clone(),
                self.inner.progress_interval,
                &self.inner.runtime_handle,
            )
        });

        let alive = Arc::new(AtomicBool::new(true));
        let handle: ServiceHandle = Arc::new(service.handle(alive.clone()));
        entry.alive = Some(alive);

        if entry.events_tx.send(ConnectionEvent::Connected(handle)).is_err() {
            warn!("Connection {} dropped its events before connecting", id);
            entry.revoke();
            return;
        }
        info!("Connection {} established", id);
    }

    /// Simulate loss of the hosting process: every binding is disconnected
    pub fn terminate(&self) {
        let mut state = self.lock();
        state.service = None;
        for (id, entry) in state.bindings.iter_mut() {
            entry.revoke();
            let _ = entry.events_tx.send(ConnectionEvent::Disconnected);
            info!("Connection {} lost", id);
        }
    }

    /// Bring the service back for bindings that are still registered
    pub fn restart(&self) {
        let mut state = self.lock();
        let ids: Vec<ConnectionId> = state.bindings.keys().copied().collect();
        for id in ids {
            self.connect(&mut state, id);
        }
    }

    /// Authoritative status of the live service, if there is one
    pub fn status(&self) -> Option<EngineStatus> {
        self.lock().service.as_ref().map(PlaybackService::status)
    }

    pub fn binding_count(&self) -> usize {
        self.lock().bindings.len()
    }
}

impl ServiceConnector for ServiceHost {
    fn bind(&self) -> Connection {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let (events_tx, events) = tokio_mpsc::unbounded_channel();

        self.lock().bindings.insert(
            id,
            BindingEntry {
                events_tx,
                alive: None,
            },
        );
        info!("Bind requested: {}", id);

        let host = self.clone();
        self.inner.runtime_handle.spawn(async move {
            tokio::task::yield_now().await;
            let mut state = host.lock();
            host.connect(&mut state, id);
        });

        Connection { id, events }
    }

    fn unbind(&self, id: ConnectionId) {
        let mut state = self.lock();
        let Some(mut entry) = state.bindings.remove(&id) else {
            debug!("Unbind of unknown connection {}", id);
            return;
        };
        entry.revoke();
        info!("Unbound {}", id);

        if state.bindings.is_empty() {
            state.service = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Book, BookId, Catalog};
    use crate::playback::service::PlaybackControl;

    fn host() -> ServiceHost {
        let catalog = Catalog::new(vec![Book {
            id: BookId::new("book-1"),
            title: "One".to_string(),
            author: "A".to_string(),
            cover_url: None,
            duration: 600,
        }]);
        let config = Config {
            progress_interval: Duration::from_millis(20),
            ..Config::default()
        };
        ServiceHost::new(&config, Arc::new(catalog), tokio::runtime::Handle::current())
    }

    async fn connected(connection: &mut Connection) -> ServiceHandle {
        match connection.events.recv().await {
            Some(ConnectionEvent::Connected(handle)) => handle,
            other => panic!("expected Connected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_connects_asynchronously() {
        let host = host();
        let mut connection = host.bind();

        assert!(connection.events.try_recv().is_err());
        let handle = connected(&mut connection).await;
        assert!(handle.is_alive());
        assert!(!handle.is_playing());
        assert!(host.status().is_some());
    }

    #[tokio::test]
    async fn test_unbind_revokes_and_destroys_service() {
        let host = host();
        let mut connection = host.bind();
        let handle = connected(&mut connection).await;
        handle.play(&BookId::new("book-1"), 0);

        host.unbind(connection.id);

        assert!(!handle.is_alive());
        assert!(host.status().is_none());
        assert_eq!(host.binding_count(), 0);
    }

    #[tokio::test]
    async fn test_unbind_before_connect_never_connects() {
        let host = host();
        let mut connection = host.bind();
        host.unbind(connection.id);

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(connection.events.recv().await.is_none());
        assert!(host.status().is_none());
    }

    #[tokio::test]
    async fn test_rebind_gets_fresh_service() {
        let host = host();
        let mut first = host.bind();
        connected(&mut first).await.play(&BookId::new("book-1"), 1000);
        host.unbind(first.id);

        let mut second = host.bind();
        let handle = connected(&mut second).await;
        assert!(!handle.is_playing());
        assert_eq!(host.status(), Some(EngineStatus::default()));
    }

    #[tokio::test]
    async fn test_terminate_then_restart() {
        let host = host();
        let mut connection = host.bind();
        let old = connected(&mut connection).await;

        host.terminate();
        assert!(!old.is_alive());
        assert!(matches!(
            connection.events.recv().await,
            Some(ConnectionEvent::Disconnected)
        ));

        host.restart();
        let fresh = connected(&mut connection).await;
        assert!(fresh.is_alive());
        assert!(!old.is_alive());
    }
}
