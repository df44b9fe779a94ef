// Test support utilities for both unit and integration tests

use crate::catalog::{Book, BookId};
use crate::controller::SessionObserver;
use crate::playback::{
    Connection, ConnectionEvent, ConnectionId, PlaybackControl, ProgressMessage, ProgressSender,
    ServiceConnector, ServiceHandle,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc as tokio_mpsc;

/// Catalog entry with a title derived from its id
pub fn book(id: &str, duration_secs: u64) -> Book {
    Book {
        id: BookId::new(id),
        title: format!("Title of {}", id),
        author: "Test Author".to_string(),
        cover_url: None,
        duration: duration_secs,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Play { book_id: BookId, start_progress: u64 },
    Pause,
    Stop,
    SeekTo(u64),
    SetProgressObserver,
}

/// Playback service stand-in that records every call it receives.
///
/// Playing state follows the commands like a real engine would;
/// `set_playing(false)` simulates reaching the end of a book.
pub struct RecordingService {
    calls: Mutex<Vec<ServiceCall>>,
    playing: AtomicBool,
    alive: AtomicBool,
    observer: Mutex<Option<ProgressSender>>,
}

impl RecordingService {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingService {
            calls: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            observer: Mutex::new(None),
        })
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls excluding observer registration
    pub fn commands(&self) -> Vec<ServiceCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != ServiceCall::SetProgressObserver)
            .collect()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Publish to the registered observer; false if none is listening
    pub fn emit(&self, progress: u64) -> bool {
        self.observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|observer| observer.send(ProgressMessage { progress }))
            .unwrap_or(false)
    }
}

impl PlaybackControl for RecordingService {
    fn play(&self, book_id: &BookId, start_progress: u64) {
        self.record(ServiceCall::Play {
            book_id: book_id.clone(),
            start_progress,
        });
        self.set_playing(true);
    }

    fn pause(&self) {
        self.record(ServiceCall::Pause);
        self.set_playing(false);
    }

    fn stop(&self) {
        self.record(ServiceCall::Stop);
        self.set_playing(false);
    }

    fn seek_to(&self, position: u64) {
        self.record(ServiceCall::SeekTo(position));
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn set_progress_observer(&self, observer: ProgressSender) {
        self.record(ServiceCall::SetProgressObserver);
        *self.observer.lock().unwrap() = Some(observer);
    }
}

/// Binding handshake driven by the test: nothing connects until `connect`
#[derive(Default)]
pub struct FakeConnector {
    next_id: AtomicU64,
    bindings: Mutex<HashMap<ConnectionId, tokio_mpsc::UnboundedSender<ConnectionEvent>>>,
    unbinds: Mutex<Vec<ConnectionId>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `Connected` to every registered binding
    pub fn connect(&self, service: Arc<RecordingService>) -> bool {
        let handle: ServiceHandle = service;
        let bindings = self.bindings.lock().unwrap();
        let mut delivered = false;
        for events_tx in bindings.values() {
            delivered |= events_tx
                .send(ConnectionEvent::Connected(handle.clone()))
                .is_ok();
        }
        delivered
    }

    pub fn disconnect(&self) {
        for events_tx in self.bindings.lock().unwrap().values() {
            let _ = events_tx.send(ConnectionEvent::Disconnected);
        }
    }

    pub fn unbind_count(&self) -> usize {
        self.unbinds.lock().unwrap().len()
    }
}

impl ServiceConnector for FakeConnector {
    fn bind(&self) -> Connection {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (events_tx, events) = tokio_mpsc::unbounded_channel();
        self.bindings.lock().unwrap().insert(id, events_tx);
        Connection { id, events }
    }

    fn unbind(&self, id: ConnectionId) {
        self.bindings.lock().unwrap().remove(&id);
        self.unbinds.lock().unwrap().push(id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverCall {
    Ui { progress: u64, is_playing: bool },
    Progress(u64),
}

/// Observer that keeps every notification in order
#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<ObserverCall>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ObserverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn progress_updates(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ObserverCall::Progress(progress) => Some(progress),
                ObserverCall::Ui { .. } => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn update_ui(&self, progress: u64, is_playing: bool) {
        self.calls.lock().unwrap().push(ObserverCall::Ui {
            progress,
            is_playing,
        });
    }

    fn update_progress(&self, progress: u64) {
        self.calls
            .lock()
            .unwrap()
            .push(ObserverCall::Progress(progress));
    }
}
