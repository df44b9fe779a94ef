use crate::catalog::{Book, BookId, Catalog};
use crate::controller::observer::SessionObserver;
use crate::controller::snapshot::SessionSnapshot;
use crate::playback::{
    progress_channel, Connection, ConnectionEvent, ConnectionId, PlaybackSession,
    ProgressMessage, ProgressReceiver, ServiceConnector, ServiceHandle,
};
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, trace, warn};

/// Where the controller stands with respect to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Unbound,
    BoundIdle,
    BoundPlaying,
    BoundPaused,
}

/// Book and position to replay once a binding (re)connects
#[derive(Debug, Clone, PartialEq)]
struct ResumePoint {
    book_id: BookId,
    progress: u64,
}

struct ServiceBinding {
    connection_id: ConnectionId,
    events: tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>,
    /// Present between `Connected` and disconnect/unbind
    handle: Option<ServiceHandle>,
    progress_rx: Option<ProgressReceiver>,
}

enum ControllerEvent {
    Connection(ConnectionEvent),
    Progress(ProgressMessage),
}

/// Translates user intent into guarded service calls and mirrors playback
/// state for the UI.
///
/// All methods run on one control-plane thread. The service only reaches
/// back through the progress channel, drained by [`SessionController::next_event`]
/// or [`SessionController::process_pending`].
pub struct SessionController {
    connector: Arc<dyn ServiceConnector>,
    observer: Arc<dyn SessionObserver>,
    catalog: Catalog,
    selected: Option<Book>,
    session: PlaybackSession,
    state: ControllerState,
    binding: Option<ServiceBinding>,
    resume: Option<ResumePoint>,
}

impl SessionController {
    pub fn new(connector: Arc<dyn ServiceConnector>, observer: Arc<dyn SessionObserver>) -> Self {
        SessionController {
            connector,
            observer,
            catalog: Catalog::default(),
            selected: None,
            session: PlaybackSession::default(),
            state: ControllerState::Unbound,
            binding: None,
            resume: None,
        }
    }

    /// Recreate a controller from the snapshot of a destroyed one.
    ///
    /// A snapshot that was playing does not replay here: there is no binding
    /// yet, so the replay waits for the next `Connected`.
    pub fn restore(
        connector: Arc<dyn ServiceConnector>,
        observer: Arc<dyn SessionObserver>,
        snapshot: Option<SessionSnapshot>,
    ) -> Self {
        let mut controller = Self::new(connector, observer);
        let Some(snapshot) = snapshot else {
            return controller;
        };

        controller.catalog = match Catalog::from_json(&snapshot.serialized_catalog) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Discarding unreadable catalog from snapshot: {}", e);
                Catalog::default()
            }
        };

        let Some(book_id) = snapshot.selected_book_id else {
            return controller;
        };
        let Some(book) = controller.catalog.find(&book_id).cloned() else {
            warn!("Snapshot selects {} which is not in the catalog", book_id);
            return controller;
        };

        controller.session = PlaybackSession::selected(book.id.clone(), snapshot.progress);
        if snapshot.is_playing {
            controller.resume = Some(ResumePoint {
                book_id: book.id.clone(),
                progress: snapshot.progress,
            });
        }
        controller.selected = Some(book);
        info!(
            "Restored session for {} at {} (playing: {})",
            book_id, snapshot.progress, snapshot.is_playing
        );
        controller
    }

    /// Capture state for teardown
    pub fn snapshot(&self) -> SessionSnapshot {
        let serialized_catalog = self.catalog.to_json().unwrap_or_else(|e| {
            warn!("Catalog could not be serialized: {}", e);
            String::new()
        });

        // While playing, a later selection does not replace the playing book
        let (selected_book_id, progress, is_playing) = match &self.resume {
            Some(resume) => (Some(resume.book_id.clone()), resume.progress, true),
            None if self.confirmed_playing() => {
                (self.session.book_id().cloned(), self.session.progress(), true)
            }
            None => (
                self.selected
                    .as_ref()
                    .map(|book| book.id.clone())
                    .or_else(|| self.session.book_id().cloned()),
                self.session.progress(),
                false,
            ),
        };

        SessionSnapshot {
            selected_book_id,
            serialized_catalog,
            progress,
            is_playing,
        }
    }

    // ========== Binding lifecycle ==========

    /// Request a binding. Returns immediately; nothing may be assumed about
    /// the connection until `Connected` is processed.
    pub fn start(&mut self) {
        if self.binding.is_some() {
            debug!("Already bound or binding");
            return;
        }
        let Connection { id, events } = self.connector.bind();
        debug!("Binding requested: {}", id);
        self.binding = Some(ServiceBinding {
            connection_id: id,
            events,
            handle: None,
            progress_rx: None,
        });
    }

    /// Release the binding. The handle is invalid from here on and any
    /// progress still in flight is dropped with the receiver.
    pub fn stop(&mut self) {
        let playing = self.confirmed_playing();
        let Some(binding) = self.binding.take() else {
            return;
        };
        if binding.handle.is_some() {
            if playing {
                self.remember_resume_point();
            } else {
                self.session.pause();
            }
        }
        self.connector.unbind(binding.connection_id);
        self.state = ControllerState::Unbound;
        info!("Unbound from playback service");
    }

    fn remember_resume_point(&mut self) {
        if !self.session.is_playing() {
            return;
        }
        if let Some(book_id) = self.session.book_id() {
            self.resume = Some(ResumePoint {
                book_id: book_id.clone(),
                progress: self.session.progress(),
            });
        }
    }

    pub fn on_connected(&mut self, handle: ServiceHandle) {
        let Some(binding) = self.binding.as_mut() else {
            debug!("Connected without a pending binding, ignoring");
            return;
        };

        let (progress_tx, progress_rx) = progress_channel();
        handle.set_progress_observer(progress_tx);
        binding.progress_rx = Some(progress_rx);
        binding.handle = Some(handle.clone());
        self.state = ControllerState::BoundIdle;
        info!("Connected to playback service");

        if let Some(resume) = self.resume.take() {
            info!(
                "Resuming {} at {} on the new binding",
                resume.book_id, resume.progress
            );
            handle.play(&resume.book_id, resume.progress);
            if !handle.is_playing() {
                warn!("Service refused to resume {}", resume.book_id);
                return;
            }
            self.session.start(resume.book_id, resume.progress);
            self.state = ControllerState::BoundPlaying;
            self.observer.update_ui(resume.progress, true);
        }
    }

    /// Service authority was lost. The binding stays registered so the
    /// service can reconnect it.
    pub fn on_disconnected(&mut self) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        binding.handle = None;
        binding.progress_rx = None;

        self.remember_resume_point();
        self.session.revoke();
        self.state = ControllerState::Unbound;
        info!("Disconnected from playback service");
        self.observer.update_ui(0, false);
    }

    // ========== Guarded commands ==========

    /// Handle of a binding that is connected and still alive
    fn live_handle(&self) -> Option<ServiceHandle> {
        self.binding
            .as_ref()
            .and_then(|binding| binding.handle.clone())
            .filter(|handle| handle.is_alive())
    }

    /// The service's answer while bound, the mirror otherwise
    fn confirmed_playing(&self) -> bool {
        match self.live_handle() {
            Some(handle) => handle.is_playing(),
            None => self.session.is_playing(),
        }
    }

    pub fn request_play(&mut self, book_id: &BookId) {
        let Some(handle) = self.live_handle() else {
            debug!("Play ignored: not connected");
            return;
        };
        if handle.is_playing() {
            debug!("Play ignored: already playing");
            return;
        }

        let start_progress = if self.session.book_id() == Some(book_id) {
            self.session.progress()
        } else {
            0
        };
        handle.play(book_id, start_progress);
        if !handle.is_playing() {
            debug!("Play of {} refused by the service", book_id);
            return;
        }
        self.session.start(book_id.clone(), start_progress);
        self.resume = None;
        self.state = ControllerState::BoundPlaying;
        self.observer.update_ui(start_progress, true);
    }

    pub fn request_pause(&mut self) {
        let Some(handle) = self.playing_handle("Pause") else {
            return;
        };
        handle.pause();
        self.session.pause();
        self.state = ControllerState::BoundPaused;
        self.observer.update_ui(self.session.progress(), false);
    }

    pub fn request_stop(&mut self) {
        let Some(handle) = self.playing_handle("Stop") else {
            return;
        };
        handle.stop();
        self.session.stop();
        self.state = ControllerState::BoundIdle;
        self.observer.update_ui(0, false);
    }

    /// Mirrors `position` immediately; a report already in flight may still
    /// carry the pre-seek position.
    pub fn request_seek(&mut self, position: u64) {
        let Some(handle) = self.playing_handle("Seek") else {
            return;
        };
        self.session.set_progress(position);
        handle.seek_to(position);
    }

    /// Pause, stop and seek only reach a service that reports playing. One
    /// that just ran off the end of the book therefore drops them.
    fn playing_handle(&self, command: &str) -> Option<ServiceHandle> {
        let Some(handle) = self.live_handle() else {
            debug!("{} ignored: not connected", command);
            return None;
        };
        if !handle.is_playing() {
            debug!("{} ignored: not playing", command);
            return None;
        }
        Some(handle)
    }

    // ========== Progress ==========

    pub fn on_progress_message(&mut self, message: ProgressMessage) {
        self.session.set_progress(message.progress);
        self.observer.update_progress(message.progress);

        // The last report of a book that ran out arrives after the service
        // stopped playing it.
        if self.session.is_playing() && !self.confirmed_playing() {
            debug!("Playback ended at {}", message.progress);
            self.session.pause();
            self.state = ControllerState::BoundIdle;
            self.observer.update_ui(message.progress, false);
        }
    }

    fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Progress(message) => self.on_progress_message(message),
            ControllerEvent::Connection(ConnectionEvent::Connected(handle)) => {
                self.on_connected(handle)
            }
            ControllerEvent::Connection(ConnectionEvent::Disconnected) => self.on_disconnected(),
        }
    }

    /// Wait for and apply the next connection or progress event.
    /// Returns false when there is nothing left to wait on.
    pub async fn next_event(&mut self) -> bool {
        let Some(binding) = self.binding.as_mut() else {
            return false;
        };

        let event = tokio::select! {
            biased;
            Some(message) = recv_progress(&mut binding.progress_rx) => {
                ControllerEvent::Progress(message)
            }
            event = binding.events.recv() => match event {
                Some(event) => ControllerEvent::Connection(event),
                None => return false,
            },
        };

        self.handle_event(event);
        true
    }

    /// Apply every event that is already queued, progress first
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let Some(binding) = self.binding.as_mut() else {
                return processed;
            };

            let event = if let Some(message) =
                binding.progress_rx.as_mut().and_then(ProgressReceiver::try_recv)
            {
                ControllerEvent::Progress(message)
            } else {
                match binding.events.try_recv() {
                    Ok(event) => ControllerEvent::Connection(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        return processed;
                    }
                }
            };

            self.handle_event(event);
            processed += 1;
        }
    }

    // ========== Selection and catalog ==========

    pub fn select_book(&mut self, index: usize) -> Option<&Book> {
        let Some(book) = self.catalog.get(index).cloned() else {
            debug!("No book at index {}", index);
            return None;
        };
        self.session.select(book.id.clone());
        self.selected = Some(book);
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Replace the catalog with search results
    pub fn apply_search_results(&mut self, catalog: Catalog) {
        if let Some(selected) = &self.selected {
            if catalog.find(&selected.id).is_none() {
                trace!("Selected book {} not in new results", selected.id);
                self.selected = None;
            }
        }
        self.catalog = catalog;
    }

    // ========== Accessors ==========

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.live_handle().is_some()
    }

    pub fn selected_book(&self) -> Option<&Book> {
        self.selected.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

async fn recv_progress(rx: &mut Option<ProgressReceiver>) -> Option<ProgressMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
