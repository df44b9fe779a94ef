use crate::catalog::{Book, BookId, Catalog};
use crate::playback::progress::{ProgressMessage, ProgressObserverSlot, ProgressSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Resolves what the service needs to know about a book before playing it
pub trait MediaLibrary: Send + Sync {
    /// Length in milliseconds, `None` if the book cannot be played.
    /// A length of 0 means unknown: playback runs until stopped.
    fn duration_ms(&self, book_id: &BookId) -> Option<u64>;
}

impl MediaLibrary for Catalog {
    fn duration_ms(&self, book_id: &BookId) -> Option<u64> {
        self.find(book_id).map(Book::duration_ms)
    }
}

/// Control surface of a bound playback service.
///
/// Commands are fire-and-forget. A handle whose binding was revoked drops
/// them silently; a command racing an unbind may be lost and that is
/// accepted rather than synchronized away.
pub trait PlaybackControl: Send + Sync {
    fn play(&self, book_id: &BookId, start_progress: u64);
    /// Caller must check `is_playing` first
    fn pause(&self);
    fn stop(&self);
    /// Moves the position without changing play/pause state
    fn seek_to(&self, position: u64);
    fn is_playing(&self) -> bool;
    /// Whether the binding behind this handle is still usable
    fn is_alive(&self) -> bool;
    /// Replaces any previously registered observer
    fn set_progress_observer(&self, observer: ProgressSender);
}

/// Opaque handle delivered by the binding handshake
pub type ServiceHandle = Arc<dyn PlaybackControl>;

/// Playback commands applied by the service
#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    Play { book_id: BookId, start_progress: u64 },
    Pause,
    Stop,
    Seek(u64),
}

/// Authoritative playback state owned by the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    pub book_id: Option<BookId>,
    pub position: u64,
    pub duration: u64,
    pub playing: bool,
}

struct ServiceCore {
    status: Mutex<EngineStatus>,
    observer: ProgressObserverSlot,
    media: Arc<dyn MediaLibrary>,
}

impl ServiceCore {
    fn lock(&self) -> MutexGuard<'_, EngineStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, command: PlaybackCommand) {
        let mut status = self.lock();
        match command {
            PlaybackCommand::Play {
                book_id,
                start_progress,
            } => {
                let Some(duration) = self.media.duration_ms(&book_id) else {
                    warn!("Cannot play unknown book: {}", book_id);
                    return;
                };
                info!("Playing {} from {}", book_id, start_progress);
                status.position = clamp_position(start_progress, duration);
                status.duration = duration;
                status.book_id = Some(book_id);
                status.playing = true;
            }
            PlaybackCommand::Pause => {
                if !status.playing {
                    debug!("Pause ignored, nothing playing");
                    return;
                }
                status.playing = false;
                info!("Paused at {}", status.position);
            }
            PlaybackCommand::Stop => {
                status.playing = false;
                status.position = 0;
                info!("Stopped");
            }
            PlaybackCommand::Seek(position) => {
                status.position = clamp_position(position, status.duration);
                debug!("Seeked to {}", status.position);
            }
        }
    }

    /// Advance a playing engine by `elapsed_ms` and return the position to report
    fn tick(&self, elapsed_ms: u64) -> Option<ProgressMessage> {
        let mut status = self.lock();
        if !status.playing {
            return None;
        }

        status.position = status.position.saturating_add(elapsed_ms);
        if status.duration > 0 && status.position >= status.duration {
            status.position = status.duration;
            status.playing = false;
            info!(
                "Finished {}",
                status.book_id.as_ref().map(BookId::as_str).unwrap_or("?")
            );
        }

        Some(ProgressMessage {
            progress: status.position,
        })
    }
}

fn clamp_position(position: u64, duration: u64) -> u64 {
    if duration > 0 {
        position.min(duration)
    } else {
        position
    }
}

/// Long-lived playback worker. Emits progress on its own task so control
/// calls never wait on it. Dropping the service stops the task.
pub struct PlaybackService {
    core: Arc<ServiceCore>,
    ticker: JoinHandle<()>,
}

impl PlaybackService {
    pub fn start(
        media: Arc<dyn MediaLibrary>,
        progress_interval: Duration,
        runtime_handle: &tokio::runtime::Handle,
    ) -> Self {
        let core = Arc::new(ServiceCore {
            status: Mutex::new(EngineStatus::default()),
            observer: ProgressObserverSlot::new(),
            media,
        });

        let ticker = runtime_handle.spawn(Self::run(core.clone(), progress_interval));

        info!("PlaybackService started");
        PlaybackService { core, ticker }
    }

    async fn run(core: Arc<ServiceCore>, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let step = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            // Published outside the status lock: a command may land between
            // the two, so a report can trail a seek.
            if let Some(message) = core.tick(step) {
                core.observer.publish(message);
            }
        }
    }

    /// A control handle that is usable while `alive` stays set
    pub fn handle(&self, alive: Arc<AtomicBool>) -> PlaybackHandle {
        PlaybackHandle {
            core: self.core.clone(),
            alive,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.core.lock().clone()
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.ticker.abort();
        self.core.observer.clear();
        info!("PlaybackService stopped");
    }
}

/// Handle to the playback service for sending commands
#[derive(Clone)]
pub struct PlaybackHandle {
    core: Arc<ServiceCore>,
    alive: Arc<AtomicBool>,
}

impl PlaybackHandle {
    fn send(&self, command: PlaybackCommand) {
        if !self.is_alive() {
            trace!("Binding revoked, dropping {:?}", command);
            return;
        }
        self.core.apply(command);
    }
}

impl PlaybackControl for PlaybackHandle {
    fn play(&self, book_id: &BookId, start_progress: u64) {
        self.send(PlaybackCommand::Play {
            book_id: book_id.clone(),
            start_progress,
        });
    }

    fn pause(&self) {
        self.send(PlaybackCommand::Pause);
    }

    fn stop(&self) {
        self.send(PlaybackCommand::Stop);
    }

    fn seek_to(&self, position: u64) {
        self.send(PlaybackCommand::Seek(position));
    }

    fn is_playing(&self) -> bool {
        self.is_alive() && self.core.lock().playing
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn set_progress_observer(&self, observer: ProgressSender) {
        if self.is_alive() {
            self.core.observer.replace(observer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::progress::progress_channel;

    fn library() -> Arc<dyn MediaLibrary> {
        Arc::new(Catalog::new(vec![Book {
            id: BookId::new("book-1"),
            title: "Short".to_string(),
            author: "Someone".to_string(),
            cover_url: None,
            duration: 1,
        }]))
    }

    fn start_service() -> (PlaybackService, PlaybackHandle) {
        let service = PlaybackService::start(
            library(),
            Duration::from_millis(10),
            &tokio::runtime::Handle::current(),
        );
        let handle = service.handle(Arc::new(AtomicBool::new(true)));
        (service, handle)
    }

    #[tokio::test]
    async fn test_is_playing_before_any_play() {
        let (_service, handle) = start_service();
        assert!(!handle.is_playing());
        handle.pause();
        assert!(!handle.is_playing());
    }

    #[tokio::test]
    async fn test_control_surface_updates_status() {
        let (service, handle) = start_service();
        let book = BookId::new("book-1");

        handle.play(&book, 200);
        assert!(handle.is_playing());
        assert_eq!(service.status().duration, 1000);

        handle.seek_to(5000);
        assert_eq!(service.status().position, 1000);
        assert!(handle.is_playing());

        handle.pause();
        assert!(!handle.is_playing());

        handle.stop();
        let status = service.status();
        assert_eq!(status.position, 0);
        assert!(!status.playing);
    }

    #[tokio::test]
    async fn test_unknown_book_is_not_played() {
        let (_service, handle) = start_service();
        handle.play(&BookId::new("missing"), 0);
        assert!(!handle.is_playing());
    }

    #[tokio::test]
    async fn test_revoked_handle_drops_commands() {
        let (service, handle) = start_service();
        handle.play(&BookId::new("book-1"), 0);

        let alive = Arc::new(AtomicBool::new(false));
        let revoked = service.handle(alive);
        revoked.stop();

        assert!(!revoked.is_alive());
        assert!(!revoked.is_playing());
        assert!(service.status().playing);
    }

    #[tokio::test]
    async fn test_emits_until_natural_end() {
        let (service, handle) = start_service();
        let (tx, mut rx) = progress_channel();
        handle.set_progress_observer(tx);
        handle.play(&BookId::new("book-1"), 900);

        let mut last = 0;
        while let Ok(Some(message)) =
            tokio::time::timeout(Duration::from_secs(2), rx.recv()).await
        {
            assert!(message.progress >= last);
            last = message.progress;
            if last == 1000 {
                break;
            }
        }

        assert_eq!(last, 1000);
        assert!(!handle.is_playing());
        assert_eq!(service.status().position, 1000);
    }
}
