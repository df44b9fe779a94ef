use super::{ProgressMessage, ProgressSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// The one observer a playback service publishes progress to.
///
/// Registering a new observer replaces the previous one, which is how a
/// rebinding controller takes over from a stale one.
#[derive(Clone, Default)]
pub struct ProgressObserverSlot {
    observer: Arc<Mutex<Option<ProgressSender>>>,
}

impl ProgressObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgressSender>> {
        self.observer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace(&self, observer: ProgressSender) {
        if self.lock().replace(observer).is_some() {
            debug!("Progress observer replaced");
        }
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_registered(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver to the current observer. An observer whose receiver was dropped
    /// is removed, so nothing is delivered to it afterwards.
    pub fn publish(&self, message: ProgressMessage) {
        let mut observer = self.lock();
        let delivered = match observer.as_ref() {
            Some(sender) => sender.send(message),
            None => {
                trace!("No progress observer, dropping {:?}", message);
                return;
            }
        };

        if !delivered {
            trace!("Progress observer gone, dropping {:?}", message);
            observer.take();
        }
    }
}
