pub mod handle;

pub use handle::ProgressObserverSlot;
use tokio::sync::mpsc as tokio_mpsc;

/// Position report emitted by the playback service while playing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMessage {
    pub progress: u64,
}

/// Producer side of a progress channel, handed to the service as its observer
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: tokio_mpsc::UnboundedSender<ProgressMessage>,
}

impl ProgressSender {
    /// Returns false once the receiving side is gone
    pub fn send(&self, message: ProgressMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of a progress channel. Messages arrive in emission order.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: tokio_mpsc::UnboundedReceiver<ProgressMessage>,
}

impl ProgressReceiver {
    pub async fn recv(&mut self) -> Option<ProgressMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressMessage> {
        self.rx.try_recv().ok()
    }
}

/// Single-producer, single-observer FIFO channel for progress updates
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = tokio_mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_in_emission_order() {
        let (tx, mut rx) = progress_channel();
        for progress in [5, 12, 20] {
            assert!(tx.send(ProgressMessage { progress }));
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap().progress);
        }
        assert_eq!(seen, vec![5, 12, 20]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_send_fails_after_receiver_dropped() {
        let (tx, rx) = progress_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.send(ProgressMessage { progress: 1 }));
    }
}
