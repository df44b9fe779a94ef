use crate::catalog::BookId;

/// Controller-side mirror of what is playing.
///
/// `is_playing` implies `book_id` is set. Only `start` turns it on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSession {
    book_id: Option<BookId>,
    progress: u64,
    is_playing: bool,
}

impl PlaybackSession {
    /// Baseline session for a previously selected book that is not playing
    pub fn selected(book_id: BookId, progress: u64) -> Self {
        PlaybackSession {
            book_id: Some(book_id),
            progress,
            is_playing: false,
        }
    }

    pub fn book_id(&self) -> Option<&BookId> {
        self.book_id.as_ref()
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn start(&mut self, book_id: BookId, progress: u64) {
        self.book_id = Some(book_id);
        self.progress = progress;
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    /// Stop keeps the book but rewinds to the beginning
    pub fn stop(&mut self) {
        self.progress = 0;
        self.is_playing = false;
    }

    pub fn set_progress(&mut self, progress: u64) {
        self.progress = progress;
    }

    /// Service authority was lost: nothing is known to be advancing any more
    pub fn revoke(&mut self) {
        self.progress = 0;
        self.is_playing = false;
    }

    /// Point an idle session at a book. Ignored while playing, the engine
    /// is still on the previous book until it is stopped.
    pub fn select(&mut self, book_id: BookId) {
        if self.is_playing {
            return;
        }
        self.book_id = Some(book_id);
        self.progress = 0;
    }
}
