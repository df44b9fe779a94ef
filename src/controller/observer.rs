use tracing::info;

/// Receives UI updates from the controller. Called synchronously on the
/// controller's thread, so implementations must only record state.
pub trait SessionObserver: Send + Sync {
    fn update_ui(&self, progress: u64, is_playing: bool);
    fn update_progress(&self, progress: u64);
}

/// Observer for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn update_ui(&self, progress: u64, is_playing: bool) {
        info!(
            "UI: {} at {}",
            if is_playing { "playing" } else { "idle" },
            format_progress(progress)
        );
    }

    fn update_progress(&self, progress: u64) {
        info!("UI: progress {}", format_progress(progress));
    }
}

/// mm:ss rendering of a millisecond position
fn format_progress(progress: u64) -> String {
    let seconds = progress / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
