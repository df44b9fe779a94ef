// # Controller Module
//
// UI-facing side of playback:
//
// - **SessionController**: guarded commands, progress reconciliation, rebinding
// - **SessionObserver**: what the presentation layer receives
// - **SessionSnapshot**: state carried across controller teardown

mod observer;
mod session_controller;
mod snapshot;

pub use observer::{LoggingObserver, SessionObserver};
pub use session_controller::{ControllerState, SessionController};
pub use snapshot::{SessionSnapshot, SnapshotError};
