pub mod host;
pub mod progress;
pub mod service;
pub mod session;

pub use host::{Connection, ConnectionEvent, ConnectionId, ServiceConnector, ServiceHost};
pub use progress::{progress_channel, ProgressMessage, ProgressReceiver, ProgressSender};
pub use service::{
    EngineStatus, MediaLibrary, PlaybackControl, PlaybackHandle, PlaybackService, ServiceHandle,
};
pub use session::PlaybackSession;
