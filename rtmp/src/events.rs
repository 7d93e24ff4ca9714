//! Change notifications raised by players and publishers.
//!
//! The engine raises strongly typed [`StreamEvent`]s.  Each one is paired with the numeric code
//! and message the host platform expects (the `code`/`msg` pair of the view's change event)
//! and delivered through an [`EventDispatcher`], which calls the registered listener from its
//! own task so that listeners never run on a network or media thread.

use crate::media::StreamMetadata;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const PLAYER_CONNECTING: i32 = 1000;
pub const PLAYER_CONNECTED: i32 = 1001;
pub const PLAYER_CONNECT_FAILED: i32 = 1002;
pub const PLAYER_RECONNECTING: i32 = 1003;
pub const PLAYER_STOPPED: i32 = 1004;
pub const PLAYER_NETWORK_ERROR: i32 = 1005;
pub const PLAYER_BUFFER_EMPTY: i32 = 1100;
pub const PLAYER_BUFFERING: i32 = 1101;
pub const PLAYER_BUFFER_READY: i32 = 1102;
pub const PLAYER_PAUSED: i32 = 1103;
pub const PLAYER_STREAM_INFO: i32 = 1104;

pub const PUBLISHER_CONNECTING: i32 = 2000;
pub const PUBLISHER_PREVIEW_READY: i32 = 2001;
pub const PUBLISHER_STOPPED: i32 = 2002;
pub const PUBLISHER_ERROR: i32 = 2003;
pub const PUBLISHER_CONNECTION_STARTED: i32 = 2004;
pub const PUBLISHER_STREAM_CONNECTED: i32 = 2005;
pub const PUBLISHER_NETWORK_TIMEOUT: i32 = 2006;
pub const PUBLISHER_DISCONNECTED: i32 = 2007;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Player,
    Publisher,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connecting,

    /// Transport, handshake and the RTMP `connect` all succeeded
    Connected,

    /// The server accepted `play` or `publish`
    StreamStarted,

    PreviewReady,
    Reconnecting { attempt: u32, delay: Duration },

    /// Enough media is buffered and rendering has begun
    BufferReady,

    /// The playback buffer ran dry and is re-buffering
    Stalled,

    Recovered { stalled_for: Duration },
    Paused,
    Resumed,
    StreamInfo { metadata: StreamMetadata },

    /// The transport stopped making progress
    NetworkTimeout,

    /// The connection was lost and will not be retried
    Disconnected { reason: String },

    /// The session ended because `stop()` was called or the stream finished
    Stopped,

    /// The session could not be established
    Failed { reason: String },

    /// The session broke after the stream had started, in a way that is not retried
    Aborted { reason: String },
}

impl StreamEvent {
    pub fn code(&self, role: StreamRole) -> i32 {
        match role {
            StreamRole::Player => match self {
                StreamEvent::Connecting => PLAYER_CONNECTING,
                StreamEvent::Connected | StreamEvent::PreviewReady => PLAYER_CONNECTED,
                StreamEvent::StreamStarted => PLAYER_BUFFERING,
                StreamEvent::Reconnecting { .. } => PLAYER_RECONNECTING,
                StreamEvent::BufferReady | StreamEvent::Recovered { .. } | StreamEvent::Resumed => {
                    PLAYER_BUFFER_READY
                }
                StreamEvent::Stalled => PLAYER_BUFFER_EMPTY,
                StreamEvent::Paused => PLAYER_PAUSED,
                StreamEvent::StreamInfo { .. } => PLAYER_STREAM_INFO,
                StreamEvent::NetworkTimeout | StreamEvent::Disconnected { .. } | StreamEvent::Aborted { .. } => {
                    PLAYER_NETWORK_ERROR
                }
                StreamEvent::Stopped => PLAYER_STOPPED,
                StreamEvent::Failed { .. } => PLAYER_CONNECT_FAILED,
            },

            StreamRole::Publisher => match self {
                StreamEvent::Connecting => PUBLISHER_CONNECTING,
                StreamEvent::PreviewReady => PUBLISHER_PREVIEW_READY,
                StreamEvent::Connected | StreamEvent::Reconnecting { .. } => PUBLISHER_CONNECTION_STARTED,
                StreamEvent::NetworkTimeout => PUBLISHER_NETWORK_TIMEOUT,
                StreamEvent::Disconnected { .. } => PUBLISHER_DISCONNECTED,
                StreamEvent::Stopped => PUBLISHER_STOPPED,
                StreamEvent::Failed { .. } | StreamEvent::Aborted { .. } => PUBLISHER_ERROR,

                // Playback only events never come from a publisher
                StreamEvent::StreamStarted
                | StreamEvent::BufferReady
                | StreamEvent::Stalled
                | StreamEvent::Recovered { .. }
                | StreamEvent::Paused
                | StreamEvent::Resumed
                | StreamEvent::StreamInfo { .. } => PUBLISHER_STREAM_CONNECTED,
            },
        }
    }

    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Stopped
                | StreamEvent::Failed { .. }
                | StreamEvent::Aborted { .. }
                | StreamEvent::Disconnected { .. }
        )
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEvent::Connecting => write!(f, "Connecting"),
            StreamEvent::Connected => write!(f, "Connected"),
            StreamEvent::StreamStarted => write!(f, "Stream connected"),
            StreamEvent::PreviewReady => write!(f, "Preview ready"),
            StreamEvent::Reconnecting { attempt, delay } => {
                write!(f, "Reconnecting (attempt {}) in {}ms", attempt, delay.as_millis())
            }
            StreamEvent::BufferReady => write!(f, "Buffer ready"),
            StreamEvent::Stalled => write!(f, "Buffer empty"),
            StreamEvent::Recovered { stalled_for } => {
                write!(f, "Playback recovered after {}ms", stalled_for.as_millis())
            }
            StreamEvent::Paused => write!(f, "Playback paused"),
            StreamEvent::Resumed => write!(f, "Playback resumed"),
            StreamEvent::StreamInfo { metadata } => match (metadata.video_width, metadata.video_height) {
                (Some(width), Some(height)) => write!(f, "Stream info {}x{}", width, height),
                _ => write!(f, "Stream info"),
            },
            StreamEvent::NetworkTimeout => write!(f, "Network timeout"),
            StreamEvent::Disconnected { reason } => write!(f, "Disconnected: {}", reason),
            StreamEvent::Stopped => write!(f, "Stopped"),
            StreamEvent::Failed { reason } => write!(f, "Error: {}", reason),
            StreamEvent::Aborted { reason } => write!(f, "Stream aborted: {}", reason),
        }
    }
}

/// What the host receives: the numeric code, a human readable message and the typed event
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub code: i32,
    pub message: String,
    pub event: StreamEvent,
}

impl ChangeEvent {
    pub fn new(role: StreamRole, event: StreamEvent) -> ChangeEvent {
        ChangeEvent {
            code: event.code(role),
            message: event.to_string(),
            event,
        }
    }
}

pub type EventListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

enum Dispatch {
    Event(ChangeEvent),
    Flush(oneshot::Sender<()>),
}

/// Raises events for one role.  Cheap to clone, and sending never blocks.
#[derive(Clone)]
pub struct EventSender {
    role: StreamRole,
    sender: mpsc::UnboundedSender<Dispatch>,
}

impl EventSender {
    pub fn send(&self, event: StreamEvent) {
        let change = ChangeEvent::new(self.role, event);
        debug!(code = change.code, message = %change.message, "Raising change event");
        if self.sender.send(Dispatch::Event(change)).is_err() {
            warn!("Event dispatcher is gone, dropping change event");
        }
    }

    pub fn role(&self) -> StreamRole {
        self.role
    }
}

/// Owns the task that hands events to the listener
pub struct EventDispatcher {
    sender: mpsc::UnboundedSender<Dispatch>,
    listener: Arc<Mutex<Option<EventListener>>>,
    task: JoinHandle<()>,
}

impl EventDispatcher {
    pub fn spawn(handle: &Handle) -> EventDispatcher {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let listener: Arc<Mutex<Option<EventListener>>> = Arc::new(Mutex::new(None));
        let task_listener = listener.clone();

        let task = handle.spawn(async move {
            while let Some(dispatch) = receiver.recv().await {
                match dispatch {
                    Dispatch::Event(event) => {
                        let listener = task_listener
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .clone();

                        if let Some(listener) = listener {
                            listener(&event);
                        }
                    }

                    Dispatch::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        EventDispatcher {
            sender,
            listener,
            task,
        }
    }

    pub fn set_listener(&self, listener: Option<EventListener>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn sender(&self, role: StreamRole) -> EventSender {
        EventSender {
            role,
            sender: self.sender.clone(),
        }
    }

    /// Waits until every event raised so far has been handed to the listener
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Dispatch::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
