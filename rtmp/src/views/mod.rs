//! The caller facing surface: a player view and a publisher view, each configured through a
//! property bag and driven with `start()`/`stop()` style calls returning integer status codes.
//!
//! Views are meant to be driven from a host thread (the platform's UI thread, say), never from
//! inside the tokio runtime.  Each view owns a small runtime of its own, and every change event
//! is delivered on that runtime, so listeners must not assume any particular thread.

mod player_view;
mod publisher_view;

pub use self::player_view::PlayerView;
pub use self::publisher_view::PublisherView;

use crate::engine::{EngineContext, ResourceTracker};
use crate::errors::{StreamError, STATUS_OK};
use crate::events::{ChangeEvent, EventDispatcher, EventSender, StreamRole};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

/// What both views are built on: the runtime, the event dispatcher and the engine context
struct ViewCore {
    // Declared before the runtime so the dispatcher task is aborted while the runtime is alive
    dispatcher: EventDispatcher,
    context: EngineContext,
    role: StreamRole,
    runtime: Runtime,
}

impl ViewCore {
    fn new(context: EngineContext, role: StreamRole) -> Result<ViewCore, StreamError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("rtmp-stream")
            .enable_all()
            .build()
            .map_err(|error| StreamError::Runtime {
                reason: format!("failed to build runtime: {}", error),
            })?;

        let dispatcher = EventDispatcher::spawn(runtime.handle());
        Ok(ViewCore {
            dispatcher,
            context,
            role,
            runtime,
        })
    }

    fn events(&self) -> EventSender {
        self.dispatcher.sender(self.role)
    }

    fn set_listener<F>(&self, listener: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.dispatcher.set_listener(Some(Arc::new(listener)));
    }

    fn clear_listener(&self) {
        self.dispatcher.set_listener(None);
    }

    fn resources(&self) -> &ResourceTracker {
        &self.context.resources
    }

    /// Waits until every event raised so far has reached the listener
    fn flush_events(&self) {
        self.runtime.block_on(self.dispatcher.flush());
    }
}

/// Turns an operation's outcome into the status code handed back to the host
fn status(operation: &'static str, result: Result<(), StreamError>) -> i32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(error) => {
            warn!(operation, %error, code = error.status_code(), "Operation failed");
            error.status_code()
        }
    }
}
