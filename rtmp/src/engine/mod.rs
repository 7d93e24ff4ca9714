//! Runtime orchestration of players and publishers.
//!
//! Each session is made of a control task on the tokio runtime that owns the connection and
//! drives the client session state machine, plus the media side: a capture thread feeding the
//! [`SendQueue`](crate::pipeline::SendQueue) for publishers, or a render task draining the
//! [`PlaybackBuffer`](crate::pipeline::PlaybackBuffer) for players.  Stopping cancels the control
//! task, which closes the connection and releases the media side before raising its terminal
//! event.

mod capture;
mod connection;
mod player;
mod publisher;
mod reconnect;
mod resources;

pub use self::capture::{CaptureController, CaptureHandle};
pub use self::connection::RtmpConnection;
pub use self::player::PlayerSession;
pub use self::publisher::PublisherSession;
pub use self::reconnect::ReconnectPolicy;
pub use self::resources::{ResourceKind, ResourceTracker, Tracked};

use crate::auth::{StreamAuthenticator, StreamKeyParameter};
use crate::device::DeviceProvider;
use crate::transport::Connector;
use std::sync::Arc;

/// The platform capabilities a session runs against
#[derive(Clone)]
pub struct EngineContext {
    pub connector: Arc<dyn Connector>,
    pub devices: Arc<dyn DeviceProvider>,
    pub authenticator: Arc<dyn StreamAuthenticator>,
    pub resources: ResourceTracker,
}

impl EngineContext {
    /// Uses the default crypto key strategy, passing the key as a `key` query parameter
    pub fn new(connector: Arc<dyn Connector>, devices: Arc<dyn DeviceProvider>) -> EngineContext {
        EngineContext {
            connector,
            devices,
            authenticator: Arc::new(StreamKeyParameter::default()),
            resources: ResourceTracker::new(),
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn StreamAuthenticator>) -> EngineContext {
        self.authenticator = authenticator;
        self
    }
}
