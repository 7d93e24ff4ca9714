use super::{status, ViewCore};
use crate::config::{validate_volume, ConfigError, PlayerSettings};
use crate::device::DeviceProvider;
use crate::engine::{EngineContext, PlayerSession, ResourceTracker};
use crate::errors::StreamError;
use crate::events::{ChangeEvent, StreamRole};
use crate::transport::{NetworkOptions, TcpConnector};
use std::sync::Arc;
use tracing::info;

/// Plays an RTMP stream into a sink supplied by the host.
///
/// Settings are changed through [`PlayerView::update_settings()`] while stopped, then
/// `start()` validates them into an immutable snapshot for the session.  Every operation returns
/// `0` on success or a negative [`StreamError`] status code.
pub struct PlayerView {
    settings: PlayerSettings,
    session: Option<PlayerSession>,
    core: ViewCore,
}

impl PlayerView {
    /// A player connecting over TCP (and TLS for `rtmps` urls with the platform's roots
    /// configured through [`PlayerView::with_context()`])
    pub fn new(devices: Arc<dyn DeviceProvider>) -> Result<PlayerView, StreamError> {
        let connector = Arc::new(TcpConnector::new(&NetworkOptions::new()));
        PlayerView::with_context(EngineContext::new(connector, devices))
    }

    pub fn with_context(context: EngineContext) -> Result<PlayerView, StreamError> {
        Ok(PlayerView {
            settings: PlayerSettings::new(),
            session: None,
            core: ViewCore::new(context, StreamRole::Player)?,
        })
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Changes settings for the next `start()`.  Rejected while a session is active.
    pub fn update_settings<F>(&mut self, update: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerSettings),
    {
        if self.is_active() {
            return Err(ConfigError::SessionActive);
        }

        update(&mut self.settings);
        Ok(())
    }

    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.core.set_listener(listener);
    }

    pub fn clear_listener(&self) {
        self.core.clear_listener();
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().map_or(false, |session| !session.is_finished())
    }

    pub fn resources(&self) -> &ResourceTracker {
        self.core.resources()
    }

    pub fn start(&mut self) -> i32 {
        let result = self.try_start();
        status("start", result)
    }

    /// Stops playback and releases the connection and sink.  Once this returns no further
    /// change events are raised.  Calling it again is harmless.
    pub fn stop(&mut self) -> i32 {
        if let Some(session) = self.session.take() {
            info!("Stopping player");
            self.core.runtime.block_on(session.stop());
        }

        self.core.flush_events();
        status("stop", Ok(()))
    }

    pub fn pause(&mut self) -> i32 {
        let result = self.active_session().and_then(PlayerSession::pause);
        status("pause", result)
    }

    /// Resumes after `pause()`, or starts rendering when autoplay is off
    pub fn resume(&mut self) -> i32 {
        let result = self.active_session().and_then(PlayerSession::resume);
        status("resume", result)
    }

    /// Volume only affects the sink, so unlike other settings it can change mid-session
    pub fn set_volume(&mut self, volume: f32) -> i32 {
        let result = validate_volume(volume)
            .map_err(StreamError::from)
            .and_then(|volume| {
                self.settings.volume = volume;
                match self.session.as_ref() {
                    Some(session) if !session.is_finished() => session.set_volume(volume),
                    _ => Ok(()),
                }
            });

        status("set_volume", result)
    }

    fn try_start(&mut self) -> Result<(), StreamError> {
        if self.is_active() {
            return Err(StreamError::AlreadyActive);
        }

        // A session that ended on its own still needs reaping
        if let Some(finished) = self.session.take() {
            self.core.runtime.block_on(finished.stop());
        }

        let config = self.settings.validate()?;
        info!(endpoint = %config.endpoint, "Starting player");

        let session = PlayerSession::start(
            self.core.runtime.handle(),
            self.core.context.clone(),
            config,
            self.core.events(),
        )?;

        self.session = Some(session);
        Ok(())
    }

    fn active_session(&self) -> Result<&PlayerSession, StreamError> {
        self.session
            .as_ref()
            .filter(|session| !session.is_finished())
            .ok_or(StreamError::NotActive)
    }
}

impl Drop for PlayerView {
    fn drop(&mut self) {
        self.stop();
    }
}
