use super::{status, ViewCore};
use crate::config::{ConfigError, PublisherSettings};
use crate::device::DeviceProvider;
use crate::engine::{CaptureController, EngineContext, PublisherSession, ResourceKind, ResourceTracker};
use crate::errors::StreamError;
use crate::events::{ChangeEvent, StreamEvent, StreamRole};
use crate::pipeline::SendQueue;
use crate::transport::{NetworkOptions, TcpConnector};
use std::sync::Arc;
use tracing::info;

/// Captures, encodes and publishes to an RTMP server.
///
/// Preview and publishing are independent: a preview can run without a url, publishing can run
/// without a preview, and both share the same capture when running together.  The capture is
/// released once neither needs it.
pub struct PublisherView {
    settings: PublisherSettings,
    capture: Option<CaptureController>,
    session: Option<PublisherSession>,
    core: ViewCore,
}

impl PublisherView {
    pub fn new(devices: Arc<dyn DeviceProvider>) -> Result<PublisherView, StreamError> {
        let connector = Arc::new(TcpConnector::new(&NetworkOptions::new()));
        PublisherView::with_context(EngineContext::new(connector, devices))
    }

    pub fn with_context(context: EngineContext) -> Result<PublisherView, StreamError> {
        Ok(PublisherView {
            settings: PublisherSettings::new(),
            capture: None,
            session: None,
            core: ViewCore::new(context, StreamRole::Publisher)?,
        })
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.settings
    }

    /// Changes settings for the next `start()` or `start_preview()`.  Rejected while either is
    /// running.
    pub fn update_settings<F>(&mut self, update: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PublisherSettings),
    {
        if self.is_publishing() || self.is_previewing() {
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

    pub fn is_publishing(&self) -> bool {
        self.session.as_ref().map_or(false, |session| !session.is_finished())
    }

    pub fn is_previewing(&self) -> bool {
        self.capture.as_ref().map_or(false, CaptureController::has_preview)
    }

    pub fn resources(&self) -> &ResourceTracker {
        self.core.resources()
    }

    pub fn start(&mut self) -> i32 {
        let result = self.try_start();
        if result.is_err() {
            self.release_capture_if_unused();
        }

        status("start", result)
    }

    /// Stops publishing and closes the connection.  The capture keeps running if a preview is
    /// still shown.  Once this returns no further change events are raised.
    pub fn stop(&mut self) -> i32 {
        self.stop_session();
        self.release_capture_if_unused();
        self.core.flush_events();
        status("stop", Ok(()))
    }

    pub fn start_preview(&mut self) -> i32 {
        let result = self.try_start_preview();
        if result.is_err() {
            self.release_capture_if_unused();
        }

        status("start_preview", result)
    }

    pub fn stop_preview(&mut self) -> i32 {
        if let Some(capture) = self.capture.as_ref() {
            if capture.clear_preview() {
                info!("Preview stopped");
            }
        }

        self.release_capture_if_unused();
        status("stop_preview", Ok(()))
    }

    fn try_start(&mut self) -> Result<(), StreamError> {
        if self.is_publishing() {
            return Err(StreamError::AlreadyActive);
        }

        // A session that ended on its own still needs reaping
        self.stop_session();

        let config = self.settings.validate()?;
        info!(endpoint = %config.endpoint, "Starting publisher");

        if self.capture.is_none() {
            self.capture = Some(CaptureController::start(
                self.core.context.devices.as_ref(),
                &config.capture,
                &config.encoder,
                &self.core.context.resources,
            )?);
        }

        let capture = self.capture.as_ref().ok_or(StreamError::NotActive)?;
        let queue = Arc::new(SendQueue::new(config.send_queue.clone()));
        capture.attach_queue(queue.clone());

        let session = PublisherSession::start(
            self.core.runtime.handle(),
            self.core.context.clone(),
            config,
            queue,
            capture.handle(),
            self.core.events(),
        );

        self.session = Some(session);
        Ok(())
    }

    fn try_start_preview(&mut self) -> Result<(), StreamError> {
        if self.is_previewing() {
            return Err(StreamError::AlreadyActive);
        }

        let capture_config = self.settings.validate_capture()?;
        if self.capture.is_none() {
            let encoder_config = self.settings.validate_encoder()?;
            self.capture = Some(CaptureController::start(
                self.core.context.devices.as_ref(),
                &capture_config,
                &encoder_config,
                &self.core.context.resources,
            )?);
        }

        let preview = self.core.context.devices.open_preview(&capture_config)?;
        let preview = self.core.context.resources.track(ResourceKind::Preview, preview);
        if let Some(capture) = self.capture.as_ref() {
            capture.set_preview(preview);
        }

        info!("Preview started");
        self.core.events().send(StreamEvent::PreviewReady);
        Ok(())
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Stopping publisher");
            self.core.runtime.block_on(session.stop());
        }

        if let Some(capture) = self.capture.as_ref() {
            if let Some(queue) = capture.detach_queue() {
                queue.close();
            }
        }
    }

    /// Stops the capture once neither a preview nor a session needs it.  Joining the capture
    /// thread blocks, so this runs outside the runtime.
    fn release_capture_if_unused(&mut self) {
        if self.is_previewing() || self.session.is_some() {
            return;
        }

        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
    }
}

impl Drop for PublisherView {
    fn drop(&mut self) {
        self.stop_session();
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }

        self.core.flush_events();
    }
}
