use super::resources::{ResourceKind, ResourceTracker, Tracked};
use crate::config::{CaptureConfig, EncoderConfig};
use crate::device::{DeviceProvider, MediaSource, PreviewSurface};
use crate::errors::StreamError;
use crate::media::{EncodeError, MediaFrame, MediaKind};
use crate::pipeline::{KeyFrameScheduler, PushOutcome, SendQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Runs the blocking capture and encode loop on its own thread.
///
/// Frames go to the preview surface (when previewing) and to the attached send queue (when
/// publishing).  Preview and publishing can come and go independently while the thread keeps
/// running.
pub struct CaptureController {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

/// What the network side may ask of a running capture
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<CaptureState>,
    stopping: AtomicBool,
    key_frame_wanted: AtomicBool,
}

#[derive(Default)]
struct CaptureState {
    preview: Option<Tracked<Box<dyn PreviewSurface>>>,
    queue: Option<Arc<SendQueue>>,
    audio_header: Option<MediaFrame>,
    video_header: Option<MediaFrame>,
    finished: bool,
    failure: Option<String>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CaptureController {
    /// Opens the media source and starts pulling frames from it
    pub fn start(
        devices: &dyn DeviceProvider,
        capture: &CaptureConfig,
        encoder: &EncoderConfig,
        resources: &ResourceTracker,
    ) -> Result<CaptureController, StreamError> {
        let source = devices.open_source(capture, encoder)?;
        let source = resources.track(ResourceKind::Source, source);
        let scheduler = KeyFrameScheduler::new(encoder.key_frame_interval_ms, encoder.video.frame_interval_ms());

        let shared = Arc::new(Shared {
            state: Mutex::new(CaptureState::default()),
            stopping: AtomicBool::new(false),
            key_frame_wanted: AtomicBool::new(false),
        });

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("rtmp-capture".to_string())
            .spawn(move || run(source, scheduler, thread_shared))
            .map_err(|error| StreamError::Runtime {
                reason: format!("failed to spawn capture thread: {}", error),
            })?;

        info!(
            width = capture.width,
            height = capture.height,
            fps = capture.fps,
            key_frame_interval_ms = encoder.key_frame_interval_ms,
            "Capture started"
        );

        Ok(CaptureController {
            shared,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: self.shared.clone(),
        }
    }

    /// Starts feeding the queue.  Sequence headers seen so far are queued first, and the
    /// encoder is asked for a key frame so the server can start decoding right away.
    pub fn attach_queue(&self, queue: Arc<SendQueue>) {
        let mut state = self.shared.lock();
        if state.finished {
            queue.close();
        } else {
            for header in state.audio_header.iter().chain(state.video_header.iter()) {
                queue.push(header.clone());
            }

            // Joining mid-stream, so the server's first picture has to be a key frame
            queue.discard_until_key_frame();
        }

        state.queue = Some(queue);
        drop(state);

        self.request_key_frame();
    }

    pub fn detach_queue(&self) -> Option<Arc<SendQueue>> {
        self.shared.lock().queue.take()
    }

    pub fn set_preview(&self, preview: Tracked<Box<dyn PreviewSurface>>) {
        let previous = self.shared.lock().preview.replace(preview);
        if let Some(mut previous) = previous {
            previous.close();
        }
    }

    pub fn clear_preview(&self) -> bool {
        let preview = self.shared.lock().preview.take();
        match preview {
            Some(mut preview) => {
                preview.close();
                true
            }

            None => false,
        }
    }

    pub fn has_preview(&self) -> bool {
        self.shared.lock().preview.is_some()
    }

    pub fn request_key_frame(&self) {
        self.handle().request_key_frame();
    }

    /// Stops the capture thread and waits for it to release the source.  Blocks for at most one
    /// frame interval plus the send queue's block timeout.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let queue = self.shared.lock().queue.take();
        if let Some(queue) = queue {
            queue.close();
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked");
            }
        }

        self.clear_preview();
        debug!("Capture stopped");
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

impl CaptureHandle {
    /// Asks the encoder for a key frame before its next frame
    pub fn request_key_frame(&self) {
        self.shared.key_frame_wanted.store(true, Ordering::SeqCst);
    }

    /// Why the source stopped producing frames, if it failed
    pub fn failure(&self) -> Option<String> {
        self.shared.lock().failure.clone()
    }
}

fn run(mut source: Tracked<Box<dyn MediaSource>>, mut scheduler: KeyFrameScheduler, shared: Arc<Shared>) {
    let failure = loop {
        if shared.stopping.load(Ordering::SeqCst) {
            break None;
        }

        if shared.key_frame_wanted.swap(false, Ordering::SeqCst) {
            source.request_key_frame();
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Media source ended");
                break None;
            }

            Err(error) => {
                error!(%error, "Media source failed");
                break Some(error);
            }
        };

        if frame.kind() == MediaKind::Video
            && !frame.is_sequence_header()
            && scheduler.observe(u64::from(frame.timestamp().value), frame.is_key_frame())
        {
            trace!(timestamp = frame.timestamp().value, "Requesting key frame");
            source.request_key_frame();
        }

        let queue = {
            let mut state = shared.lock();
            if frame.is_sequence_header() {
                match frame.kind() {
                    MediaKind::Audio => state.audio_header = Some(frame.clone()),
                    MediaKind::Video => state.video_header = Some(frame.clone()),
                }
            } else if frame.kind() == MediaKind::Video {
                if let Some(preview) = state.preview.as_mut() {
                    preview.present(&frame);
                }
            }

            state.queue.clone()
        };

        if let Some(queue) = queue {
            match queue.push(frame) {
                PushOutcome::Queued | PushOutcome::QueuedAfterEviction { .. } | PushOutcome::Dropped => (),
                PushOutcome::TimedOut => {
                    warn!("Network is not keeping up, frame discarded");
                    source.request_key_frame();
                }

                PushOutcome::Closed => trace!("Send queue closed"),
            }
        }
    };

    source.close();

    let mut state = shared.lock();
    state.finished = true;
    state.failure = failure.map(|error: EncodeError| error.to_string());
    if let Some(queue) = state.queue.as_ref() {
        queue.close();
    }
}
