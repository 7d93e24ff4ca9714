use super::capture::CaptureHandle;
use super::connection::RtmpConnection;
use super::reconnect::Reconnector;
use super::EngineContext;
use crate::config::PublisherConfig;
use crate::errors::StreamError;
use crate::events::{EventSender, StreamEvent};
use crate::media::{MediaFrame, MediaKind, StreamMetadata};
use crate::pipeline::SendQueue;
use crate::sessions::ClientSessionEvent;
use crate::transport::TransportError;
use leaky_bucket::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// A running publish: one control task that connects, streams the send queue to the server, and
/// reconnects within policy.
///
/// The task raises exactly one terminal event (`Stopped`, `Failed`, `Aborted` or `Disconnected`)
/// before it exits.
pub struct PublisherSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Publish {
    context: EngineContext,
    config: PublisherConfig,
    stream_name: String,
    metadata: StreamMetadata,
    queue: Arc<SendQueue>,
    capture: CaptureHandle,
    events: EventSender,
    cancel: CancellationToken,
    limiter: RateLimiter,
    limiter_max: usize,
    audio_header: Option<MediaFrame>,
    video_header: Option<MediaFrame>,
}

enum Finish {
    Cancelled,
    SourceEnded,
}

impl PublisherSession {
    pub fn start(
        runtime: &Handle,
        context: EngineContext,
        config: PublisherConfig,
        queue: Arc<SendQueue>,
        capture: CaptureHandle,
        events: EventSender,
    ) -> PublisherSession {
        let cancel = CancellationToken::new();
        let stream_name = context
            .authenticator
            .stream_name(&config.endpoint.stream_key, &config.crypto_key);

        let rate = config.pacing_bytes_per_second().max(1);
        let limiter = RateLimiter::builder()
            .initial(rate)
            .refill(rate)
            .interval(Duration::from_secs(1))
            .max(rate)
            .build();

        let span = info_span!("publisher", endpoint = %config.endpoint);
        let publish = Publish {
            metadata: config.stream_metadata(),
            context,
            config,
            stream_name,
            queue,
            capture,
            events,
            cancel: cancel.clone(),
            limiter,
            limiter_max: rate,
            audio_header: None,
            video_header: None,
        };

        let task = runtime.spawn(publish.run().instrument(span));
        PublisherSession { cancel, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the session to stop and waits until its connection is closed
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            warn!(%error, "Publisher task did not shut down cleanly");
        }
    }
}

impl Publish {
    async fn run(mut self) {
        let mut reconnector = Reconnector::new(self.config.reconnect.clone());
        self.events.send(StreamEvent::Connecting);

        let terminal = loop {
            let error = match self.run_connection(&mut reconnector).await {
                Ok(Finish::Cancelled) => break StreamEvent::Stopped,
                Ok(Finish::SourceEnded) => match self.capture.failure() {
                    Some(reason) => break StreamEvent::Failed { reason },
                    None => break StreamEvent::Stopped,
                },

                Err(error) => error,
            };

            let delay = match reconnector.on_error(&error, &self.events) {
                Ok(delay) => delay,
                Err(terminal) => break terminal,
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break StreamEvent::Stopped,
                _ = sleep(delay) => (),
            }

            let discarded = self.queue.discard_until_key_frame();
            debug!(discarded, "Discarded frames queued before the reconnect");
            self.capture.request_key_frame();
        };

        self.queue.close();
        let stats = self.queue.stats();
        info!(
            video_queued = stats.video_queued,
            video_dropped = stats.video_dropped,
            audio_queued = stats.audio_queued,
            audio_dropped = stats.audio_dropped,
            "Publisher finished"
        );

        self.events.send(terminal);
    }

    async fn run_connection(&mut self, reconnector: &mut Reconnector) -> Result<Finish, StreamError> {
        let connecting = connect(
            &self.context,
            &self.config,
            self.stream_name.clone(),
            &self.events,
        );

        let mut connection = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(Finish::Cancelled),
            result = connecting => result?,
        };

        reconnector.stream_started();
        self.events.send(StreamEvent::StreamStarted);

        connection.publish_metadata(&self.metadata).await?;
        if let Some(header) = self.audio_header.clone() {
            connection.publish_frame(&header).await?;
        }

        if let Some(header) = self.video_header.clone() {
            connection.publish_frame(&header).await?;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    connection.close(true).await;
                    return Ok(Finish::Cancelled);
                }

                frame = self.queue.pop() => {
                    let frame = match frame {
                        Some(frame) => frame,
                        None => {
                            connection.close(true).await;
                            return Ok(Finish::SourceEnded);
                        }
                    };

                    self.remember_header(&frame);

                    let permits = frame.data().len().clamp(1, self.limiter_max);
                    self.limiter.acquire(permits).await;
                    connection.publish_frame(&frame).await?;
                }

                result = connection.read() => {
                    match result {
                        Ok(()) => (),

                        // Servers rarely send anything to a publisher
                        Err(TransportError::Timeout { .. }) => continue,
                        Err(error) => return Err(error.into()),
                    }

                    for event in connection.process_input().await? {
                        handle_server_event(event)?;
                    }
                }
            }
        }
    }

    fn remember_header(&mut self, frame: &MediaFrame) {
        if frame.is_sequence_header() {
            match frame.kind() {
                MediaKind::Audio => self.audio_header = Some(frame.clone()),
                MediaKind::Video => self.video_header = Some(frame.clone()),
            }
        }
    }
}

async fn connect(
    context: &EngineContext,
    config: &PublisherConfig,
    stream_name: String,
    events: &EventSender,
) -> Result<RtmpConnection, StreamError> {
    let mut connection = RtmpConnection::open(
        context.connector.as_ref(),
        &config.endpoint,
        config.session.clone(),
        &config.network,
        &context.resources,
    )
    .await?;

    events.send(StreamEvent::Connected);
    connection.request_publishing(stream_name).await?;
    info!("Publishing accepted");

    Ok(connection)
}

fn handle_server_event(event: ClientSessionEvent) -> Result<(), StreamError> {
    match event {
        ClientSessionEvent::StreamStatus { status } if status.is_error() => Err(StreamError::Rejected {
            description: status.description,
        }),

        ClientSessionEvent::ConnectionClosed => Err(TransportError::ConnectionReset.into()),
        event => {
            debug!(?event, "Server event while publishing");
            Ok(())
        }
    }
}
