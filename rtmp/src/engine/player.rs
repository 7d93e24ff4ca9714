use super::connection::RtmpConnection;
use super::reconnect::Reconnector;
use super::resources::{ResourceKind, Tracked};
use super::EngineContext;
use crate::config::PlayerConfig;
use crate::device::{MediaSink, RenderOptions};
use crate::errors::StreamError;
use crate::events::{EventSender, StreamEvent};
use crate::media::{MediaFrame, StreamMetadata};
use crate::pipeline::{BufferEvent, BufferState, PlaybackBuffer};
use crate::sessions::ClientSessionEvent;
use crate::time::RtmpTimestamp;
use crate::transport::TransportError;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

const RENDER_TICK: Duration = Duration::from_millis(10);
const RENDER_QUEUE_SIZE: usize = 256;

/// A running playback.
///
/// The control task owns the connection and feeds received media to a render task, which owns
/// the playback buffer and the sink.  Pausing and resuming are forwarded to both.
pub struct PlayerSession {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<PlayerCommand>,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlayerCommand {
    Pause,
    Resume,
    SetVolume(f32),
}

#[derive(Debug)]
enum RenderInput {
    Frame(MediaFrame),
    Metadata(StreamMetadata),
    Pause,
    Resume,
    SetVolume(f32),

    /// The stream restarted on a new connection
    Restart,
}

type RenderTask = JoinHandle<Result<(), StreamError>>;

struct Playback {
    context: EngineContext,
    config: PlayerConfig,
    stream_name: String,
    events: EventSender,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    render_input: mpsc::Sender<RenderInput>,
    render_task: Option<RenderTask>,
    last_timestamp: RtmpTimestamp,
}

enum Finish {
    Cancelled,
    StreamEnded,
}

impl PlayerSession {
    /// Opens the sink and starts connecting.  Fails only if the sink cannot be opened.
    pub fn start(
        runtime: &Handle,
        context: EngineContext,
        config: PlayerConfig,
        events: EventSender,
    ) -> Result<PlayerSession, StreamError> {
        let options = RenderOptions {
            scale_mode: config.scale_mode,
            volume: config.volume,
            hw_accel_enable: config.hw_accel_enable,
        };

        let sink = context.devices.open_sink(&options)?;
        let sink = context.resources.track(ResourceKind::Sink, sink);

        let cancel = CancellationToken::new();
        let (render_input, render_receiver) = mpsc::channel(RENDER_QUEUE_SIZE);
        let renderer = Renderer {
            buffer: PlaybackBuffer::new(config.buffer.clone()),
            sink,
            events: events.clone(),
            started_at: Instant::now(),
        };

        let span = info_span!("player", endpoint = %config.endpoint);
        let render_task = runtime.spawn(
            renderer
                .run(render_receiver, cancel.child_token())
                .instrument(span.clone()),
        );

        let (commands, command_receiver) = mpsc::unbounded_channel();
        let playback = Playback {
            stream_name: context
                .authenticator
                .stream_name(&config.endpoint.stream_key, &config.crypto_key),
            context,
            config,
            events,
            cancel: cancel.clone(),
            commands: command_receiver,
            render_input,
            render_task: Some(render_task),
            last_timestamp: RtmpTimestamp::new(0),
        };

        let task = runtime.spawn(playback.run().instrument(span));
        Ok(PlayerSession {
            cancel,
            commands,
            task,
        })
    }

    /// Holds rendering and asks the server to pause the stream
    pub fn pause(&self) -> Result<(), StreamError> {
        self.command(PlayerCommand::Pause)
    }

    /// Resumes a paused stream, or starts one that is buffered but waiting because autoplay
    /// is off
    pub fn resume(&self) -> Result<(), StreamError> {
        self.command(PlayerCommand::Resume)
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), StreamError> {
        self.command(PlayerCommand::SetVolume(volume))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the session to stop and waits until the connection and sink are released
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            warn!(%error, "Player task did not shut down cleanly");
        }
    }

    fn command(&self, command: PlayerCommand) -> Result<(), StreamError> {
        self.commands.send(command).map_err(|_| StreamError::NotActive)
    }
}

impl Playback {
    async fn run(mut self) {
        let mut reconnector = Reconnector::new(self.config.reconnect.clone());
        self.events.send(StreamEvent::Connecting);

        let terminal = loop {
            let error = match self.run_connection(&mut reconnector).await {
                Ok(Finish::Cancelled) => break StreamEvent::Stopped,
                Ok(Finish::StreamEnded) => {
                    info!("Stream ended");
                    break StreamEvent::Stopped;
                }

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

            if self.render_input.send(RenderInput::Restart).await.is_err() {
                break StreamEvent::Stopped;
            }
        };

        // The render task exits with the token, releasing the sink before the terminal event
        self.cancel.cancel();
        if let Some(render_task) = self.render_task.take() {
            match render_task.await {
                Ok(Ok(())) => (),
                Ok(Err(error)) => warn!(%error, "Renderer failed while stopping"),
                Err(error) => error!(%error, "Render task panicked"),
            }
        }

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

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    connection.close(false).await;
                    return Ok(Finish::Cancelled);
                }

                result = wait_for_render_task(&mut self.render_task) => {
                    result?;
                    connection.close(false).await;
                    return Ok(Finish::Cancelled);
                }

                Some(command) = self.commands.recv() => {
                    self.handle_command(&mut connection, command).await?;
                }

                result = connection.read() => {
                    result?;
                    for event in connection.process_input().await? {
                        if let Some(finish) = self.handle_server_event(event).await? {
                            connection.close(false).await;
                            return Ok(finish);
                        }
                    }
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        connection: &mut RtmpConnection,
        command: PlayerCommand,
    ) -> Result<(), StreamError> {
        let input = match command {
            PlayerCommand::Pause => {
                connection.request_pause(true, self.last_timestamp).await?;
                RenderInput::Pause
            }

            PlayerCommand::Resume => {
                connection.request_pause(false, self.last_timestamp).await?;
                RenderInput::Resume
            }

            PlayerCommand::SetVolume(volume) => RenderInput::SetVolume(volume),
        };

        self.render(input).await
    }

    async fn handle_server_event(&mut self, event: ClientSessionEvent) -> Result<Option<Finish>, StreamError> {
        match event {
            ClientSessionEvent::MediaFrameReceived { frame } => {
                self.last_timestamp = frame.timestamp();
                self.render(RenderInput::Frame(frame)).await?;
            }

            ClientSessionEvent::StreamMetadataReceived { metadata } => {
                self.events.send(StreamEvent::StreamInfo {
                    metadata: metadata.clone(),
                });

                self.render(RenderInput::Metadata(metadata)).await?;
            }

            ClientSessionEvent::StreamEnded => return Ok(Some(Finish::StreamEnded)),
            ClientSessionEvent::ConnectionClosed => return Err(TransportError::ConnectionReset.into()),
            ClientSessionEvent::StreamStatus { status } if status.is_error() => {
                return Err(StreamError::Rejected {
                    description: status.description,
                });
            }

            event => debug!(?event, "Server event while playing"),
        }

        Ok(None)
    }

    async fn render(&self, input: RenderInput) -> Result<(), StreamError> {
        self.render_input.send(input).await.map_err(|_| StreamError::Runtime {
            reason: "renderer is gone".to_string(),
        })
    }
}

async fn connect(
    context: &EngineContext,
    config: &PlayerConfig,
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
    connection.request_playback(stream_name).await?;
    info!("Playback accepted");

    Ok(connection)
}

/// Resolves when the render task exits, and never once it has been reaped
async fn wait_for_render_task(task: &mut Option<RenderTask>) -> Result<(), StreamError> {
    let handle = match task.as_mut() {
        Some(handle) => handle,
        None => return std::future::pending().await,
    };

    let result = handle.await;
    *task = None;
    match result {
        Ok(result) => result,
        Err(error) => Err(StreamError::Runtime {
            reason: format!("render task failed: {}", error),
        }),
    }
}

/// Releases buffered frames to the sink on the playback clock
struct Renderer {
    buffer: PlaybackBuffer,
    sink: Tracked<Box<dyn MediaSink>>,
    events: EventSender,
    started_at: Instant,
}

impl Renderer {
    async fn run(mut self, mut input: mpsc::Receiver<RenderInput>, cancel: CancellationToken) -> Result<(), StreamError> {
        let mut ticker = interval(RENDER_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                received = input.recv() => match received {
                    Some(received) => {
                        if let Err(error) = self.handle_input(received) {
                            break Err(error);
                        }
                    }

                    None => break Ok(()),
                },

                _ = ticker.tick() => {
                    if let Err(error) = self.render_due() {
                        break Err(error);
                    }
                }
            }
        };

        self.sink.close();
        debug!(dropped = self.buffer.dropped_frames(), "Renderer stopped");
        result
    }

    fn now_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn handle_input(&mut self, input: RenderInput) -> Result<(), StreamError> {
        let now = self.now_ms();
        match input {
            RenderInput::Frame(frame) => {
                if let Some(event) = self.buffer.push(frame, now) {
                    self.report(event);
                }
            }

            RenderInput::Metadata(metadata) => self.sink.configure(&metadata)?,
            RenderInput::Pause => {
                if self.buffer.pause(now) {
                    self.events.send(StreamEvent::Paused);
                }
            }

            RenderInput::Resume => {
                if self.buffer.state() == BufferState::Ready {
                    if let Some(event) = self.buffer.play(now) {
                        self.report(event);
                    }
                } else if self.buffer.resume(now) {
                    self.events.send(StreamEvent::Resumed);
                }
            }

            RenderInput::SetVolume(volume) => self.sink.set_volume(volume),
            RenderInput::Restart => self.buffer.clear(),
        }

        Ok(())
    }

    fn render_due(&mut self) -> Result<(), StreamError> {
        let (frames, event) = self.buffer.pop_due(self.now_ms());
        for frame in &frames {
            self.sink.render(frame)?;
        }

        if let Some(event) = event {
            self.report(event);
        }

        Ok(())
    }

    fn report(&self, event: BufferEvent) {
        match event {
            BufferEvent::Started | BufferEvent::Ready => self.events.send(StreamEvent::BufferReady),
            BufferEvent::Stalled => self.events.send(StreamEvent::Stalled),
            BufferEvent::Recovered { stalled_for_ms } => self.events.send(StreamEvent::Recovered {
                stalled_for: Duration::from_millis(stalled_for_ms),
            }),

            BufferEvent::CaughtUp { dropped } => debug!(dropped, "Skipped ahead to stay within max buffer time"),
        }
    }
}
