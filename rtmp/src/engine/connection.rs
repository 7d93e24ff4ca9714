use super::resources::{ResourceKind, ResourceTracker, Tracked};
use crate::chunk_io::Packet;
use crate::errors::StreamError;
use crate::handshake::{Handshake, HandshakeError, HandshakeProcessResult, PeerType};
use crate::media::{MediaFrame, StreamMetadata};
use crate::sessions::{ClientSession, ClientSessionConfig, ClientSessionEvent, ClientSessionResult, PublishRequestType};
use crate::time::RtmpTimestamp;
use crate::transport::{Connector, Endpoint, NetworkOptions, Transport, TransportError};
use bytes::BytesMut;
use std::collections::VecDeque;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// An RTMP connection past the handshake and `connect`, ready to play or publish.
///
/// All of the connection's state (socket, chunk stream tables, session) lives here and is only
/// touched by the task that owns it.
pub struct RtmpConnection {
    transport: Tracked<Transport>,
    session: ClientSession,
    read_buffer: BytesMut,
    read_buffer_size: usize,
    pending_events: VecDeque<ClientSessionEvent>,
}

impl RtmpConnection {
    /// Opens the transport, performs the handshake and connects to the endpoint's application
    pub async fn open(
        connector: &dyn Connector,
        endpoint: &Endpoint,
        config: ClientSessionConfig,
        options: &NetworkOptions,
        resources: &ResourceTracker,
    ) -> Result<RtmpConnection, StreamError> {
        debug!(%endpoint, "Opening transport");
        let stream = connector.connect(endpoint).await?;
        let mut transport = resources.track(ResourceKind::Transport, Transport::new(stream, options));

        let millis = options.handshake_timeout.as_millis() as u64;
        let remaining_bytes = timeout(options.handshake_timeout, perform_handshake(&mut transport))
            .await
            .map_err(|_| HandshakeError::Timeout { millis })??;

        debug!("Handshake completed");

        let (session, results) = ClientSession::new(config)?;
        let mut connection = RtmpConnection {
            transport,
            session,
            read_buffer: BytesMut::with_capacity(options.read_buffer_size),
            read_buffer_size: options.read_buffer_size,
            pending_events: VecDeque::new(),
        };

        connection.handle_session_results(results).await?;
        if !remaining_bytes.is_empty() {
            let results = connection.session.handle_input(&remaining_bytes)?;
            connection.handle_session_results(results).await?;
        }

        let result = connection.session.request_connection(endpoint.app.clone())?;
        connection.handle_session_results(vec![result]).await?;

        match connection.wait_for(is_connect_response).await? {
            ClientSessionEvent::ConnectionRequestAccepted => {
                info!(app = %endpoint.app, "Connected to application");
                Ok(connection)
            }

            ClientSessionEvent::ConnectionRequestRejected { description } => {
                Err(StreamError::Rejected { description })
            }

            event => Err(unexpected(event)),
        }
    }

    pub async fn request_playback(&mut self, stream_name: String) -> Result<(), StreamError> {
        let result = self.session.request_playback(stream_name)?;
        self.handle_session_results(vec![result]).await?;

        match self.wait_for(is_play_response).await? {
            ClientSessionEvent::PlaybackRequestAccepted => Ok(()),
            ClientSessionEvent::PlaybackRequestRejected { description } => Err(StreamError::Rejected { description }),
            event => Err(unexpected(event)),
        }
    }

    pub async fn request_publishing(&mut self, stream_name: String) -> Result<(), StreamError> {
        let results = self.session.request_publishing(stream_name, PublishRequestType::Live)?;
        self.handle_session_results(results).await?;

        match self.wait_for(is_publish_response).await? {
            ClientSessionEvent::PublishRequestAccepted => Ok(()),
            ClientSessionEvent::PublishRequestRejected { description } => Err(StreamError::Rejected { description }),
            event => Err(unexpected(event)),
        }
    }

    pub async fn publish_frame(&mut self, frame: &MediaFrame) -> Result<(), StreamError> {
        let packet = self.session.publish_frame(frame)?;
        self.send_packet(packet).await
    }

    pub async fn publish_metadata(&mut self, metadata: &StreamMetadata) -> Result<(), StreamError> {
        let packet = self.session.publish_metadata(metadata)?;
        self.send_packet(packet).await
    }

    pub async fn request_pause(&mut self, paused: bool, position: RtmpTimestamp) -> Result<(), StreamError> {
        let packet = self.session.request_pause(paused, position)?;
        self.send_packet(packet).await
    }

    /// Politely ends playback or publishing.  Errors are logged, since the connection is about
    /// to be dropped anyway.
    pub async fn close(mut self, publishing: bool) {
        let results = match publishing {
            true => self.session.stop_publishing(),
            false => self.session.stop_playback(),
        };

        match results {
            Ok(results) => {
                if let Err(error) = self.handle_session_results(results).await {
                    debug!(%error, "Failed to send stream teardown");
                }
            }

            Err(error) => debug!(%error, "Stream was not active at teardown"),
        }

        self.transport.shutdown().await;
    }

    /// Reads whatever the server sent into the read buffer.  Cancellation safe, so it can be
    /// used as a `select!` branch; follow up with `process_input()`.
    pub async fn read(&mut self) -> Result<(), TransportError> {
        if self.read_buffer.capacity() - self.read_buffer.len() < self.read_buffer_size / 2 {
            self.read_buffer.reserve(self.read_buffer_size);
        }

        self.transport.read(&mut self.read_buffer).await?;
        Ok(())
    }

    /// Runs buffered input through the session, sends any responses, and returns the events
    /// the session raised
    pub async fn process_input(&mut self) -> Result<Vec<ClientSessionEvent>, StreamError> {
        let mut events: Vec<ClientSessionEvent> = self.pending_events.drain(..).collect();
        if !self.read_buffer.is_empty() {
            let bytes = self.read_buffer.split();
            let results = self.session.handle_input(&bytes)?;
            events.extend(self.handle_session_results(results).await?);
        }

        Ok(events)
    }

    pub fn bytes_written(&self) -> u64 {
        self.transport.bytes_written()
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), StreamError> {
        self.transport.write_all(&packet.bytes).await?;
        Ok(())
    }

    async fn handle_session_results(
        &mut self,
        results: Vec<ClientSessionResult>,
    ) -> Result<Vec<ClientSessionEvent>, StreamError> {
        let mut events = Vec::new();
        for result in results {
            match result {
                ClientSessionResult::OutboundResponse(packet) => self.send_packet(packet).await?,
                ClientSessionResult::RaisedEvent(event) => events.push(event),
                ClientSessionResult::UnhandleableMessageReceived(payload) => {
                    debug!(type_id = payload.type_id, "Unhandleable message received");
                }
            }
        }

        Ok(events)
    }

    /// Reads until the session raises an event matching `predicate`.  Other events are kept
    /// for the next `process_input()`.
    async fn wait_for(&mut self, predicate: fn(&ClientSessionEvent) -> bool) -> Result<ClientSessionEvent, StreamError> {
        loop {
            self.read().await?;
            let bytes = self.read_buffer.split();
            let results = self.session.handle_input(&bytes)?;
            let mut found = None;
            for event in self.handle_session_results(results).await? {
                match event {
                    ClientSessionEvent::ConnectionClosed => return Err(TransportError::ConnectionReset.into()),
                    event if found.is_none() && predicate(&event) => found = Some(event),
                    event => self.pending_events.push_back(event),
                }
            }

            if let Some(event) = found {
                return Ok(event);
            }
        }
    }
}

async fn perform_handshake(transport: &mut Transport) -> Result<Vec<u8>, StreamError> {
    let mut handshake = Handshake::new(PeerType::Client);
    let p0_and_p1 = handshake.generate_outbound_p0_and_p1()?;
    transport.write_all(&p0_and_p1).await?;

    let mut buffer = BytesMut::with_capacity(4096);
    loop {
        buffer.clear();
        match transport.read(&mut buffer).await {
            Ok(_) => (),
            Err(TransportError::ConnectionReset) => return Err(HandshakeError::TransportClosed.into()),
            Err(error) => return Err(error.into()),
        }

        match handshake.process_bytes(&buffer)? {
            HandshakeProcessResult::InProgress { response_bytes } => {
                if !response_bytes.is_empty() {
                    transport.write_all(&response_bytes).await?;
                }
            }

            HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            } => {
                if !response_bytes.is_empty() {
                    transport.write_all(&response_bytes).await?;
                }

                return Ok(remaining_bytes);
            }
        }
    }
}

fn is_connect_response(event: &ClientSessionEvent) -> bool {
    matches!(
        event,
        ClientSessionEvent::ConnectionRequestAccepted | ClientSessionEvent::ConnectionRequestRejected { .. }
    )
}

fn is_play_response(event: &ClientSessionEvent) -> bool {
    matches!(
        event,
        ClientSessionEvent::PlaybackRequestAccepted | ClientSessionEvent::PlaybackRequestRejected { .. }
    )
}

fn is_publish_response(event: &ClientSessionEvent) -> bool {
    matches!(
        event,
        ClientSessionEvent::PublishRequestAccepted | ClientSessionEvent::PublishRequestRejected { .. }
    )
}

fn unexpected(event: ClientSessionEvent) -> StreamError {
    warn!(?event, "Unexpected event while waiting for a response");
    StreamError::Runtime {
        reason: format!("unexpected event {:?}", event),
    }
}
