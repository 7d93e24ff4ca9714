mod config;
mod errors;
mod events;
mod outstanding_transaction;
mod publish_request_type;
mod result;
mod state;

#[cfg(test)]
mod tests;

use self::outstanding_transaction::{OutstandingTransaction, TransactionPurpose};
use crate::chunk_io::{ChunkDeserializer, ChunkSerializer, Packet};
use crate::media::{MediaFrame, StreamMetadata};
use crate::messages::{MessagePayload, PeerBandwidthLimitType, RtmpMessage, UserControlEvent};
use crate::mux::{ControlEvent, Demuxed, MessageMultiplexer, StatusInfo};
use crate::time::RtmpTimestamp;
use rtmp_stream_amf0::Amf0Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use self::config::ClientSessionConfig;
pub use self::errors::ClientSessionError;
pub use self::events::ClientSessionEvent;
pub use self::publish_request_type::PublishRequestType;
pub use self::result::ClientSessionResult;
pub use self::state::ClientState;

/// Video FourCCs offered to the server when enhanced RTMP is enabled
const ENHANCED_FOURCC_LIST: [&str; 2] = ["hvc1", "avc1"];

/// A session that represents the client side of a single RTMP connection.
///
/// The `ClientSession` encapsulates the process of parsing RTMP chunks coming in from the server
/// and performs the client side workflows (connect, createStream, play, publish) on top of
/// them.  It returns pre-serialized packets to send to the server along with events that
/// applications can react to.
///
/// The `ClientSession` does not care how bytes come in or get sent out.  All bytes received
/// **after** the handshake must be passed into `handle_input()`, and every packet it returns must
/// be sent to the server **in order**, otherwise RTMP chunk header compression will corrupt
/// the stream on one side or the other.
pub struct ClientSession {
    start_time: Instant,
    config: ClientSessionConfig,
    serializer: ChunkSerializer,
    deserializer: ChunkDeserializer,
    multiplexer: MessageMultiplexer,
    current_state: ClientState,
    outstanding_transactions: HashMap<u32, OutstandingTransaction>,
    next_transaction_id: u32,
    active_stream_id: Option<u32>,
    connected_app_name: Option<String>,
    sent_window_ack_size: u32,
    peer_window_ack_size: Option<u32>,
    bytes_received: u64,
    bytes_received_at_last_ack: u64,
}

impl ClientSession {
    /// Creates a new client session.
    ///
    /// The returned results contain the `SetChunkSize` message announcing our outbound chunk
    /// size, which must be sent right after the handshake.
    pub fn new(
        config: ClientSessionConfig,
    ) -> Result<(ClientSession, Vec<ClientSessionResult>), ClientSessionError> {
        let mut session = ClientSession {
            start_time: Instant::now(),
            serializer: ChunkSerializer::new(),
            deserializer: ChunkDeserializer::with_max_message_size(config.max_message_size),
            multiplexer: MessageMultiplexer::new(config.enhanced_rtmp),
            current_state: ClientState::Disconnected,
            outstanding_transactions: HashMap::new(),
            next_transaction_id: 1,
            active_stream_id: None,
            connected_app_name: None,
            sent_window_ack_size: 0,
            peer_window_ack_size: None,
            bytes_received: 0,
            bytes_received_at_last_ack: 0,
            config,
        };

        let chunk_size_packet = session
            .serializer
            .set_max_chunk_size(session.config.chunk_size, RtmpTimestamp::new(0))?;

        Ok((session, vec![ClientSessionResult::OutboundResponse(chunk_size_packet)]))
    }

    pub fn state(&self) -> &ClientState {
        &self.current_state
    }

    /// The message stream id created for playback or publishing, if any
    pub fn active_stream_id(&self) -> Option<u32> {
        self.active_stream_id
    }

    pub fn connected_app_name(&self) -> Option<&str> {
        self.connected_app_name.as_deref()
    }

    /// Takes in bytes that are encoding RTMP chunks and returns any responses or events that can
    /// be reacted to.
    pub fn handle_input(&mut self, bytes: &[u8]) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let mut results = Vec::new();
        self.bytes_received += bytes.len() as u64;

        for payload in self.deserializer.deframe(bytes)? {
            let mut message_results = match self.multiplexer.decode(&payload)? {
                Demuxed::Frame { stream_id, frame } => self.handle_media_frame(stream_id, frame),
                Demuxed::Metadata { stream_id, metadata } => self.handle_metadata(stream_id, metadata),
                Demuxed::Control(event) => self.handle_control_event(event)?,
                Demuxed::Protocol(message) => self.handle_protocol_message(message, payload)?,
                Demuxed::Ignored => Vec::new(),
            };

            results.append(&mut message_results);
        }

        if let Some(window) = self.peer_window_ack_size {
            if self.bytes_received - self.bytes_received_at_last_ack >= u64::from(window) {
                let message = RtmpMessage::Acknowledgement {
                    sequence_number: self.bytes_received as u32,
                };

                let packet = self.serialize_control(message, 0)?;
                self.bytes_received_at_last_ack = self.bytes_received;
                results.push(ClientSessionResult::OutboundResponse(packet));
            }
        }

        Ok(results)
    }

    /// Requests a connection to the specified RTMP application
    pub fn request_connection(&mut self, app_name: String) -> Result<ClientSessionResult, ClientSessionError> {
        if self.current_state != ClientState::Disconnected {
            return Err(ClientSessionError::CantConnectWhileAlreadyConnected);
        }

        let transaction_id = self.begin_transaction(OutstandingTransaction::ConnectionRequested {
            app_name: app_name.clone(),
        });

        let mut properties = HashMap::new();
        properties.insert("app".to_string(), Amf0Value::Utf8String(app_name.clone()));
        properties.insert(
            "flashVer".to_string(),
            Amf0Value::Utf8String(self.config.flash_version.clone()),
        );
        properties.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));
        properties.insert("fpad".to_string(), Amf0Value::Boolean(false));
        properties.insert("capabilities".to_string(), Amf0Value::Number(15.0));
        properties.insert("audioCodecs".to_string(), Amf0Value::Number(3191.0));
        properties.insert("videoCodecs".to_string(), Amf0Value::Number(252.0));
        properties.insert("videoFunction".to_string(), Amf0Value::Number(1.0));

        if let Some(tc_url) = &self.config.tc_url {
            properties.insert("tcUrl".to_string(), Amf0Value::Utf8String(tc_url.clone()));
        }

        if let Some(page_url) = &self.config.page_url {
            properties.insert("pageUrl".to_string(), Amf0Value::Utf8String(page_url.clone()));
        }

        if self.config.enhanced_rtmp {
            let list = ENHANCED_FOURCC_LIST
                .iter()
                .map(|x| Amf0Value::Utf8String(x.to_string()))
                .collect();

            properties.insert("fourCcList".to_string(), Amf0Value::StrictArray(list));
        }

        let message = RtmpMessage::Amf0Command {
            command_name: "connect".to_string(),
            transaction_id: f64::from(transaction_id),
            command_object: Amf0Value::Object(properties),
            additional_arguments: Vec::new(),
        };

        let packet = self.serialize_control(message, 0)?;
        self.current_state = ClientState::ConnectRequested { app_name };
        Ok(ClientSessionResult::OutboundResponse(packet))
    }

    /// Requests playback of the given stream key.  A stream is created first, and `play` is sent
    /// once the server has told us the new stream's id.
    pub fn request_playback(&mut self, stream_key: String) -> Result<ClientSessionResult, ClientSessionError> {
        self.ensure_connected()?;

        let packet = self.request_stream_creation(TransactionPurpose::PlayRequest {
            stream_key: stream_key.clone(),
        })?;

        self.current_state = ClientState::PlayRequested { stream_key };
        Ok(ClientSessionResult::OutboundResponse(packet))
    }

    /// Requests to publish under the given stream key.  `releaseStream` and `FCPublish` are sent
    /// ahead of `createStream` since several servers expect them.
    pub fn request_publishing(
        &mut self,
        stream_key: String,
        request_type: PublishRequestType,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        self.ensure_connected()?;

        let mut results = Vec::with_capacity(3);
        for command_name in ["releaseStream", "FCPublish"] {
            let transaction_id = self.begin_transaction(OutstandingTransaction::Courtesy { command_name });
            let message = RtmpMessage::Amf0Command {
                command_name: command_name.to_string(),
                transaction_id: f64::from(transaction_id),
                command_object: Amf0Value::Null,
                additional_arguments: vec![Amf0Value::Utf8String(stream_key.clone())],
            };

            let packet = self.serialize_control(message, 0)?;
            results.push(ClientSessionResult::OutboundResponse(packet));
        }

        let packet = self.request_stream_creation(TransactionPurpose::PublishRequest {
            stream_key: stream_key.clone(),
            request_type,
        })?;

        results.push(ClientSessionResult::OutboundResponse(packet));
        self.current_state = ClientState::PublishRequested { stream_key };
        Ok(results)
    }

    /// Packages a media frame for the stream being published.  Inter frames come back flagged
    /// as droppable.
    pub fn publish_frame(&mut self, frame: &MediaFrame) -> Result<Packet, ClientSessionError> {
        let stream_id = self.publishing_stream_id()?;
        let payload = self.multiplexer.encode_frame(frame, stream_id)?;
        Ok(self.serializer.serialize(&payload, false, frame.is_droppable_video())?)
    }

    /// Sends stream metadata (`@setDataFrame onMetaData`) for the stream being published
    pub fn publish_metadata(&mut self, metadata: &StreamMetadata) -> Result<Packet, ClientSessionError> {
        let stream_id = self.publishing_stream_id()?;
        let payload = self.multiplexer.encode_metadata(metadata, stream_id)?;
        Ok(self.serializer.serialize(&payload, false, false)?)
    }

    /// Asks the server to pause or resume delivery of the stream being played
    pub fn request_pause(&mut self, paused: bool, position: RtmpTimestamp) -> Result<Packet, ClientSessionError> {
        let stream_id = match self.current_state {
            ClientState::Playing { .. } => self.require_stream_id()?,
            _ => return Err(self.invalid_state()),
        };

        let message = RtmpMessage::Amf0Command {
            command_name: "pause".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![
                Amf0Value::Boolean(paused),
                Amf0Value::Number(f64::from(position.value)),
            ],
        };

        self.serialize_control(message, stream_id)
    }

    /// Tells the server how many milliseconds of media we buffer for the stream being played
    pub fn set_buffer_length(&mut self, buffer_length_ms: u32) -> Result<Packet, ClientSessionError> {
        let stream_id = self.require_stream_id()?;
        self.config.playback_buffer_length_ms = buffer_length_ms;

        let message = RtmpMessage::UserControl(UserControlEvent::SetBufferLength {
            stream_id,
            buffer_length: buffer_length_ms,
        });

        self.serialize_control(message, 0)
    }

    /// Stops playback by deleting the stream
    pub fn stop_playback(&mut self) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        match self.current_state {
            ClientState::Playing { .. } | ClientState::PlayRequested { .. } => (),
            _ => return Err(self.invalid_state()),
        }

        let packet = self.delete_active_stream()?;
        Ok(vec![ClientSessionResult::OutboundResponse(packet)])
    }

    /// Stops publishing with `FCUnpublish` followed by deleting the stream
    pub fn stop_publishing(&mut self) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let stream_key = match &self.current_state {
            ClientState::Publishing { stream_key } | ClientState::PublishRequested { stream_key } => {
                stream_key.clone()
            }

            _ => return Err(self.invalid_state()),
        };

        let unpublish = RtmpMessage::Amf0Command {
            command_name: "FCUnpublish".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Utf8String(stream_key)],
        };

        let stream_id = self.require_stream_id()?;
        let unpublish_packet = self.serialize_control(unpublish, stream_id)?;
        let delete_packet = self.delete_active_stream()?;

        Ok(vec![
            ClientSessionResult::OutboundResponse(unpublish_packet),
            ClientSessionResult::OutboundResponse(delete_packet),
        ])
    }

    /// Creates a ping request to send to the server.  The server is expected to answer with a
    /// ping response carrying the same timestamp.
    pub fn send_ping_request(&mut self) -> Result<(Packet, RtmpTimestamp), ClientSessionError> {
        let timestamp = self.get_epoch();
        let message = RtmpMessage::UserControl(UserControlEvent::PingRequest { timestamp });
        let packet = self.serialize_control(message, 0)?;
        Ok((packet, timestamp))
    }

    fn handle_media_frame(&mut self, stream_id: u32, frame: MediaFrame) -> Vec<ClientSessionResult> {
        if !self.is_playing_stream(stream_id) {
            debug!(stream_id, ?frame, "Ignoring media received outside of playback");
            return Vec::new();
        }

        vec![ClientSessionResult::RaisedEvent(
            ClientSessionEvent::MediaFrameReceived { frame },
        )]
    }

    fn handle_metadata(&mut self, stream_id: u32, metadata: StreamMetadata) -> Vec<ClientSessionResult> {
        if !self.is_playing_stream(stream_id) {
            return Vec::new();
        }

        vec![ClientSessionResult::RaisedEvent(
            ClientSessionEvent::StreamMetadataReceived { metadata },
        )]
    }

    fn handle_control_event(&mut self, event: ControlEvent) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        match event {
            ControlEvent::CommandResult {
                transaction_id,
                command_object,
                arguments,
            } => self.handle_result(transaction_id, command_object, arguments),

            ControlEvent::CommandError { transaction_id, status } => {
                self.handle_error(transaction_id, status)
            }

            ControlEvent::OnStatus { stream_id, status } => Ok(self.handle_on_status(stream_id, status)),

            ControlEvent::Close => {
                info!("Server closed the connection");
                self.current_state = ClientState::Closed;
                self.active_stream_id = None;
                Ok(vec![ClientSessionResult::RaisedEvent(
                    ClientSessionEvent::ConnectionClosed,
                )])
            }

            ControlEvent::Notification { command_name } => {
                debug!(command_name = %command_name, "Notification received");
                Ok(Vec::new())
            }

            ControlEvent::Other {
                command_name,
                transaction_id,
                command_object,
                arguments,
            } => Ok(vec![ClientSessionResult::RaisedEvent(
                ClientSessionEvent::UnhandleableAmf0Command {
                    command_name,
                    transaction_id,
                    command_object,
                    additional_values: arguments,
                },
            )]),
        }
    }

    fn handle_result(
        &mut self,
        transaction_id: f64,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let transaction = match self.outstanding_transactions.remove(&(transaction_id as u32)) {
            Some(x) => x,
            None => {
                return Ok(vec![ClientSessionResult::RaisedEvent(
                    ClientSessionEvent::UnknownTransactionResultReceived {
                        transaction_id,
                        command_object,
                        additional_values: arguments,
                    },
                )]);
            }
        };

        match transaction {
            OutstandingTransaction::ConnectionRequested { app_name } => self.handle_connect_success(app_name),
            OutstandingTransaction::CreateStream { purpose } => self.handle_create_stream_success(purpose, arguments),
            OutstandingTransaction::Courtesy { command_name } => {
                debug!(command_name, "Server acknowledged command");
                Ok(Vec::new())
            }
        }
    }

    fn handle_error(
        &mut self,
        transaction_id: f64,
        status: Option<StatusInfo>,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let description = status.map(|x| x.description).unwrap_or_default();
        let transaction = match self.outstanding_transactions.remove(&(transaction_id as u32)) {
            Some(x) => x,
            None => {
                warn!(transaction_id, description = %description, "Error received for unknown transaction");
                return Ok(Vec::new());
            }
        };

        match transaction {
            OutstandingTransaction::ConnectionRequested { app_name } => {
                warn!(app_name = %app_name, description = %description, "Connection request rejected");
                self.current_state = ClientState::Disconnected;
                Ok(vec![ClientSessionResult::RaisedEvent(
                    ClientSessionEvent::ConnectionRequestRejected { description },
                )])
            }

            OutstandingTransaction::CreateStream { .. } => Err(ClientSessionError::CreateStreamFailed),

            // Servers that do not know these commands answer with an error, which is harmless
            OutstandingTransaction::Courtesy { command_name } => {
                debug!(command_name, description = %description, "Server rejected command");
                Ok(Vec::new())
            }
        }
    }

    fn handle_connect_success(&mut self, app_name: String) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        match self.current_state {
            ClientState::ConnectRequested { .. } => (),
            _ => return Err(self.invalid_state()),
        }

        info!(app_name = %app_name, "Connected to application");
        self.current_state = ClientState::Connected;
        self.connected_app_name = Some(app_name);

        let window_ack = RtmpMessage::WindowAcknowledgement {
            size: self.config.window_ack_size,
        };

        let packet = self.serialize_control(window_ack, 0)?;
        self.sent_window_ack_size = self.config.window_ack_size;

        Ok(vec![
            ClientSessionResult::OutboundResponse(packet),
            ClientSessionResult::RaisedEvent(ClientSessionEvent::ConnectionRequestAccepted),
        ])
    }

    fn handle_create_stream_success(
        &mut self,
        purpose: TransactionPurpose,
        arguments: Vec<Amf0Value>,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let stream_id = match arguments.first().and_then(Amf0Value::as_number) {
            Some(x) => x as u32,
            None => return Err(ClientSessionError::CreateStreamResponseHadNoStreamNumber),
        };

        debug!(stream_id, "Stream created");
        self.active_stream_id = Some(stream_id);
        self.multiplexer.reset_stream(stream_id);

        match purpose {
            TransactionPurpose::PlayRequest { stream_key } => {
                let buffer_length = RtmpMessage::UserControl(UserControlEvent::SetBufferLength {
                    stream_id,
                    buffer_length: self.config.playback_buffer_length_ms,
                });

                let buffer_packet = self.serialize_control(buffer_length, 0)?;

                let play = RtmpMessage::Amf0Command {
                    command_name: "play".to_string(),
                    transaction_id: 0.0,
                    command_object: Amf0Value::Null,
                    additional_arguments: vec![Amf0Value::Utf8String(stream_key)],
                };

                let play_packet = self.serialize_control(play, stream_id)?;
                Ok(vec![
                    ClientSessionResult::OutboundResponse(buffer_packet),
                    ClientSessionResult::OutboundResponse(play_packet),
                ])
            }

            TransactionPurpose::PublishRequest {
                stream_key,
                request_type,
            } => {
                let publish = RtmpMessage::Amf0Command {
                    command_name: "publish".to_string(),
                    transaction_id: 0.0,
                    command_object: Amf0Value::Null,
                    additional_arguments: vec![
                        Amf0Value::Utf8String(stream_key),
                        Amf0Value::Utf8String(request_type.as_str().to_string()),
                    ],
                };

                let packet = self.serialize_control(publish, stream_id)?;
                Ok(vec![ClientSessionResult::OutboundResponse(packet)])
            }
        }
    }

    fn handle_on_status(&mut self, stream_id: u32, status: StatusInfo) -> Vec<ClientSessionResult> {
        debug!(stream_id, code = %status.code, level = %status.level, "onStatus received");

        let code = status.code.clone();
        let event = match (&self.current_state, code.as_str()) {
            (ClientState::PlayRequested { stream_key }, "NetStream.Play.Start") => {
                info!(stream_key = %stream_key, "Playback started");
                self.current_state = ClientState::Playing {
                    stream_key: stream_key.clone(),
                };

                ClientSessionEvent::PlaybackRequestAccepted
            }

            (ClientState::PlayRequested { .. }, _) if status.is_error() => {
                self.current_state = ClientState::Connected;
                ClientSessionEvent::PlaybackRequestRejected {
                    description: status.description,
                }
            }

            (ClientState::PublishRequested { stream_key }, "NetStream.Publish.Start") => {
                info!(stream_key = %stream_key, "Publishing started");
                self.current_state = ClientState::Publishing {
                    stream_key: stream_key.clone(),
                };

                ClientSessionEvent::PublishRequestAccepted
            }

            (ClientState::PublishRequested { .. }, _) if status.is_error() => {
                self.current_state = ClientState::Connected;
                ClientSessionEvent::PublishRequestRejected {
                    description: status.description,
                }
            }

            (ClientState::Playing { .. }, "NetStream.Play.Stop")
            | (ClientState::Playing { .. }, "NetStream.Play.Complete") => ClientSessionEvent::StreamEnded,

            _ => ClientSessionEvent::StreamStatus { status },
        };

        vec![ClientSessionResult::RaisedEvent(event)]
    }

    fn handle_protocol_message(
        &mut self,
        message: RtmpMessage,
        payload: MessagePayload,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        match message {
            // Applied by the deserializer as the chunk arrives
            RtmpMessage::SetChunkSize { .. } | RtmpMessage::Abort { .. } => Ok(Vec::new()),

            RtmpMessage::Acknowledgement { sequence_number } => Ok(vec![ClientSessionResult::RaisedEvent(
                ClientSessionEvent::AcknowledgementReceived {
                    bytes_received: sequence_number,
                },
            )]),

            RtmpMessage::WindowAcknowledgement { size } => {
                debug!(size, "Server window acknowledgement size set");
                self.peer_window_ack_size = Some(size);
                Ok(Vec::new())
            }

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                self.handle_set_peer_bandwidth(size, limit_type)
            }

            RtmpMessage::UserControl(event) => self.handle_user_control(event),

            _ => Ok(vec![ClientSessionResult::UnhandleableMessageReceived(payload)]),
        }
    }

    fn handle_set_peer_bandwidth(
        &mut self,
        size: u32,
        limit_type: PeerBandwidthLimitType,
    ) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        let apply = match limit_type {
            PeerBandwidthLimitType::Hard | PeerBandwidthLimitType::Dynamic => size != self.sent_window_ack_size,
            PeerBandwidthLimitType::Soft => size < self.sent_window_ack_size,
        };

        if !apply {
            return Ok(Vec::new());
        }

        let packet = self.serialize_control(RtmpMessage::WindowAcknowledgement { size }, 0)?;
        self.sent_window_ack_size = size;
        Ok(vec![ClientSessionResult::OutboundResponse(packet)])
    }

    fn handle_user_control(&mut self, event: UserControlEvent) -> Result<Vec<ClientSessionResult>, ClientSessionError> {
        match event {
            UserControlEvent::PingRequest { timestamp } => {
                let response = RtmpMessage::UserControl(UserControlEvent::PingResponse { timestamp });
                let packet = self.serialize_control(response, 0)?;
                Ok(vec![ClientSessionResult::OutboundResponse(packet)])
            }

            UserControlEvent::PingResponse { timestamp } => Ok(vec![ClientSessionResult::RaisedEvent(
                ClientSessionEvent::PingResponseReceived { timestamp },
            )]),

            UserControlEvent::StreamEof { stream_id } if self.is_playing_stream(stream_id) => Ok(vec![
                ClientSessionResult::RaisedEvent(ClientSessionEvent::StreamEnded),
            ]),

            other => {
                debug!(event = ?other, "User control event received");
                Ok(Vec::new())
            }
        }
    }

    fn request_stream_creation(&mut self, purpose: TransactionPurpose) -> Result<Packet, ClientSessionError> {
        let transaction_id = self.begin_transaction(OutstandingTransaction::CreateStream { purpose });
        let message = RtmpMessage::Amf0Command {
            command_name: "createStream".to_string(),
            transaction_id: f64::from(transaction_id),
            command_object: Amf0Value::Null,
            additional_arguments: Vec::new(),
        };

        self.serialize_control(message, 0)
    }

    fn delete_active_stream(&mut self) -> Result<Packet, ClientSessionError> {
        let stream_id = self.require_stream_id()?;
        let message = RtmpMessage::Amf0Command {
            command_name: "deleteStream".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Number(f64::from(stream_id))],
        };

        let packet = self.serialize_control(message, stream_id)?;
        self.active_stream_id = None;
        self.current_state = ClientState::Connected;
        self.multiplexer.reset_stream(stream_id);
        Ok(packet)
    }

    fn begin_transaction(&mut self, transaction: OutstandingTransaction) -> u32 {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id += 1;
        self.outstanding_transactions.insert(transaction_id, transaction);
        transaction_id
    }

    fn serialize_control(&mut self, message: RtmpMessage, stream_id: u32) -> Result<Packet, ClientSessionError> {
        let payload = self.multiplexer.encode_control(message, self.get_epoch(), stream_id)?;
        Ok(self.serializer.serialize(&payload, false, false)?)
    }

    fn ensure_connected(&self) -> Result<(), ClientSessionError> {
        match self.current_state {
            ClientState::Connected => Ok(()),
            _ => Err(self.invalid_state()),
        }
    }

    fn publishing_stream_id(&self) -> Result<u32, ClientSessionError> {
        match self.current_state {
            ClientState::Publishing { .. } => self.require_stream_id(),
            _ => Err(self.invalid_state()),
        }
    }

    fn require_stream_id(&self) -> Result<u32, ClientSessionError> {
        self.active_stream_id
            .ok_or(ClientSessionError::NoKnownActiveStreamIdWhenRequired)
    }

    fn is_playing_stream(&self, stream_id: u32) -> bool {
        let playing = matches!(
            self.current_state,
            ClientState::Playing { .. } | ClientState::PlayRequested { .. }
        );

        playing && self.active_stream_id == Some(stream_id)
    }

    fn invalid_state(&self) -> ClientSessionError {
        ClientSessionError::SessionInInvalidState {
            current_state: self.current_state.clone(),
        }
    }

    fn get_epoch(&self) -> RtmpTimestamp {
        RtmpTimestamp::from_millis(self.start_time.elapsed().as_millis() as u64)
    }
}
