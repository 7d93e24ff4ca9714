//! An in-process RTMP server for driving players and publishers end to end.
//!
//! [`FakeConnector`] hands the engine one half of a `tokio::io::duplex` pipe per connection and
//! serves the other half with a scripted server: it accepts `connect` and `createStream`,
//! records everything a publisher sends, and plays a scheduled list of frames to players.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use rtmp_stream::chunk_io::{ChunkDeserializer, ChunkSerializer};
use rtmp_stream::events::{ChangeEvent, StreamEvent};
use rtmp_stream::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rtmp_stream::media::{flv, MediaFrame, MediaKind, VideoCodec};
use rtmp_stream::messages::{RtmpMessage, UserControlEvent};
use rtmp_stream::time::RtmpTimestamp;
use rtmp_stream::transport::{BoxedStream, Connector, Endpoint, TransportError};
use rtmp_stream_amf0::Amf0Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::sleep_until;

const STREAM_ID: u32 = 1;

/// A frame the server sends to players once `after` has elapsed since `play`
#[derive(Clone)]
pub struct ScheduledFrame {
    pub after: Duration,
    pub frame: MediaFrame,
}

#[derive(Clone, Default)]
pub struct ServerScript {
    pub frames: Vec<ScheduledFrame>,
    pub reject_play: bool,

    /// Drop the first connection this long after the stream starts
    pub drop_first_connection_after: Option<Duration>,
}

/// What the server saw, across every connection
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub commands: Vec<String>,
    pub frames: Vec<MediaFrame>,
    pub data_messages: usize,
    pub buffer_length: Option<u32>,
}

impl Recording {
    pub fn video_frames(&self) -> Vec<&MediaFrame> {
        self.frames
            .iter()
            .filter(|f| f.kind() == MediaKind::Video && !f.is_sequence_header())
            .collect()
    }

    pub fn command_count(&self, name: &str) -> usize {
        self.commands.iter().filter(|c| c.as_str() == name).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    script: Arc<ServerScript>,
    recording: Arc<Mutex<Recording>>,
    connections: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(script: ServerScript) -> FakeConnector {
        FakeConnector {
            script: Arc::new(script),
            ..FakeConnector::default()
        }
    }

    pub fn recording(&self) -> Recording {
        self.recording.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        let index = self.connections.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(256 * 1024);
        let drop_after = match index {
            0 => self.script.drop_first_connection_after,
            _ => None,
        };

        let connection = ServerConnection {
            stream: server,
            script: self.script.clone(),
            recording: self.recording.clone(),
            serializer: ChunkSerializer::new(),
            deserializer: ChunkDeserializer::new(),
            drop_after,
        };

        tokio::spawn(async move {
            // Errors only mean the client went away
            let _ = connection.serve().await;
        });

        Ok(Box::new(client))
    }
}

type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

struct ServerConnection {
    stream: DuplexStream,
    script: Arc<ServerScript>,
    recording: Arc<Mutex<Recording>>,
    serializer: ChunkSerializer,
    deserializer: ChunkDeserializer,
    drop_after: Option<Duration>,
}

impl ServerConnection {
    async fn serve(mut self) -> ServerResult<()> {
        let remaining = self.handshake().await?;
        let mut playing_since = None;
        let mut streaming_since = None;
        let mut next_frame = 0;

        self.handle_bytes(&remaining, &mut playing_since, &mut streaming_since).await?;

        let mut buffer = BytesMut::with_capacity(64 * 1024);
        loop {
            let frame_due = playing_since.and_then(|since: tokio::time::Instant| {
                self.script.frames.get(next_frame).map(|f| since + f.after)
            });

            let drop_due = streaming_since
                .zip(self.drop_after)
                .map(|(since, after): (tokio::time::Instant, Duration)| since + after);

            tokio::select! {
                read = self.stream.read_buf(&mut buffer) => {
                    if read? == 0 {
                        return Ok(());
                    }

                    let bytes = buffer.split();
                    self.handle_bytes(&bytes, &mut playing_since, &mut streaming_since).await?;
                }

                _ = sleep_until_some(frame_due) => {
                    let frame = self.script.frames[next_frame].frame.clone();
                    next_frame += 1;
                    self.send_frame(&frame).await?;
                }

                _ = sleep_until_some(drop_due) => {
                    return Ok(());
                }
            }
        }
    }

    async fn handshake(&mut self) -> ServerResult<Vec<u8>> {
        let mut handshake = Handshake::new(PeerType::Server);
        let mut buffer = BytesMut::with_capacity(4096);
        loop {
            buffer.clear();
            if self.stream.read_buf(&mut buffer).await? == 0 {
                return Err("client closed during handshake".into());
            }

            match handshake.process_bytes(&buffer)? {
                HandshakeProcessResult::InProgress { response_bytes } => {
                    self.stream.write_all(&response_bytes).await?;
                }

                HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                } => {
                    self.stream.write_all(&response_bytes).await?;
                    return Ok(remaining_bytes);
                }
            }
        }
    }

    async fn handle_bytes(
        &mut self,
        bytes: &[u8],
        playing_since: &mut Option<tokio::time::Instant>,
        streaming_since: &mut Option<tokio::time::Instant>,
    ) -> ServerResult<()> {
        for payload in self.deserializer.deframe(bytes)? {
            match payload.to_rtmp_message()? {
                RtmpMessage::Amf0Command {
                    command_name,
                    transaction_id,
                    ..
                } => {
                    self.recording.lock().unwrap().commands.push(command_name.clone());
                    match command_name.as_str() {
                        "connect" => self.send_connect_result(transaction_id).await?,
                        "createStream" => {
                            let message = RtmpMessage::Amf0Command {
                                command_name: "_result".to_string(),
                                transaction_id,
                                command_object: Amf0Value::Null,
                                additional_arguments: vec![Amf0Value::Number(f64::from(STREAM_ID))],
                            };

                            self.send(message, 0).await?;
                        }

                        "publish" => {
                            self.send_status("status", "NetStream.Publish.Start").await?;
                            *streaming_since = Some(tokio::time::Instant::now());
                        }

                        "play" if self.script.reject_play => {
                            self.send_status("error", "NetStream.Play.StreamNotFound").await?;
                        }

                        "play" => {
                            self.send(RtmpMessage::UserControl(UserControlEvent::StreamBegin { stream_id: STREAM_ID }), 0)
                                .await?;
                            self.send_status("status", "NetStream.Play.Start").await?;
                            *playing_since = Some(tokio::time::Instant::now());
                            *streaming_since = *playing_since;
                        }

                        _ => (),
                    }
                }

                RtmpMessage::VideoData { data } => {
                    if let Some(frame) = flv::decode_video_tag(payload.timestamp, &data)? {
                        self.recording.lock().unwrap().frames.push(frame);
                    }
                }

                RtmpMessage::AudioData { data } => {
                    if let Some(frame) = flv::decode_audio_tag(payload.timestamp, &data)? {
                        self.recording.lock().unwrap().frames.push(frame);
                    }
                }

                RtmpMessage::Amf0Data { .. } => self.recording.lock().unwrap().data_messages += 1,
                RtmpMessage::UserControl(UserControlEvent::SetBufferLength { buffer_length, .. }) => {
                    self.recording.lock().unwrap().buffer_length = Some(buffer_length);
                }

                _ => (),
            }
        }

        Ok(())
    }

    async fn send_connect_result(&mut self, transaction_id: f64) -> ServerResult<()> {
        let mut properties = HashMap::new();
        properties.insert("fmsVer".to_string(), Amf0Value::Utf8String("FMS/3,0,1,123".to_string()));
        properties.insert("capabilities".to_string(), Amf0Value::Number(31.0));

        let message = RtmpMessage::Amf0Command {
            command_name: "_result".to_string(),
            transaction_id,
            command_object: Amf0Value::Object(properties),
            additional_arguments: vec![status_object("status", "NetConnection.Connect.Success")],
        };

        self.send(message, 0).await
    }

    async fn send_status(&mut self, level: &str, code: &str) -> ServerResult<()> {
        let message = RtmpMessage::Amf0Command {
            command_name: "onStatus".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![status_object(level, code)],
        };

        self.send(message, STREAM_ID).await
    }

    async fn send_frame(&mut self, frame: &MediaFrame) -> ServerResult<()> {
        let message = match frame.kind() {
            MediaKind::Video => RtmpMessage::VideoData {
                data: flv::encode_video_tag(frame, false)?,
            },

            MediaKind::Audio => RtmpMessage::AudioData {
                data: flv::encode_audio_tag(frame)?,
            },
        };

        let payload = message.into_message_payload(frame.timestamp(), STREAM_ID)?;
        let packet = self.serializer.serialize(&payload, false, false)?;
        self.stream.write_all(&packet.bytes).await?;
        Ok(())
    }

    async fn send(&mut self, message: RtmpMessage, stream_id: u32) -> ServerResult<()> {
        let payload = message.into_message_payload(RtmpTimestamp::new(0), stream_id)?;
        let packet = self.serializer.serialize(&payload, false, false)?;
        self.stream.write_all(&packet.bytes).await?;
        Ok(())
    }
}

async fn sleep_until_some(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn status_object(level: &str, code: &str) -> Amf0Value {
    let mut properties = HashMap::new();
    properties.insert("level".to_string(), Amf0Value::Utf8String(level.to_string()));
    properties.insert("code".to_string(), Amf0Value::Utf8String(code.to_string()));
    properties.insert("description".to_string(), Amf0Value::Utf8String(code.to_string()));
    Amf0Value::Object(properties)
}

/// A live video stream at `fps` with a key frame every second, preceded by its sequence header
pub fn video_stream(fps: u32, duration: Duration) -> Vec<(u64, MediaFrame)> {
    let header = MediaFrame::video_sequence_header(
        VideoCodec::Avc,
        RtmpTimestamp::new(0),
        Bytes::from_static(&[0x01, 0x4d, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x00, 0x01, 0x00, 0x00]),
    );

    let mut frames = vec![(0, header)];
    let count = duration.as_millis() as u64 * u64::from(fps) / 1000;
    for index in 0..count {
        let timestamp = index * 1000 / u64::from(fps);
        let key_frame = index % u64::from(fps) == 0;
        let data = Bytes::from(vec![if key_frame { 0x65 } else { 0x41 }; 512]);
        let frame = MediaFrame::video(VideoCodec::Avc, RtmpTimestamp::from_millis(timestamp), 0, key_frame, data);
        frames.push((timestamp, frame));
    }

    frames
}

/// Collects change events raised by a view
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn listener(&self) -> impl Fn(&ChangeEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &ChangeEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn all(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn codes(&self) -> Vec<i32> {
        self.all().iter().map(|e| e.code).collect()
    }

    pub fn count(&self, predicate: impl Fn(&StreamEvent) -> bool) -> usize {
        self.all().iter().filter(|e| predicate(&e.event)).count()
    }

    /// Polls until an event matches or the timeout elapses
    pub fn wait_for(&self, timeout: Duration, predicate: impl Fn(&StreamEvent) -> bool) -> bool {
        wait_until(timeout, || self.count(&predicate) > 0)
    }
}

/// Polls `condition` until it holds or the timeout elapses
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }

        thread::sleep(Duration::from_millis(10));
    }

    condition()
}

pub const TEST_URL: &str = "rtmp://127.0.0.1/live/stream";
