use super::*;
use crate::chunk_io::{ChunkDeserializer, ChunkSerializer, Packet};
use crate::media::{flv, AudioCodec, EncodeError, VideoCodec};
use crate::messages::{MessagePayload, RtmpMessage, UserControlEvent};
use bytes::Bytes;
use rand::Rng;
use rtmp_stream_amf0::Amf0Value;
use std::collections::HashMap;

#[test]
fn new_session_and_successful_connect_creates_set_chunk_size_message() {
    let app_name = "test".to_string();
    let mut config = ClientSessionConfig::new();
    config.chunk_size = 1111;

    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect(app_name, &mut session, &mut serializer, &mut deserializer);

    assert_eq!(
        deserializer.get_max_chunk_size(),
        1111,
        "Incorrect deserializer chunk size"
    );
}

#[test]
fn can_send_connect_request() {
    let app_name = "test".to_string();
    let mut config = ClientSessionConfig::new();
    config.tc_url = Some("rtmp://1.2.3.4:1935/test".to_string());
    config.page_url = Some("https://example.com/watch".to_string());

    let mut deserializer = ChunkDeserializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    let results = session.request_connection(app_name.clone()).unwrap();
    let (mut responses, _) = split_results(&mut deserializer, vec![results]);

    assert_eq!(responses.len(), 1, "Expected 1 response");
    match responses.remove(0) {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            },
        ) => {
            assert_eq!(payload.message_stream_id, 0, "Unexpected message stream id");
            assert_eq!(command_name, "connect", "Unexpected command name");
            assert_ne!(transaction_id, 0.0, "Transaction id should not be zero");
            assert_eq!(additional_arguments.len(), 0, "Expected no additional arguments");

            let text = |value: &str| Some(Amf0Value::Utf8String(value.to_string()));
            assert_eq!(command_object.property("app").cloned(), text("test"), "Unexpected app name");
            assert_eq!(
                command_object.property("objectEncoding"),
                Some(&Amf0Value::Number(0.0)),
                "Unexpected object encoding"
            );
            assert_eq!(
                command_object.property("flashVer").cloned(),
                text(&config.flash_version),
                "Unexpected flash version"
            );
            assert_eq!(
                command_object.property("tcUrl").cloned(),
                text("rtmp://1.2.3.4:1935/test"),
                "Unexpected tcUrl"
            );
            assert_eq!(
                command_object.property("pageUrl").cloned(),
                text("https://example.com/watch"),
                "Unexpected pageUrl"
            );
            assert_eq!(command_object.property("fourCcList"), None, "fourCcList sent without enhanced RTMP");
        }

        x => panic!("Expected Amf0Command, instead received: {:?}", x),
    }

    assert_eq!(
        session.state(),
        &ClientState::ConnectRequested { app_name },
        "Unexpected state"
    );
}

#[test]
fn enhanced_connect_request_advertises_fourcc_list() {
    let mut config = ClientSessionConfig::new();
    config.enhanced_rtmp = true;

    let mut deserializer = ChunkDeserializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    let results = session.request_connection("test".to_string()).unwrap();
    let (mut responses, _) = split_results(&mut deserializer, vec![results]);

    match responses.remove(0) {
        (_, RtmpMessage::Amf0Command { command_object, .. }) => {
            let expected = Amf0Value::StrictArray(vec![
                Amf0Value::Utf8String("hvc1".to_string()),
                Amf0Value::Utf8String("avc1".to_string()),
            ]);

            assert_eq!(command_object.property("fourCcList"), Some(&expected));
        }

        x => panic!("Expected Amf0Command, instead received: {:?}", x),
    }
}

#[test]
fn successful_connect_request_sends_window_ack_size() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    let results = session.request_connection("test".to_string()).unwrap();
    consume_results(&mut deserializer, vec![results]);

    let response = get_connect_success_response(&mut serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    let (mut responses, events) = split_results(&mut deserializer, results);

    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    match responses.remove(0) {
        (payload, RtmpMessage::WindowAcknowledgement { size }) => {
            assert_eq!(size, config.window_ack_size, "Unexpected window ack size");
            assert_eq!(payload.message_stream_id, 0, "Unexpected message stream id");
        }

        x => panic!("Expected WindowAcknowledgement, instead received: {:?}", x),
    }

    assert_eq!(events, vec![ClientSessionEvent::ConnectionRequestAccepted]);
    assert_eq!(session.state(), &ClientState::Connected, "Unexpected state");
    assert_eq!(session.connected_app_name(), Some("test"));
}

#[test]
fn event_raised_when_connect_request_rejected() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    let results = session.request_connection("test".to_string()).unwrap();
    consume_results(&mut deserializer, vec![results]);

    let response = get_connect_error_response(&mut serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    let (_, mut events) = split_results(&mut deserializer, results);

    assert_eq!(events.len(), 1, "Expected one event returned");
    match events.remove(0) {
        ClientSessionEvent::ConnectionRequestRejected { description } => {
            assert_eq!(description, "hi", "Unexpected description");
        }

        x => panic!("Expected connection rejected event, instead received: {:?}", x),
    }

    assert_eq!(session.state(), &ClientState::Disconnected, "Unexpected state");
}

#[test]
fn error_thrown_when_connect_request_made_after_successful_connection() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    match session.request_connection("test".to_string()) {
        Err(ClientSessionError::CantConnectWhileAlreadyConnected) => (),
        x => panic!("Expected CantConnectWhileAlreadyConnected, instead received: {:?}", x),
    }
}

#[test]
fn playback_cannot_be_requested_before_connecting() {
    let (mut session, _) = ClientSession::new(ClientSessionConfig::new()).unwrap();

    match session.request_playback("abcd".to_string()) {
        Err(ClientSessionError::SessionInInvalidState {
            current_state: ClientState::Disconnected,
        }) => (),
        x => panic!("Expected SessionInInvalidState, instead received: {:?}", x),
    }
}

#[test]
fn successful_play_request_workflow() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    assert_eq!(session.active_stream_id(), Some(stream_id));
    assert_eq!(
        session.state(),
        &ClientState::Playing {
            stream_key: "abcd".to_string()
        },
        "Unexpected state"
    );
}

#[test]
fn event_raised_when_play_request_rejected() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let result = session.request_playback("missing".to_string()).unwrap();
    let transaction_id = read_create_stream_transaction(&mut deserializer, vec![result]);
    let (stream_id, response) = get_create_stream_success_response(transaction_id, &mut serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    consume_results(&mut deserializer, results);

    let response = get_on_status(&mut serializer, stream_id, "error", "NetStream.Play.StreamNotFound");
    let results = session.handle_input(&response.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(
        events,
        vec![ClientSessionEvent::PlaybackRequestRejected {
            description: "hi".to_string()
        }]
    );
    assert_eq!(session.state(), &ClientState::Connected, "Unexpected state");
}

#[test]
fn active_play_session_raises_events_when_stream_metadata_received() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let mut properties = HashMap::new();
    properties.insert("width".to_string(), Amf0Value::Number(1920.0));
    properties.insert("height".to_string(), Amf0Value::Number(1080.0));
    properties.insert("framerate".to_string(), Amf0Value::Number(30.0));

    let message = RtmpMessage::Amf0Data {
        values: vec![
            Amf0Value::Utf8String("onMetaData".to_string()),
            Amf0Value::EcmaArray(properties),
        ],
    };

    let packet = serialize_message(&mut serializer, message, stream_id);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, mut events) = split_results(&mut deserializer, results);

    assert_eq!(events.len(), 1, "Unexpected number of events");
    match events.remove(0) {
        ClientSessionEvent::StreamMetadataReceived { metadata } => {
            assert_eq!(metadata.video_width, Some(1920), "Unexpected width");
            assert_eq!(metadata.video_height, Some(1080), "Unexpected height");
            assert_eq!(metadata.video_frame_rate, Some(30.0), "Unexpected frame rate");
        }

        x => panic!("Expected metadata event, instead received: {:?}", x),
    }
}

#[test]
fn active_play_session_raises_events_when_media_received() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let video = MediaFrame::video(
        VideoCodec::Avc,
        RtmpTimestamp::new(1234),
        40,
        true,
        Bytes::from_static(&[1, 2, 3, 4]),
    );

    let audio = MediaFrame::audio(AudioCodec::Aac, RtmpTimestamp::new(1240), Bytes::from_static(&[5, 6]));

    for frame in [video, audio] {
        let packet = serialize_frame(&mut serializer, &frame, stream_id);
        let results = session.handle_input(&packet.bytes[..]).unwrap();
        let (_, events) = split_results(&mut deserializer, results);

        assert_eq!(events, vec![ClientSessionEvent::MediaFrameReceived { frame }]);
    }
}

#[test]
fn can_receive_media_prior_to_play_request_being_accepted() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let result = session.request_playback("abcd".to_string()).unwrap();
    let transaction_id = read_create_stream_transaction(&mut deserializer, vec![result]);
    let (stream_id, response) = get_create_stream_success_response(transaction_id, &mut serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    consume_results(&mut deserializer, results);

    let frame = MediaFrame::video_sequence_header(VideoCodec::Avc, RtmpTimestamp::new(0), Bytes::from_static(&[1]));
    let packet = serialize_frame(&mut serializer, &frame, stream_id);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(events, vec![ClientSessionEvent::MediaFrameReceived { frame }]);
}

#[test]
fn media_on_unknown_stream_is_ignored() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let frame = MediaFrame::audio(AudioCodec::Aac, RtmpTimestamp::new(0), Bytes::from_static(&[1]));
    let packet = serialize_frame(&mut serializer, &frame, stream_id.wrapping_add(1));
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(events.len(), 0, "Expected no events");
}

#[test]
fn can_stop_playback() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let results = session.stop_playback().unwrap();
    let (mut responses, _) = split_results(&mut deserializer, results);

    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    assert_delete_stream(responses.remove(0), stream_id);
    assert_eq!(session.state(), &ClientState::Connected, "Unexpected state");
    assert_eq!(session.active_stream_id(), None, "Stream id should be cleared");
}

#[test]
fn can_request_pause_while_playing() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let packet = session.request_pause(true, RtmpTimestamp::new(5000)).unwrap();
    let (mut responses, _) = split_results(
        &mut deserializer,
        vec![ClientSessionResult::OutboundResponse(packet)],
    );

    match responses.remove(0) {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                additional_arguments,
                ..
            },
        ) => {
            assert_eq!(payload.message_stream_id, stream_id, "Unexpected stream id");
            assert_eq!(command_name, "pause", "Unexpected command name");
            assert_eq!(
                additional_arguments,
                vec![Amf0Value::Boolean(true), Amf0Value::Number(5000.0)],
                "Unexpected pause arguments"
            );
        }

        x => panic!("Expected pause command, instead received: {:?}", x),
    }
}

#[test]
fn end_of_stream_raises_stream_ended_event() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::UserControl(UserControlEvent::StreamEof { stream_id });
    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(events, vec![ClientSessionEvent::StreamEnded]);
}

#[test]
fn other_on_status_codes_are_raised_as_stream_status() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_play_request(&config, &mut session, &mut serializer, &mut deserializer);

    let packet = get_on_status(&mut serializer, stream_id, "status", "NetStream.Play.UnpublishNotify");
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, mut events) = split_results(&mut deserializer, results);

    match events.remove(0) {
        ClientSessionEvent::StreamStatus { status } => {
            assert_eq!(status.code, "NetStream.Play.UnpublishNotify", "Unexpected code");
        }

        x => panic!("Expected StreamStatus, instead received: {:?}", x),
    }
}

#[test]
fn automatically_responds_to_ping_requests() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::UserControl(UserControlEvent::PingRequest {
        timestamp: RtmpTimestamp::new(5230),
    });

    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (mut responses, _) = split_results(&mut deserializer, results);

    assert_eq!(responses.len(), 1, "Expected one response for handling ping request");
    match responses.remove(0) {
        (_, RtmpMessage::UserControl(UserControlEvent::PingResponse { timestamp })) => {
            assert_eq!(timestamp, RtmpTimestamp::new(5230), "Unexpected timestamp");
        }

        x => panic!("Expected PingResponse, found {:?}", x),
    }
}

#[test]
fn event_raised_when_ping_response_received() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::UserControl(UserControlEvent::PingResponse {
        timestamp: RtmpTimestamp::new(5230),
    });

    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(
        events,
        vec![ClientSessionEvent::PingResponseReceived {
            timestamp: RtmpTimestamp::new(5230)
        }]
    );
}

#[test]
fn can_send_ping_request() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let (packet, sent_timestamp) = session.send_ping_request().unwrap();
    let mut payloads = deserializer.deframe(&packet.bytes[..]).unwrap();
    let message = payloads.remove(0).to_rtmp_message().unwrap();

    match message {
        RtmpMessage::UserControl(UserControlEvent::PingRequest { timestamp }) => {
            assert_eq!(timestamp, sent_timestamp, "Unexpected timestamp in outbound message");
        }

        x => panic!("Expected PingRequest being sent, instead found {:?}", x),
    }
}

#[test]
fn sends_ack_after_receiving_window_ack_bytes() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let packet = serialize_message(&mut serializer, RtmpMessage::WindowAcknowledgement { size: 100 }, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    consume_results(&mut deserializer, results);

    let send_unknown = |serializer: &mut ChunkSerializer, session: &mut ClientSession, length: usize| {
        let message = RtmpMessage::Unknown {
            type_id: 30,
            data: Bytes::from(vec![1; length]),
        };

        let packet = serialize_message(serializer, message, 0);
        session.handle_input(&packet.bytes[..]).unwrap()
    };

    let results = send_unknown(&mut serializer, &mut session, 101);
    let (mut responses, _) = split_results(&mut deserializer, results);
    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    match responses.remove(0) {
        (_, RtmpMessage::Acknowledgement { .. }) => (),
        x => panic!("Expected Acknowledgement, instead received: {:?}", x),
    }

    let results = send_unknown(&mut serializer, &mut session, 1);
    let (responses, _) = split_results(&mut deserializer, results);
    assert_eq!(responses.len(), 0, "Expected no responses");

    let results = send_unknown(&mut serializer, &mut session, 100);
    let (mut responses, _) = split_results(&mut deserializer, results);
    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    match responses.remove(0) {
        (_, RtmpMessage::Acknowledgement { .. }) => (),
        x => panic!("Expected Acknowledgement, instead received: {:?}", x),
    }
}

#[test]
fn event_raised_when_server_sends_an_acknowledgement() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::Acknowledgement { sequence_number: 5000 };
    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(
        events,
        vec![ClientSessionEvent::AcknowledgementReceived { bytes_received: 5000 }]
    );
}

#[test]
fn set_peer_bandwidth_updates_window_ack_size() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config.clone()).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let unchanged = RtmpMessage::SetPeerBandwidth {
        size: config.window_ack_size,
        limit_type: PeerBandwidthLimitType::Dynamic,
    };

    let packet = serialize_message(&mut serializer, unchanged, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (responses, _) = split_results(&mut deserializer, results);
    assert_eq!(responses.len(), 0, "Same size should not be acknowledged again");

    let changed = RtmpMessage::SetPeerBandwidth {
        size: 5000,
        limit_type: PeerBandwidthLimitType::Hard,
    };

    let packet = serialize_message(&mut serializer, changed, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (mut responses, _) = split_results(&mut deserializer, results);
    match responses.remove(0) {
        (_, RtmpMessage::WindowAcknowledgement { size }) => assert_eq!(size, 5000),
        x => panic!("Expected WindowAcknowledgement, instead received: {:?}", x),
    }
}

#[test]
fn successful_publish_request_workflow() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    perform_successful_publish_request(&mut session, &mut serializer, &mut deserializer);

    assert_eq!(
        session.state(),
        &ClientState::Publishing {
            stream_key: "abcd".to_string()
        },
        "Unexpected state"
    );
}

#[test]
fn event_raised_when_publish_request_rejected() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let results = session
        .request_publishing("abcd".to_string(), PublishRequestType::Live)
        .unwrap();
    let transaction_id = read_create_stream_transaction(&mut deserializer, results);
    let (stream_id, response) = get_create_stream_success_response(transaction_id, &mut serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    consume_results(&mut deserializer, results);

    let response = get_on_status(&mut serializer, stream_id, "error", "NetStream.Publish.BadName");
    let results = session.handle_input(&response.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(
        events,
        vec![ClientSessionEvent::PublishRequestRejected {
            description: "hi".to_string()
        }]
    );
}

#[test]
fn publisher_can_send_metadata() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_publish_request(&mut session, &mut serializer, &mut deserializer);

    let mut metadata = StreamMetadata::new();
    metadata.video_width = Some(1280);
    metadata.video_height = Some(720);
    metadata.encoder = Some("Test Encoder".to_string());

    let packet = session.publish_metadata(&metadata).unwrap();
    let (mut responses, _) = split_results(
        &mut deserializer,
        vec![ClientSessionResult::OutboundResponse(packet)],
    );

    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    match responses.remove(0) {
        (payload, RtmpMessage::Amf0Data { mut values }) => {
            assert_eq!(payload.message_stream_id, stream_id, "Unexpected stream id");
            assert_eq!(values.len(), 3, "Unexpected number of values");
            assert_eq!(values.remove(0), Amf0Value::Utf8String("@setDataFrame".to_string()));
            assert_eq!(values.remove(0), Amf0Value::Utf8String("onMetaData".to_string()));

            let properties = values.remove(0).get_object_properties().unwrap();
            assert_eq!(StreamMetadata::from_amf0_properties(&properties), metadata);
        }

        x => panic!("Expected Amf0Data, instead received: {:?}", x),
    }
}

#[test]
fn publisher_marks_only_inter_frames_droppable() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_publish_request(&mut session, &mut serializer, &mut deserializer);

    let key = MediaFrame::video(VideoCodec::Avc, RtmpTimestamp::new(0), 0, true, Bytes::from_static(&[1]));
    let inter = MediaFrame::video(VideoCodec::Avc, RtmpTimestamp::new(33), 0, false, Bytes::from_static(&[2]));
    let audio = MediaFrame::audio(AudioCodec::Aac, RtmpTimestamp::new(20), Bytes::from_static(&[3]));

    let key_packet = session.publish_frame(&key).unwrap();
    let inter_packet = session.publish_frame(&inter).unwrap();
    let audio_packet = session.publish_frame(&audio).unwrap();

    assert!(!key_packet.can_be_dropped, "Key frames must not be droppable");
    assert!(inter_packet.can_be_dropped, "Inter frames should be droppable");
    assert!(!audio_packet.can_be_dropped, "Audio should not be droppable");

    let (responses, _) = split_results(
        &mut deserializer,
        vec![
            ClientSessionResult::OutboundResponse(key_packet),
            ClientSessionResult::OutboundResponse(inter_packet),
            ClientSessionResult::OutboundResponse(audio_packet),
        ],
    );

    for (payload, _) in &responses {
        assert_eq!(payload.message_stream_id, stream_id, "Unexpected stream id");
    }

    match &responses[1] {
        (payload, RtmpMessage::VideoData { data }) => {
            assert_eq!(payload.timestamp, RtmpTimestamp::new(33), "Unexpected timestamp");
            assert_eq!(&data[..], &[0x27, 1, 0, 0, 0, 2], "Unexpected video tag");
        }

        x => panic!("Expected VideoData, instead received: {:?}", x),
    }
}

#[test]
fn hevc_cannot_be_published_without_enhanced_rtmp() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    perform_successful_publish_request(&mut session, &mut serializer, &mut deserializer);

    let frame = MediaFrame::video(VideoCodec::Hevc, RtmpTimestamp::new(0), 0, true, Bytes::from_static(&[1]));
    match session.publish_frame(&frame) {
        Err(ClientSessionError::EncodeError(EncodeError::EnhancedRtmpRequired { .. })) => (),
        x => panic!("Expected EnhancedRtmpRequired, instead received: {:?}", x),
    }
}

#[test]
fn frames_cannot_be_published_before_publish_is_accepted() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let frame = MediaFrame::audio(AudioCodec::Aac, RtmpTimestamp::new(0), Bytes::new());
    match session.publish_frame(&frame) {
        Err(ClientSessionError::SessionInInvalidState { .. }) => (),
        x => panic!("Expected SessionInInvalidState, instead received: {:?}", x),
    }
}

#[test]
fn can_stop_publishing() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);
    let stream_id = perform_successful_publish_request(&mut session, &mut serializer, &mut deserializer);

    let results = session.stop_publishing().unwrap();
    let (mut responses, _) = split_results(&mut deserializer, results);

    assert_eq!(responses.len(), 2, "Unexpected number of responses");
    match responses.remove(0) {
        (
            _,
            RtmpMessage::Amf0Command {
                command_name,
                additional_arguments,
                ..
            },
        ) => {
            assert_eq!(command_name, "FCUnpublish", "Unexpected command name");
            assert_eq!(additional_arguments, vec![Amf0Value::Utf8String("abcd".to_string())]);
        }

        x => panic!("Expected FCUnpublish, instead received: {:?}", x),
    }

    assert_delete_stream(responses.remove(0), stream_id);
}

#[test]
fn close_command_closes_the_session() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::Amf0Command {
        command_name: "close".to_string(),
        transaction_id: 0.0,
        command_object: Amf0Value::Null,
        additional_arguments: Vec::new(),
    };

    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(events, vec![ClientSessionEvent::ConnectionClosed]);
    assert_eq!(session.state(), &ClientState::Closed, "Unexpected state");
}

#[test]
fn unknown_transaction_results_raise_event() {
    let config = ClientSessionConfig::new();
    let mut deserializer = ChunkDeserializer::new();
    let mut serializer = ChunkSerializer::new();
    let (mut session, initial_results) = ClientSession::new(config).unwrap();
    consume_results(&mut deserializer, initial_results);

    perform_successful_connect("test".to_string(), &mut session, &mut serializer, &mut deserializer);

    let message = RtmpMessage::Amf0Command {
        command_name: "_result".to_string(),
        transaction_id: 99.0,
        command_object: Amf0Value::Null,
        additional_arguments: Vec::new(),
    };

    let packet = serialize_message(&mut serializer, message, 0);
    let results = session.handle_input(&packet.bytes[..]).unwrap();
    let (_, events) = split_results(&mut deserializer, results);

    assert_eq!(
        events,
        vec![ClientSessionEvent::UnknownTransactionResultReceived {
            transaction_id: 99.0,
            command_object: Amf0Value::Null,
            additional_values: Vec::new(),
        }]
    );
}

fn split_results(
    deserializer: &mut ChunkDeserializer,
    results: Vec<ClientSessionResult>,
) -> (Vec<(MessagePayload, RtmpMessage)>, Vec<ClientSessionEvent>) {
    let mut responses = Vec::new();
    let mut events = Vec::new();

    for result in results {
        match result {
            ClientSessionResult::OutboundResponse(packet) => {
                for payload in deserializer.deframe(&packet.bytes[..]).unwrap() {
                    let message = payload.to_rtmp_message().unwrap();
                    println!("response received: {:?}", message);
                    responses.push((payload, message));
                }
            }

            ClientSessionResult::RaisedEvent(event) => {
                println!("event received: {:?}", event);
                events.push(event);
            }

            ClientSessionResult::UnhandleableMessageReceived(payload) => {
                println!("unhandleable message: {:?}", payload);
            }
        }
    }

    (responses, events)
}

fn consume_results(deserializer: &mut ChunkDeserializer, results: Vec<ClientSessionResult>) {
    // Needed to keep the deserializer up to date
    split_results(deserializer, results);
}

fn serialize_message(serializer: &mut ChunkSerializer, message: RtmpMessage, stream_id: u32) -> Packet {
    let payload = message
        .into_message_payload(RtmpTimestamp::new(0), stream_id)
        .unwrap();
    serializer.serialize(&payload, false, false).unwrap()
}

fn serialize_frame(serializer: &mut ChunkSerializer, frame: &MediaFrame, stream_id: u32) -> Packet {
    let message = match frame.kind() {
        crate::media::MediaKind::Video => RtmpMessage::VideoData {
            data: flv::encode_video_tag(frame, false).unwrap(),
        },

        crate::media::MediaKind::Audio => RtmpMessage::AudioData {
            data: flv::encode_audio_tag(frame).unwrap(),
        },
    };

    let payload = message
        .into_message_payload(frame.timestamp(), stream_id)
        .unwrap();
    serializer.serialize(&payload, false, false).unwrap()
}

fn status_object(level: &str, code: &str) -> Amf0Value {
    let mut properties = HashMap::new();
    properties.insert("level".to_string(), Amf0Value::Utf8String(level.to_string()));
    properties.insert("code".to_string(), Amf0Value::Utf8String(code.to_string()));
    properties.insert("description".to_string(), Amf0Value::Utf8String("hi".to_string()));
    Amf0Value::Object(properties)
}

fn get_connect_success_response(serializer: &mut ChunkSerializer) -> Packet {
    let mut command_properties = HashMap::new();
    command_properties.insert("fmsVer".to_string(), Amf0Value::Utf8String("fms".to_string()));
    command_properties.insert("capabilities".to_string(), Amf0Value::Number(31.0));

    let message = RtmpMessage::Amf0Command {
        command_name: "_result".to_string(),
        transaction_id: 1.0,
        command_object: Amf0Value::Object(command_properties),
        additional_arguments: vec![status_object("status", "NetConnection.Connect.Success")],
    };

    serialize_message(serializer, message, 0)
}

fn get_connect_error_response(serializer: &mut ChunkSerializer) -> Packet {
    let message = RtmpMessage::Amf0Command {
        command_name: "_error".to_string(),
        transaction_id: 1.0,
        command_object: Amf0Value::Null,
        additional_arguments: vec![status_object("error", "NetConnection.Connect.Rejected")],
    };

    serialize_message(serializer, message, 0)
}

fn get_create_stream_success_response(transaction_id: f64, serializer: &mut ChunkSerializer) -> (u32, Packet) {
    let stream_id = rand::thread_rng().gen_range(1..100_000);
    let message = RtmpMessage::Amf0Command {
        command_name: "_result".to_string(),
        command_object: Amf0Value::Null,
        additional_arguments: vec![Amf0Value::Number(stream_id as f64)],
        transaction_id,
    };

    (stream_id, serialize_message(serializer, message, 0))
}

fn get_on_status(serializer: &mut ChunkSerializer, stream_id: u32, level: &str, code: &str) -> Packet {
    let message = RtmpMessage::Amf0Command {
        command_name: "onStatus".to_string(),
        transaction_id: 0.0,
        command_object: Amf0Value::Null,
        additional_arguments: vec![status_object(level, code)],
    };

    serialize_message(serializer, message, stream_id)
}

/// Reads the outbound results of a play or publish request and returns the transaction id of
/// the `createStream` command among them
fn read_create_stream_transaction(deserializer: &mut ChunkDeserializer, results: Vec<ClientSessionResult>) -> f64 {
    let (responses, _) = split_results(deserializer, results);
    for response in responses {
        if let (
            _,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                ..
            },
        ) = response
        {
            if command_name == "createStream" {
                return transaction_id;
            }
        }
    }

    panic!("No createStream command was sent");
}

fn assert_delete_stream(response: (MessagePayload, RtmpMessage), stream_id: u32) {
    match response {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            },
        ) => {
            assert_eq!(payload.message_stream_id, stream_id, "Unexpected message stream id");
            assert_eq!(command_name, "deleteStream", "Unexpected command name");
            assert_eq!(command_object, Amf0Value::Null, "Unexpected command object");
            assert_eq!(
                additional_arguments,
                vec![Amf0Value::Number(stream_id as f64)],
                "Unexpected argument stream id"
            );
            assert_eq!(transaction_id, 0.0, "Unexpected transaction id");
        }

        x => panic!("Expected Amf0 command, instead received: {:?}", x),
    }
}

fn perform_successful_connect(
    app_name: String,
    session: &mut ClientSession,
    serializer: &mut ChunkSerializer,
    deserializer: &mut ChunkDeserializer,
) {
    let results = session.request_connection(app_name).unwrap();
    consume_results(deserializer, vec![results]);

    let response = get_connect_success_response(serializer);
    let results = session.handle_input(&response.bytes[..]).unwrap();
    let (_, mut events) = split_results(deserializer, results);

    assert_eq!(events.len(), 1, "Expected one event returned");
    match events.remove(0) {
        ClientSessionEvent::ConnectionRequestAccepted => (),
        x => panic!("Expected connection accepted event, instead received: {:?}", x),
    }
}

fn perform_successful_play_request(
    config: &ClientSessionConfig,
    session: &mut ClientSession,
    serializer: &mut ChunkSerializer,
    deserializer: &mut ChunkDeserializer,
) -> u32 {
    let stream_key = "abcd".to_string();
    let result = session.request_playback(stream_key.clone()).unwrap();
    let (mut responses, _) = split_results(deserializer, vec![result]);

    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    let transaction_id = match responses.remove(0) {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            },
        ) => {
            assert_eq!(payload.message_stream_id, 0, "Unexpected stream id");
            assert_eq!(command_name, "createStream", "Unexpected command name");
            assert_eq!(command_object, Amf0Value::Null, "Unexpected command object");
            assert_eq!(additional_arguments.len(), 0, "Unexpected number of additional arguments");
            transaction_id
        }

        x => panic!("Unexpected response seen: {:?}", x),
    };

    let (created_stream_id, create_stream_response) = get_create_stream_success_response(transaction_id, serializer);
    let results = session.handle_input(&create_stream_response.bytes[..]).unwrap();
    let (mut responses, _) = split_results(deserializer, results);

    assert_eq!(responses.len(), 2, "Unexpected number of responses");
    match responses.remove(0) {
        (
            payload,
            RtmpMessage::UserControl(UserControlEvent::SetBufferLength {
                stream_id,
                buffer_length,
            }),
        ) => {
            assert_eq!(payload.message_stream_id, 0, "Unexpected message stream id");
            assert_eq!(stream_id, created_stream_id, "Unexpected user control stream id");
            assert_eq!(buffer_length, config.playback_buffer_length_ms, "Unexpected buffer length");
        }

        x => panic!("Expected set buffer length message, instead received: {:?}", x),
    }

    match responses.remove(0) {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            },
        ) => {
            assert_eq!(payload.message_stream_id, created_stream_id, "Unexpected message stream id");
            assert_eq!(command_name, "play", "Unexpected command name");
            assert_eq!(transaction_id, 0.0, "Unexpected transaction id");
            assert_eq!(command_object, Amf0Value::Null, "Unexpected command object");
            assert_eq!(
                additional_arguments,
                vec![Amf0Value::Utf8String(stream_key)],
                "Unexpected play arguments"
            );
        }

        x => panic!("Expected play message, instead received: {:?}", x),
    };

    let play_response = get_on_status(serializer, created_stream_id, "status", "NetStream.Play.Start");
    let results = session.handle_input(&play_response.bytes[..]).unwrap();
    let (_, events) = split_results(deserializer, results);

    assert_eq!(events, vec![ClientSessionEvent::PlaybackRequestAccepted]);
    created_stream_id
}

fn perform_successful_publish_request(
    session: &mut ClientSession,
    serializer: &mut ChunkSerializer,
    deserializer: &mut ChunkDeserializer,
) -> u32 {
    let stream_key = "abcd".to_string();
    let results = session
        .request_publishing(stream_key.clone(), PublishRequestType::Live)
        .unwrap();
    let (responses, _) = split_results(deserializer, results);

    let names: Vec<_> = responses
        .iter()
        .map(|(_, message)| match message {
            RtmpMessage::Amf0Command { command_name, .. } => command_name.clone(),
            x => panic!("Expected only commands, instead received: {:?}", x),
        })
        .collect();

    assert_eq!(names, vec!["releaseStream", "FCPublish", "createStream"], "Unexpected commands");
    let transaction_id = match &responses[2] {
        (_, RtmpMessage::Amf0Command { transaction_id, .. }) => *transaction_id,
        _ => unreachable!(),
    };

    let (created_stream_id, create_stream_response) = get_create_stream_success_response(transaction_id, serializer);
    let results = session.handle_input(&create_stream_response.bytes[..]).unwrap();
    let (mut responses, _) = split_results(deserializer, results);

    assert_eq!(responses.len(), 1, "Unexpected number of responses");
    match responses.remove(0) {
        (
            payload,
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            },
        ) => {
            assert_eq!(payload.message_stream_id, created_stream_id, "Unexpected stream id");
            assert_eq!(command_name, "publish", "Unexpected command name");
            assert_eq!(command_object, Amf0Value::Null, "Unexpected command object");
            assert_eq!(transaction_id, 0.0, "Unexpected transaction id");
            assert_eq!(
                additional_arguments,
                vec![
                    Amf0Value::Utf8String(stream_key),
                    Amf0Value::Utf8String("live".to_string()),
                ],
                "Unexpected publish arguments"
            );
        }

        x => panic!("Expected amf0 command, received: {:?}", x),
    };

    let publish_response = get_on_status(serializer, created_stream_id, "status", "NetStream.Publish.Start");
    let results = session.handle_input(&publish_response.bytes[..]).unwrap();
    let (_, events) = split_results(deserializer, results);

    assert_eq!(events, vec![ClientSessionEvent::PublishRequestAccepted]);
    created_stream_id
}
