use rtmp_stream_amf0::Amf0Value;

/// The `info` object servers attach to `onStatus`, `_error` and some `_result` commands
#[derive(PartialEq, Debug, Clone)]
pub struct StatusInfo {
    pub level: String,
    pub code: String,
    pub description: String,
}

impl StatusInfo {
    /// Reads the status object out of an AMF0 value.  A value without a `code` property is
    /// not a status object.
    pub fn from_amf0(value: &Amf0Value) -> Option<StatusInfo> {
        let code = value.property("code")?.as_str()?.to_string();
        let level = value
            .property("level")
            .and_then(Amf0Value::as_str)
            .unwrap_or("status")
            .to_string();

        let description = value
            .property("description")
            .and_then(Amf0Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(StatusInfo { level, code, description })
    }

    pub fn is_error(&self) -> bool {
        self.level == "error"
    }
}

/// A command message from the server, decoded into what the session state machine reacts to
#[derive(PartialEq, Debug, Clone)]
pub enum ControlEvent {
    /// `_result` for one of our transactions
    CommandResult {
        transaction_id: f64,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    },

    /// `_error` for one of our transactions
    CommandError {
        transaction_id: f64,
        status: Option<StatusInfo>,
    },

    /// `onStatus` for a NetStream or NetConnection
    OnStatus { stream_id: u32, status: StatusInfo },

    /// The server asked us to close the connection
    Close,

    /// `onBWDone`, `onFCPublish` and friends, which carry nothing we act on
    Notification { command_name: String },

    /// Any other command
    Other {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    },
}

pub(super) fn decode_command(
    stream_id: u32,
    command_name: String,
    transaction_id: f64,
    command_object: Amf0Value,
    arguments: Vec<Amf0Value>,
) -> ControlEvent {
    match command_name.as_str() {
        "_result" => ControlEvent::CommandResult {
            transaction_id,
            command_object,
            arguments,
        },

        "_error" => ControlEvent::CommandError {
            transaction_id,
            status: arguments.first().and_then(StatusInfo::from_amf0),
        },

        "onStatus" => match arguments.first().and_then(StatusInfo::from_amf0) {
            Some(status) => ControlEvent::OnStatus { stream_id, status },
            None => ControlEvent::Other {
                command_name,
                transaction_id,
                command_object,
                arguments,
            },
        },

        "close" => ControlEvent::Close,

        "onBWDone" | "onFCPublish" | "onFCUnpublish" | "_checkbw" => {
            ControlEvent::Notification { command_name }
        }

        _ => ControlEvent::Other {
            command_name,
            transaction_id,
            command_object,
            arguments,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn status_object(level: &str, code: &str) -> Amf0Value {
        let mut properties = HashMap::new();
        properties.insert("level".to_string(), Amf0Value::Utf8String(level.to_string()));
        properties.insert("code".to_string(), Amf0Value::Utf8String(code.to_string()));
        properties.insert("description".to_string(), Amf0Value::Utf8String("desc".to_string()));
        Amf0Value::Object(properties)
    }

    #[test]
    fn on_status_is_decoded_with_its_stream() {
        let event = decode_command(
            1,
            "onStatus".to_string(),
            0.0,
            Amf0Value::Null,
            vec![status_object("status", "NetStream.Play.Start")],
        );

        match event {
            ControlEvent::OnStatus { stream_id: 1, status } => {
                assert_eq!(status.code, "NetStream.Play.Start");
                assert_eq!(status.description, "desc");
                assert!(!status.is_error());
            }

            x => panic!("Expected OnStatus, instead received {:?}", x),
        }
    }

    #[test]
    fn error_carries_status_when_present() {
        let event = decode_command(
            0,
            "_error".to_string(),
            4.0,
            Amf0Value::Null,
            vec![status_object("error", "NetConnection.Connect.Rejected")],
        );

        match event {
            ControlEvent::CommandError {
                transaction_id,
                status: Some(status),
            } => {
                assert_eq!(transaction_id, 4.0);
                assert!(status.is_error());
            }

            x => panic!("Expected CommandError, instead received {:?}", x),
        }
    }

    #[test]
    fn on_status_without_code_is_passed_through() {
        let event = decode_command(0, "onStatus".to_string(), 0.0, Amf0Value::Null, vec![Amf0Value::Null]);

        match event {
            ControlEvent::Other { command_name, .. } => assert_eq!(command_name, "onStatus"),
            x => panic!("Expected Other, instead received {:?}", x),
        }
    }

    #[test]
    fn bandwidth_notifications_are_recognized() {
        let event = decode_command(0, "onBWDone".to_string(), 0.0, Amf0Value::Null, Vec::new());
        assert_eq!(
            event,
            ControlEvent::Notification {
                command_name: "onBWDone".to_string()
            }
        );
    }
}
