use crate::media::{MediaFrame, StreamMetadata};
use crate::mux::StatusInfo;
use crate::time::RtmpTimestamp;
use rtmp_stream_amf0::Amf0Value;

/// Events that can be raised by the client session so that custom business logic can be written
/// to react to it
#[derive(PartialEq, Debug)]
pub enum ClientSessionEvent {
    /// Raised when a connection request has been accepted by the server
    ConnectionRequestAccepted,

    /// The server has rejected the connection request
    ConnectionRequestRejected { description: String },

    /// The server accepted our request to play a stream
    PlaybackRequestAccepted,

    /// The server refused to play the stream, e.g. because it does not exist
    PlaybackRequestRejected { description: String },

    /// The server accepted our request to publish
    PublishRequestAccepted,

    /// The server refused the publish request, e.g. because the stream key is in use
    PublishRequestRejected { description: String },

    /// The stream being played announced (or changed) its metadata
    StreamMetadataReceived { metadata: StreamMetadata },

    /// An audio or video frame arrived for the stream being played
    MediaFrameReceived { frame: MediaFrame },

    /// An `onStatus` notification that did not complete a pending request
    StreamStatus { status: StatusInfo },

    /// The server signalled the end of the stream being played
    StreamEnded,

    /// Response to a ping we sent, carrying the timestamp we sent it with
    PingResponseReceived { timestamp: RtmpTimestamp },

    /// The server reported how many bytes it has received from us
    AcknowledgementReceived { bytes_received: u32 },

    /// The server asked us to close the connection
    ConnectionClosed,

    /// The server sent an Amf0 command that was not able to be handled
    UnhandleableAmf0Command {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_values: Vec<Amf0Value>,
    },

    /// The server sent us a result to a transaction that we don't know about
    UnknownTransactionResultReceived {
        transaction_id: f64,
        command_object: Amf0Value,
        additional_values: Vec<Amf0Value>,
    },
}
