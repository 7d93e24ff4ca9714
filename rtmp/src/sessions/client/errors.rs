use crate::chunk_io::FramingError;
use crate::media::{DecodeError, EncodeError};
use crate::messages::{MessageDeserializationError, MessageSerializationError};
use crate::sessions::ClientState;
use thiserror::Error;

/// Errors a client session can run into.  All of them leave the session unusable.
#[derive(Debug, Error)]
pub enum ClientSessionError {
    /// Encountered when incoming bytes could not be deframed, or outbound messages framed
    #[error("An error occurred framing or deframing chunks: {0}")]
    FramingError(#[from] FramingError),

    /// Encountered when an error occurs while turning an RTMP message into an message payload
    #[error(
        "An error occurred while attempting to turn an RTMP message into a message payload: {0}"
    )]
    MessageSerializationError(#[from] MessageSerializationError),

    /// Encountered when an error occurs while turning a message payload into an RTMP message
    #[error(
        "An error occurred while attempting to turn a message payload into an RTMP message: {0}"
    )]
    MessageDeserializationError(#[from] MessageDeserializationError),

    /// A media frame could not be packaged for sending
    #[error("A media frame could not be encoded: {0}")]
    EncodeError(#[from] EncodeError),

    /// Media received from the server could not be unpacked
    #[error("Received media could not be decoded: {0}")]
    DecodeError(#[from] DecodeError),

    /// Encountered if a connection request is made while we are already connected
    #[error(
        "A connection request was attempted while this session is already in a connected state"
    )]
    CantConnectWhileAlreadyConnected,

    /// Encountered if a request is made, or a response is received for a request while the
    /// client session is not in a valid state for that purpose.
    #[error(
        "The request could not be performed while the session is in the {current_state:?} state"
    )]
    SessionInInvalidState { current_state: ClientState },

    /// Encountered when attempting to send a message that requires having an active stream
    /// opened but none is marked down.  This means we are in a valid state (e.g. `Playing` or
    /// `Publishing`) yet we never recorded what stream id we are publishing/playing on.
    #[error("No known stream id is active to perform publish/playback actions on")]
    NoKnownActiveStreamIdWhenRequired,

    /// Encountered when the client requests a stream be created and the server rejects the command
    #[error("An attempt to create a stream on the server failed")]
    CreateStreamFailed,

    /// A response to a `createStream` request should have a numeric as the first parameter
    /// in the additional values property of the amf0 command.  Without a stream ID we have no
    /// way to know what stream to communicate with for playback/publishing messages.
    #[error("The server sent a create stream success result without a stream id")]
    CreateStreamResponseHadNoStreamNumber,
}
