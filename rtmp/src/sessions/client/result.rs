use crate::chunk_io::Packet;
use crate::messages::MessagePayload;
use crate::sessions::ClientSessionEvent;

/// What the client session hands back after each request or chunk of input
#[derive(PartialEq, Debug)]
pub enum ClientSessionResult {
    /// Bytes for the server.  Packets must go out in the order they were returned, since later
    /// chunk headers are compressed against earlier ones; only packets flagged droppable may
    /// be skipped.
    OutboundResponse(Packet),

    RaisedEvent(ClientSessionEvent),

    /// A message the session has no handling for, passed on for logging
    UnhandleableMessageReceived(MessagePayload),
}
