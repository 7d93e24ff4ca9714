use std::io;
use thiserror::Error;

/// Failures while exchanging the C0/C1/C2 and S0/S1/S2 packets
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Peer requested RTMP version {version}, only version 3 is supported")]
    ProtocolMismatch { version: u8 },

    #[error("Peer did not echo back our random data or a valid digest")]
    IncorrectRandomData,

    #[error("Handshake did not complete within {millis}ms")]
    Timeout { millis: u64 },

    #[error("Transport closed before the handshake completed")]
    TransportClosed,

    #[error("Handshake has already been completed")]
    AlreadyCompleted,

    #[error("Failed to compute the handshake digest")]
    DigestFailure,

    #[error("{0}")]
    Io(#[from] io::Error),
}
