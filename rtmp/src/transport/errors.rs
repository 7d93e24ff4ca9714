use std::io;
use thiserror::Error;

/// Failures of the byte stream underneath the RTMP session
#[derive(Debug, Error)]
pub enum TransportError {
    /// No data could be read or written within the configured timeout.  The connection itself
    /// may still be alive.
    #[error("Timed out after {millis}ms while {operation}")]
    Timeout { operation: &'static str, millis: u64 },

    #[error("Connection was reset by the peer")]
    ConnectionReset,

    #[error("Could not resolve host '{host}'")]
    DnsFailure { host: String },

    #[error("TLS failure: {reason}")]
    Tls { reason: String },

    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("{0}")]
    Io(io::Error),
}

impl TransportError {
    /// Timeouts and resets are worth reconnecting for, everything else will fail the same way
    /// on the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::ConnectionReset | TransportError::Io(_)
        )
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportError::ConnectionReset,

            io::ErrorKind::TimedOut => TransportError::Timeout {
                operation: "waiting on the socket",
                millis: 0,
            },

            _ => TransportError::Io(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_are_distinguished_from_other_io_errors() {
        let reset: TransportError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        let eof: TransportError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        let other: TransportError = io::Error::from(io::ErrorKind::PermissionDenied).into();

        assert!(matches!(reset, TransportError::ConnectionReset));
        assert!(matches!(eof, TransportError::ConnectionReset));
        assert!(matches!(other, TransportError::Io(_)));
    }

    #[test]
    fn endpoint_errors_are_not_retryable() {
        let error = TransportError::InvalidEndpoint {
            url: "x".to_string(),
            reason: "y".to_string(),
        };

        assert!(!error.is_retryable());
        assert!(TransportError::ConnectionReset.is_retryable());
    }
}
