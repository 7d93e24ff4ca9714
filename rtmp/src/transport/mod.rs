//! The transport manager owns the byte stream an RTMP session runs over.
//!
//! Connections are opened through a [`Connector`] (plain TCP, or TLS for `rtmps` endpoints),
//! and wrapped in a [`Transport`] that applies read and write timeouts.  A read timeout is
//! reported as [`TransportError::Timeout`] and kept distinct from a reset connection so callers
//! can decide between retrying and giving up.

mod connector;
mod endpoint;
mod errors;
mod tls;

pub use self::connector::{BoxedStream, ByteStream, Connector, TcpConnector};
pub use self::endpoint::{Endpoint, Scheme, DEFAULT_RTMPS_PORT, DEFAULT_RTMP_PORT};
pub use self::errors::TransportError;
pub use self::tls::{client_config, client_config_from_pem_file};

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

/// Socket level tunables
#[derive(Debug, Clone)]
pub struct NetworkOptions {
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub read_buffer_size: usize,
}

impl NetworkOptions {
    pub fn new() -> NetworkOptions {
        NetworkOptions {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(10),
            read_buffer_size: 4096,
        }
    }
}

impl Default for NetworkOptions {
    fn default() -> Self {
        NetworkOptions::new()
    }
}

/// An open byte stream with timeouts applied to every read and write
pub struct Transport {
    stream: BoxedStream,
    read_timeout: Duration,
    write_timeout: Duration,
    bytes_read: u64,
    bytes_written: u64,
}

impl Transport {
    pub fn new(stream: BoxedStream, options: &NetworkOptions) -> Transport {
        Transport {
            stream,
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Reads whatever is available into the buffer.  The peer closing the stream is reported as
    /// `ConnectionReset`.  This is cancellation safe.
    pub async fn read(&mut self, buffer: &mut BytesMut) -> Result<usize, TransportError> {
        let bytes_read = timeout(self.read_timeout, self.stream.read_buf(buffer))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "reading",
                millis: self.read_timeout.as_millis() as u64,
            })??;

        if bytes_read == 0 {
            return Err(TransportError::ConnectionReset);
        }

        self.bytes_read += bytes_read as u64;
        Ok(bytes_read)
    }

    /// Writes every byte, retrying partial writes until done or the write timeout elapses
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let write_timeout = self.write_timeout;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };

        timeout(write_timeout, write)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "writing",
                millis: write_timeout.as_millis() as u64,
            })??;

        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        let _ = timeout(self.write_timeout, self.stream.shutdown()).await;
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
