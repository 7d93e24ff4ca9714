use super::{Endpoint, NetworkOptions, TransportError};
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Any bidirectional byte stream an RTMP session can run over
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn ByteStream>;

/// Opens byte streams to RTMP endpoints.  The engine only talks to the network through this
/// trait, which lets tests substitute in-memory streams.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError>;
}

/// Connects over TCP, wrapping the socket in TLS for `rtmps` endpoints
pub struct TcpConnector {
    connect_timeout: Duration,
    tls: Option<Arc<ClientConfig>>,
}

impl TcpConnector {
    pub fn new(options: &NetworkOptions) -> TcpConnector {
        TcpConnector {
            connect_timeout: options.connect_timeout,
            tls: None,
        }
    }

    /// Configuration used for `rtmps` endpoints.  Without one, secure endpoints are refused.
    pub fn with_tls(mut self, config: Arc<ClientConfig>) -> TcpConnector {
        self.tls = Some(config);
        self
    }

    async fn wrap(&self, stream: TcpStream, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        if !endpoint.is_secure() {
            return Ok(Box::new(stream));
        }

        let config = self.tls.clone().ok_or_else(|| TransportError::Tls {
            reason: "no TLS configuration available for an rtmps endpoint".to_string(),
        })?;

        let server_name = ServerName::try_from(endpoint.host.clone()).map_err(|e| TransportError::Tls {
            reason: e.to_string(),
        })?;

        let connecting = TlsConnector::from(config).connect(server_name, stream);
        let stream = timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| self.timed_out("negotiating TLS"))?
            .map_err(|e| TransportError::Tls {
                reason: e.to_string(),
            })?;

        Ok(Box::new(stream))
    }

    fn timed_out(&self, operation: &'static str) -> TransportError {
        TransportError::Timeout {
            operation,
            millis: self.connect_timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        let dns_failure = || TransportError::DnsFailure {
            host: endpoint.host.clone(),
        };

        let addresses: Vec<_> = timeout(self.connect_timeout, lookup_host(endpoint.authority()))
            .await
            .map_err(|_| self.timed_out("resolving host"))?
            .map_err(|_| dns_failure())?
            .collect();

        let mut last_error = None;
        for address in addresses {
            match timeout(self.connect_timeout, TcpStream::connect(address)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    debug!(%address, "TCP connection established");
                    return self.wrap(stream, endpoint).await;
                }

                Ok(Err(error)) => {
                    debug!(%address, %error, "Failed to connect");
                    last_error = Some(error.into());
                }

                Err(_) => last_error = Some(self.timed_out("connecting")),
            }
        }

        Err(last_error.unwrap_or_else(dns_failure))
    }
}
