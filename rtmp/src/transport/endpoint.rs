use super::TransportError;
use std::fmt;
use url::Url;

pub const DEFAULT_RTMP_PORT: u16 = 1935;
pub const DEFAULT_RTMPS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Rtmp,
    Rtmps,
}

/// A parsed `rtmp://host[:port]/app[/instance]/stream_key[?query]` address.
///
/// The last path segment (plus any query string) is the stream name, everything between the
/// authority and it is the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Endpoint, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let scheme = match parsed.scheme() {
            "rtmp" => Scheme::Rtmp,
            "rtmps" => Scheme::Rtmps,
            _ => return Err(invalid("scheme must be rtmp or rtmps")),
        };

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("no host")),
        };

        let port = parsed.port().unwrap_or(match scheme {
            Scheme::Rtmp => DEFAULT_RTMP_PORT,
            Scheme::Rtmps => DEFAULT_RTMPS_PORT,
        });

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|x| x.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < 2 {
            return Err(invalid("expected both an application name and a stream key"));
        }

        let (key, app) = segments.split_last().ok_or_else(|| invalid("no stream key"))?;
        let stream_key = match parsed.query() {
            Some(query) => format!("{}?{}", key, query),
            None => key.to_string(),
        };

        Ok(Endpoint {
            scheme,
            host,
            port,
            app: app.join("/"),
            stream_key,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Rtmps
    }

    /// The `tcUrl` advertised in the connect command
    pub fn tc_url(&self) -> String {
        let scheme = match self.scheme {
            Scheme::Rtmp => "rtmp",
            Scheme::Rtmps => "rtmps",
        };

        format!("{}://{}:{}/{}", scheme, self.host, self.port, self.app)
    }

    /// `host:port` for address resolution
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream_key)
    }
}
