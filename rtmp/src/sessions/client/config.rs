use crate::chunk_io::MAX_MESSAGE_LENGTH;

/// Configuration options that govern how a RTMP client session should operate
#[derive(Clone, Debug)]
pub struct ClientSessionConfig {
    /// Sent as `flashVer` in the connect request
    pub flash_version: String,

    /// Full URL of the application being connected to, sent as `tcUrl`
    pub tc_url: Option<String>,

    /// Sent as `pageUrl` in the connect request
    pub page_url: Option<String>,

    pub playback_buffer_length_ms: u32,
    pub window_ack_size: u32,
    pub chunk_size: u32,

    /// Inbound messages larger than this are treated as a framing error
    pub max_message_size: u32,

    /// Advertise and use the FourCC video tag format for codecs beyond H.264
    pub enhanced_rtmp: bool,
}

impl ClientSessionConfig {
    /// Creates a new configuration object with default values
    pub fn new() -> ClientSessionConfig {
        ClientSessionConfig {
            flash_version: "LNX 9,0,124,2".to_string(),
            tc_url: None,
            page_url: None,
            playback_buffer_length_ms: 2_000,
            window_ack_size: 2_500_000,
            chunk_size: 4096,
            max_message_size: MAX_MESSAGE_LENGTH,
            enhanced_rtmp: false,
        }
    }
}

impl Default for ClientSessionConfig {
    fn default() -> Self {
        ClientSessionConfig::new()
    }
}
