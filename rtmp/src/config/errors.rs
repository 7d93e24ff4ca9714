use thiserror::Error;

/// Settings that cannot be turned into a usable session configuration.  These are reported
/// synchronously when a session is started, and no session is created.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("A stream url is required")]
    MissingUrl,

    #[error("Invalid stream url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Codec id {codec_id} is not supported for {field}")]
    UnsupportedCodec { field: &'static str, codec_id: i64 },

    #[error("{codec} can only be published with enhanced RTMP enabled")]
    EnhancedRtmpRequired { codec: &'static str },

    #[error("Settings cannot be changed while a session is active")]
    SessionActive,
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
