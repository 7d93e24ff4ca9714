//! Strategies for applying a crypto key to the stream name sent in `play` and `publish`.
//!
//! Streaming services disagree on what a key means, so the engine only asks a
//! [`StreamAuthenticator`] for the final stream name and never interprets the key itself.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait StreamAuthenticator: Send + Sync + Debug {
    /// Returns the stream name to request for `stream_key` given the configured crypto key
    fn stream_name(&self, stream_key: &str, crypto_key: &str) -> String;
}

/// Ignores the crypto key entirely
#[derive(Debug, Clone, Default)]
pub struct NoAuthentication;

impl StreamAuthenticator for NoAuthentication {
    fn stream_name(&self, stream_key: &str, _crypto_key: &str) -> String {
        stream_key.to_string()
    }
}

/// Passes the crypto key as a query parameter on the stream name, e.g. `abcd?key=secret`
#[derive(Debug, Clone)]
pub struct StreamKeyParameter {
    parameter: String,
}

impl StreamKeyParameter {
    pub fn new(parameter: impl Into<String>) -> StreamKeyParameter {
        StreamKeyParameter {
            parameter: parameter.into(),
        }
    }
}

impl Default for StreamKeyParameter {
    fn default() -> Self {
        StreamKeyParameter::new("key")
    }
}

impl StreamAuthenticator for StreamKeyParameter {
    fn stream_name(&self, stream_key: &str, crypto_key: &str) -> String {
        if crypto_key.is_empty() {
            return stream_key.to_string();
        }

        append_query(stream_key, &format!("{}={}", self.parameter, crypto_key))
    }
}

/// Signs the stream key with HMAC-SHA256, producing `abcd?expires=<unix secs>&token=<hex>`
/// where the token covers `abcd:<expires>`.  Servers holding the same secret can verify the
/// name without a callback.
#[derive(Debug, Clone)]
pub struct SignedStreamToken {
    valid_for: Duration,
}

impl SignedStreamToken {
    pub fn new(valid_for: Duration) -> SignedStreamToken {
        SignedStreamToken { valid_for }
    }

    /// Signs with an explicit expiry, in seconds since the unix epoch
    pub fn sign(stream_key: &str, crypto_key: &str, expires: u64) -> String {
        let token = match Hmac::<Sha256>::new_from_slice(crypto_key.as_bytes()) {
            Ok(mut mac) => {
                mac.update(format!("{}:{}", stream_key, expires).as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }

            // HMAC accepts keys of any length
            Err(_) => String::new(),
        };

        append_query(stream_key, &format!("expires={}&token={}", expires, token))
    }
}

impl Default for SignedStreamToken {
    fn default() -> Self {
        SignedStreamToken::new(Duration::from_secs(3600))
    }
}

impl StreamAuthenticator for SignedStreamToken {
    fn stream_name(&self, stream_key: &str, crypto_key: &str) -> String {
        if crypto_key.is_empty() {
            return stream_key.to_string();
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        SignedStreamToken::sign(stream_key, crypto_key, (now + self.valid_for).as_secs())
    }
}

fn append_query(stream_key: &str, query: &str) -> String {
    let separator = if stream_key.contains('?') { '&' } else { '?' };
    format!("{}{}{}", stream_key, separator, query)
}
