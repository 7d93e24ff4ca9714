//! This module contains implemented session abstractions.
//!
//! A session is an abstraction that reacts to incoming RTMP messages (encoded as RTMP chunks)
//! with packets to be sent as a response, as well as raising events that applications can
//! perform custom logic on.  Sessions never touch a socket themselves.

mod client;

pub use self::client::ClientSession;
pub use self::client::ClientSessionConfig;
pub use self::client::ClientSessionError;
pub use self::client::ClientSessionEvent;
pub use self::client::ClientSessionResult;
pub use self::client::ClientState;
pub use self::client::PublishRequestType;
