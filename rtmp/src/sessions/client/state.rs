#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Client has not connected to an application on the server yet
    Disconnected,

    /// A connect request was sent and we are waiting for the server's answer
    ConnectRequested { app_name: String },

    /// The client has connected to an application on the server
    Connected,

    /// Playback has been requested for a stream key and we are still waiting for a response
    PlayRequested { stream_key: String },

    /// We are currently playing back a stream from the server
    Playing { stream_key: String },

    /// Publishing has been requested for a stream key and we are still waiting for a response
    PublishRequested { stream_key: String },

    /// We are currently publishing to the server
    Publishing { stream_key: String },

    /// The server closed the connection, nothing more can be done with this session
    Closed,
}
