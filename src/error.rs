use thiserror::Error;

/// Result type for Home Assistant client operations
pub type Result<T> = std::result::Result<T, HassError>;

/// Errors that can occur when talking to a Home Assistant server
#[derive(Error, Debug)]
pub enum HassError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection was closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// A single inbound frame could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The server rejected our access token
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The server answered a command with `success: false`
    #[error("Command {id} failed with {code}: {message}")]
    CommandFailed {
        /// Correlation id of the failed command
        id: u64,
        /// Error code from the server (string on the wire)
        code: String,
        /// Error message from the server
        message: String,
    },

    /// An inbound message carried a `type` we do not know
    #[error("Unrecognized message type: {0}")]
    UnrecognizedMessage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}
