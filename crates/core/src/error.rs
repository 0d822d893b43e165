//! Error taxonomy shared by the transport and the orchestrator.

/// Errors surfaced by the transport layer or reported by the server.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// An operation needed a socket but none has been opened.
    #[error("Socket is not connected")]
    NotConnected,
    /// A socket exists but is not in an open-ready state.
    #[error("Incorrect socket state")]
    InvalidState,
    /// The socket could not be opened.
    #[error("Error opening socket: {0}")]
    Connect(String),
    /// A single frame could not be written.
    #[error("Failed to send frame: {0}")]
    Send(String),
    /// An inbound text frame was not a valid protocol message.
    #[error("Malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server reported an `Error` event.
    #[error("Server: {0}")]
    Server(String),
    /// The socket reported an error while connected.
    #[error("Socket error: {0}")]
    Socket(String),
    /// The peer closed the socket while a session was active.
    #[error("Socket closed unexpectedly")]
    Closed,
}
