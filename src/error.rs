//! Error types for the peer mesh and recording protocol

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mesh and recording operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling exchange error
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Non-offer signal received for an address with no live peer
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// Peer closed a second time
    #[error("Peer already closed: {0}")]
    AlreadyClosed(String),

    /// Operation attempted on a closed peer
    #[error("Peer is closed: {0}")]
    PeerClosed(String),

    /// Recording start requested twice
    #[error("Recording already started: {0}")]
    AlreadyStarted(String),

    /// Recording stop requested twice, or start after stop
    #[error("Recording already stopped: {0}")]
    AlreadyStopped(String),

    /// Data channel closed before the protocol completed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Unexpected message or sequence on a protocol channel
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Data channel error
    #[error("Data channel error: {0}")]
    DataChannelError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidateError(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// WAV encoding error
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a state-machine misuse raised at the call site
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyClosed(_)
                | Error::PeerClosed(_)
                | Error::AlreadyStarted(_)
                | Error::AlreadyStopped(_)
        )
    }

    /// Check if this error is a protocol violation (fatal to the peer/session only)
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::UnknownPeer(_) | Error::ProtocolViolation(_))
    }

    /// Check if this error is a transport-level failure
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Error::DataChannelError(_)
                | Error::SdpError(_)
                | Error::IceCandidateError(_)
                | Error::PeerConnectionError(_)
                | Error::ChannelClosed(_)
                | Error::Timeout(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownPeer("abc".to_string());
        assert_eq!(err.to_string(), "Unknown peer: abc");

        let err = Error::AlreadyClosed("abc".to_string());
        assert_eq!(err.to_string(), "Peer already closed: abc");
    }

    #[test]
    fn test_error_is_state_error() {
        assert!(Error::AlreadyClosed("x".to_string()).is_state_error());
        assert!(Error::AlreadyStarted("x".to_string()).is_state_error());
        assert!(Error::AlreadyStopped("x".to_string()).is_state_error());
        assert!(Error::PeerClosed("x".to_string()).is_state_error());
        assert!(!Error::UnknownPeer("x".to_string()).is_state_error());
    }

    #[test]
    fn test_error_is_protocol_violation() {
        assert!(Error::UnknownPeer("x".to_string()).is_protocol_violation());
        assert!(Error::ProtocolViolation("x".to_string()).is_protocol_violation());
        assert!(!Error::SdpError("x".to_string()).is_protocol_violation());
    }

    #[test]
    fn test_error_is_transport_error() {
        assert!(Error::DataChannelError("x".to_string()).is_transport_error());
        assert!(Error::Timeout("x".to_string()).is_transport_error());
        assert!(!Error::InvalidConfig("x".to_string()).is_transport_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
