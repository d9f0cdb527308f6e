//! Peer state blobs and connection status mapping

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;

/// Small JSON state blob exchanged over each peer's `"state"` side-channel.
///
/// The host flag is advisory and untrusted; it travels with the rest of the
/// state so the UI can label the recording host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerState {
    /// Display name
    pub name: String,

    /// Whether the participant muted themselves
    pub is_muted: bool,

    /// Whether the participant claims to be the recording host
    pub is_host: bool,
}

impl Default for PeerState {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_muted: false,
            is_host: false,
        }
    }
}

/// Observational connection status derived from the transport's ICE state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Negotiation or ICE checks in progress
    Connecting,
    /// Direct connection established
    Connected,
    /// Connection lost (possibly transiently)
    Disconnected,
}

impl ConnectionStatus {
    /// Map the live transport's ICE state to a status.
    ///
    /// Transient `disconnected` maps the same as `failed`/`closed` for
    /// display purposes; fatality is decided separately (see [`ice_is_fatal`]).
    pub fn from_ice(state: RTCIceConnectionState) -> Self {
        match state {
            RTCIceConnectionState::New
            | RTCIceConnectionState::Checking
            | RTCIceConnectionState::Unspecified => ConnectionStatus::Connecting,
            RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                ConnectionStatus::Connected
            }
            RTCIceConnectionState::Disconnected
            | RTCIceConnectionState::Failed
            | RTCIceConnectionState::Closed => ConnectionStatus::Disconnected,
        }
    }
}

/// Whether an ICE state transition is fatal to the peer.
///
/// Only `failed` and `closed` tear a peer down; transient `disconnected`
/// is left to recover on its own.
pub fn ice_is_fatal(state: RTCIceConnectionState) -> bool {
    matches!(
        state,
        RTCIceConnectionState::Failed | RTCIceConnectionState::Closed
    )
}

/// Remote peer state as observed through the side-channel.
///
/// Starts at `Pending` (no synthetic default is ever fabricated) and ends at
/// a terminal `Failed` or `Ended`.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteState {
    /// No state message received yet
    Pending,
    /// Most recent state received from the remote participant
    Available(PeerState),
    /// The side-channel errored; terminal
    Failed(String),
    /// The peer was closed; terminal unless already failed
    Ended,
}

impl RemoteState {
    /// The current state, if one has arrived
    pub fn peer_state(&self) -> Option<&PeerState> {
        match self {
            RemoteState::Available(state) => Some(state),
            _ => None,
        }
    }

    /// Whether this is a terminal value
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteState::Failed(_) | RemoteState::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_state_wire_format() {
        let state = PeerState {
            name: "ada".to_string(),
            is_muted: true,
            is_host: false,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"name":"ada","isMuted":true,"isHost":false}"#);

        let parsed: PeerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::New),
            ConnectionStatus::Connecting
        );
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::Checking),
            ConnectionStatus::Connecting
        );
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::Connected),
            ConnectionStatus::Connected
        );
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::Completed),
            ConnectionStatus::Connected
        );
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::Disconnected),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            ConnectionStatus::from_ice(RTCIceConnectionState::Failed),
            ConnectionStatus::Disconnected
        );
    }

    #[test]
    fn test_fatality() {
        assert!(ice_is_fatal(RTCIceConnectionState::Failed));
        assert!(ice_is_fatal(RTCIceConnectionState::Closed));
        assert!(!ice_is_fatal(RTCIceConnectionState::Disconnected));
        assert!(!ice_is_fatal(RTCIceConnectionState::Checking));
    }

    #[test]
    fn test_remote_state_accessors() {
        assert!(RemoteState::Pending.peer_state().is_none());
        assert!(!RemoteState::Pending.is_terminal());
        assert!(RemoteState::Failed("boom".to_string()).is_terminal());
        assert!(RemoteState::Ended.is_terminal());

        let state = PeerState::default();
        assert_eq!(
            RemoteState::Available(state.clone()).peer_state(),
            Some(&state)
        );
    }
}
