//! Peer connections and per-peer state

mod connection;
mod state;

pub use connection::{
    PeerConnection, PeerRole, RecordingRole, RECORDING_LABEL_PREFIX, STATE_CHANNEL_LABEL,
};
pub use state::{ice_is_fatal, ConnectionStatus, PeerState, RemoteState};
