//! Peer-mesh signaling and guest-track recording engine
//!
//! This crate coordinates real-time peer-to-peer audio sessions among a
//! small set of participants gathered in a named room. One participant may
//! act as recording host, receiving raw audio from guests over lossless data
//! channels during the call so long sessions need no post-call uploads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Remote participants (browser/native)                    │
//! │  ↓ (WebRTC peer connections - mesh topology)             │
//! │  PeersMesh                                               │
//! │  ├─ SignalingExchange (JSON over WebSocket)              │
//! │  ├─ MeshDirectory (address → Peer, insertion-ordered)    │
//! │  │   └─ Per-peer NegotiationScheduler (debounce)         │
//! │  ├─ PeerConnection ("state" side-channel + media)        │
//! │  │   └─ RecorderSession / RecordeeSession per recording  │
//! │  └─ HostRecordingCoordinator (start/stop fan-out)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use greenroom::MeshConfig;
//!
//! let config = MeshConfig {
//!     signaling_url: "ws://localhost:8080".to_string(),
//!     room_name: "studio-42".to_string(),
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.debounce_ms, 200);
//! ```
//!
//! ## Async usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use greenroom::{MeshConfig, PeersMesh, PeerState, WebSocketSignalingClient};
//!
//! # async fn example() -> greenroom::Result<()> {
//! let config = MeshConfig::default();
//! let exchange = Arc::new(WebSocketSignalingClient::new(&config.signaling_url));
//!
//! let local = PeerState {
//!     name: "ada".to_string(),
//!     ..Default::default()
//! };
//! let mesh = PeersMesh::new(config, exchange, local, None)?;
//! mesh.connect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod mesh;
pub mod negotiation;
pub mod peer;
pub mod recording;
pub mod signaling;

pub use config::{MeshConfig, TurnServerConfig, DEFAULT_DEBOUNCE_MS};
pub use error::{Error, Result};
pub use mesh::{HostRecordingCoordinator, MeshDirectory, Peer, PeersMesh};
pub use peer::{ConnectionStatus, PeerConnection, PeerRole, PeerState, RecordingRole, RemoteState};
pub use recording::{
    AudioSource, AudioSourceFactory, ChannelAudioSource, RecordeeSession, RecorderEntry,
    RecorderInfo, RecorderSession, RecordingControl, RecordingManifest, RecordingSessionInfo,
    SessionRole,
};
pub use signaling::{IncomingSignal, Signal, SignalingExchange, WebSocketSignalingClient};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
    }
}
