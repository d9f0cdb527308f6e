//! Configuration types for the peer mesh

use serde::{Deserialize, Serialize};

/// Debounce window applied to renegotiation triggers (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Main configuration for PeersMesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// WebSocket signaling exchange URL (ws:// or wss://)
    pub signaling_url: String,

    /// Room to join on the signaling exchange
    pub room_name: String,

    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Maximum peers in mesh (default: 10, max: 10)
    pub max_peers: u32,

    /// Renegotiation debounce window in milliseconds (default: 200)
    pub debounce_ms: u64,

    /// Watchdog for negotiations stuck in have-local-offer, in milliseconds.
    /// `None` disables the watchdog entirely (default: 30000).
    pub negotiation_timeout_ms: Option<u64>,

    /// Timeout for the recording handshake (info message), in milliseconds.
    /// `None` waits indefinitely (default: 10000).
    pub handshake_timeout_ms: Option<u64>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn:// or turns://)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8080".to_string(),
            room_name: "main".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            max_peers: 10,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            negotiation_timeout_ms: Some(30_000),
            handshake_timeout_ms: Some(10_000),
        }
    }
}

impl MeshConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - `room_name` is empty
    /// - `max_peers` is not in range 1-10
    /// - `debounce_ms` is not in range 10-1000
    /// - `signaling_url` is not a valid WebSocket URL
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.room_name.is_empty() {
            return Err(Error::InvalidConfig("room_name must not be empty".to_string()));
        }

        if self.max_peers == 0 || self.max_peers > 10 {
            return Err(Error::InvalidConfig(format!(
                "max_peers must be in range 1-10, got {}",
                self.max_peers
            )));
        }

        if self.debounce_ms < 10 || self.debounce_ms > 1000 {
            return Err(Error::InvalidConfig(format!(
                "debounce_ms must be in range 10-1000, got {}",
                self.debounce_ms
            )));
        }

        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        Ok(())
    }
}
