//! Signaling exchange wire protocol types
//!
//! JSON messages carried over the persistent bidirectional exchange channel:
//! a join request/response pair, then signal envelopes addressed by the
//! socket-assigned peer address.

use serde::{Deserialize, Serialize};

/// An offer/answer/candidate signal ferried between two peers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    /// SDP offer initiating or renegotiating a connection
    Offer {
        /// Offer SDP
        sdp: String,
    },

    /// SDP answer responding to an offer
    Answer {
        /// Answer SDP
        sdp: String,
    },

    /// Trickled ICE candidate
    Candidate {
        /// SDP media line index the candidate belongs to
        #[serde(rename = "sdpMLineIndex")]
        sdp_m_line_index: u16,

        /// Candidate string
        candidate: String,
    },
}

impl Signal {
    /// Whether this signal is allowed to create a new peer on receipt
    pub fn is_offer(&self) -> bool {
        matches!(self, Signal::Offer { .. })
    }
}

/// Request to join a named room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Room to join
    pub room_name: String,
}

/// Response to a join request: the addresses already present in the room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinResponse {
    /// Other occupants' signaling addresses
    #[serde(rename = "otherSocketIDs")]
    pub other_socket_ids: Vec<String>,
}

/// Outgoing signal envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingSignal {
    /// Recipient address
    pub to: String,

    /// The signal payload
    pub signal: Signal,
}

/// Incoming signal envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomingSignal {
    /// Sender address
    pub from: String,

    /// The signal payload
    pub signal: Signal,
}

impl Signal {
    /// Convert signal to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::Error::SerializationError(format!("Failed to serialize signal: {}", e)))
    }

    /// Parse signal from JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| crate::Error::SerializationError(format!("Failed to deserialize signal: {}", e)))
    }
}
