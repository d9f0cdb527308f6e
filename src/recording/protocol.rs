//! Recording channel wire protocol and session state machines
//!
//! Each recording session runs over a dedicated data channel. The recordee
//! opens with an info message, the recorder commands `"start"`, the recordee
//! streams raw little-endian f32 chunks, and whichever side terminates does
//! so by closing the channel. Closing is the stop signal; there is no stop
//! message type.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// The start command, sent JSON-encoded (`"start"`) by the recorder
pub const START_COMMAND: &str = "start";

/// First message on a recording channel, sent by the recordee once open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderInfo {
    /// Recordee display name at handshake time
    pub name: String,

    /// Capture sample rate in Hz
    pub sample_rate: u32,
}

/// Which side of the protocol a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// Requests recording and collects chunks
    Recorder,
    /// Captures and streams audio
    Recordee,
}

/// Snapshot of a recording session's progress
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSessionInfo {
    /// Session identifier (also the channel label suffix)
    pub session_id: String,
    /// Protocol role of this side
    pub role: SessionRole,
    /// Negotiated capture sample rate (0 until the handshake completes)
    pub sample_rate: u32,
    /// Recordee display name from the handshake
    pub name: String,
    /// Whether start was ever sent/received
    pub started: bool,
    /// Whether the session reached its terminal state
    pub stopped: bool,
}

/// Recorder-side protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    /// Channel created, info message not yet received
    AwaitingInfo,
    /// Handshake complete, recording not yet requested
    Idle,
    /// Start sent; chunks are flowing
    Recording,
    /// Terminal; a new session is required to re-record
    Stopped,
}

impl RecorderPhase {
    /// Transition on receipt of the info message
    pub fn on_info(self, session_id: &str) -> Result<Self> {
        match self {
            RecorderPhase::AwaitingInfo => Ok(RecorderPhase::Idle),
            _ => Err(Error::ProtocolViolation(format!(
                "info message in phase {:?} for session {}",
                self, session_id
            ))),
        }
    }

    /// Transition on a local start() call
    pub fn on_start(self, session_id: &str) -> Result<Self> {
        match self {
            RecorderPhase::Idle => Ok(RecorderPhase::Recording),
            RecorderPhase::Recording => Err(Error::AlreadyStarted(session_id.to_string())),
            RecorderPhase::Stopped => Err(Error::AlreadyStopped(session_id.to_string())),
            RecorderPhase::AwaitingInfo => Err(Error::ProtocolViolation(format!(
                "start before handshake for session {}",
                session_id
            ))),
        }
    }

    /// Transition on a local stop() call or remote close
    pub fn on_stop(self, session_id: &str) -> Result<Self> {
        match self {
            RecorderPhase::Stopped => Err(Error::AlreadyStopped(session_id.to_string())),
            _ => Ok(RecorderPhase::Stopped),
        }
    }
}

/// Recordee-side protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordeePhase {
    /// Session accepted, channel not yet open
    Constructed,
    /// Info sent, waiting for the start command
    AwaitingStart,
    /// Streaming capture chunks
    Streaming,
    /// Terminal
    Stopped,
}

impl RecordeePhase {
    /// Transition on channel open
    pub fn on_open(self, session_id: &str) -> Result<Self> {
        match self {
            RecordeePhase::Constructed => Ok(RecordeePhase::AwaitingStart),
            _ => Err(Error::ProtocolViolation(format!(
                "channel open in phase {:?} for session {}",
                self, session_id
            ))),
        }
    }

    /// Transition on receipt of the start command
    pub fn on_start(self, session_id: &str) -> Result<Self> {
        match self {
            RecordeePhase::AwaitingStart => Ok(RecordeePhase::Streaming),
            RecordeePhase::Streaming => Err(Error::AlreadyStarted(session_id.to_string())),
            RecordeePhase::Stopped => Err(Error::AlreadyStopped(session_id.to_string())),
            RecordeePhase::Constructed => Err(Error::ProtocolViolation(format!(
                "start before channel open for session {}",
                session_id
            ))),
        }
    }

    /// Transition on stop (capture ended or channel closed)
    pub fn on_stop(self, session_id: &str) -> Result<Self> {
        match self {
            RecordeePhase::Stopped => Err(Error::AlreadyStopped(session_id.to_string())),
            _ => Ok(RecordeePhase::Stopped),
        }
    }
}

/// Encode capture samples as a binary chunk (little-endian f32)
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decode a binary chunk back into samples
pub fn samples_from_bytes(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() % 4 != 0 {
        return Err(Error::ProtocolViolation(format!(
            "audio chunk length {} is not a multiple of 4",
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_wire_format() {
        let info = RecorderInfo {
            name: "ada".to_string(),
            sample_rate: 44100,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"name":"ada","sampleRate":44100}"#);

        let parsed: RecorderInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_start_command_encoding() {
        let json = serde_json::to_string(START_COMMAND).unwrap();
        assert_eq!(json, r#""start""#);

        let decoded: String = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, START_COMMAND);
    }

    #[test]
    fn test_recorder_happy_path() {
        let phase = RecorderPhase::AwaitingInfo;
        let phase = phase.on_info("s").unwrap();
        assert_eq!(phase, RecorderPhase::Idle);
        let phase = phase.on_start("s").unwrap();
        assert_eq!(phase, RecorderPhase::Recording);
        let phase = phase.on_stop("s").unwrap();
        assert_eq!(phase, RecorderPhase::Stopped);
    }

    #[test]
    fn test_recorder_double_start() {
        let phase = RecorderPhase::Recording;
        assert!(matches!(
            phase.on_start("s"),
            Err(Error::AlreadyStarted(_))
        ));
    }

    #[test]
    fn test_recorder_start_after_stop() {
        let phase = RecorderPhase::Stopped;
        assert!(matches!(
            phase.on_start("s"),
            Err(Error::AlreadyStopped(_))
        ));
    }

    #[test]
    fn test_recorder_double_stop() {
        let phase = RecorderPhase::Stopped;
        assert!(matches!(phase.on_stop("s"), Err(Error::AlreadyStopped(_))));
    }

    #[test]
    fn test_recorder_stop_before_start_is_allowed() {
        // Either party may terminate a handshaken session before start
        let phase = RecorderPhase::Idle;
        assert_eq!(phase.on_stop("s").unwrap(), RecorderPhase::Stopped);
    }

    #[test]
    fn test_recorder_unexpected_info() {
        assert!(RecorderPhase::Idle.on_info("s").is_err());
        assert!(RecorderPhase::Recording.on_info("s").is_err());
    }

    #[test]
    fn test_recordee_happy_path() {
        let phase = RecordeePhase::Constructed;
        let phase = phase.on_open("s").unwrap();
        assert_eq!(phase, RecordeePhase::AwaitingStart);
        let phase = phase.on_start("s").unwrap();
        assert_eq!(phase, RecordeePhase::Streaming);
        let phase = phase.on_stop("s").unwrap();
        assert_eq!(phase, RecordeePhase::Stopped);
    }

    #[test]
    fn test_recordee_start_before_open() {
        assert!(matches!(
            RecordeePhase::Constructed.on_start("s"),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_recordee_double_start_and_stop() {
        assert!(matches!(
            RecordeePhase::Streaming.on_start("s"),
            Err(Error::AlreadyStarted(_))
        ));
        assert!(matches!(
            RecordeePhase::Stopped.on_stop("s"),
            Err(Error::AlreadyStopped(_))
        ));
    }

    #[test]
    fn test_chunk_round_trip() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 4);

        let decoded = samples_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_truncated_chunk_rejected() {
        let bytes = samples_to_bytes(&[0.25f32]);
        assert!(samples_from_bytes(&bytes[..3]).is_err());
    }
}
