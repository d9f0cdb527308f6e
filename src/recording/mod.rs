//! Streaming recording protocol over data channels

mod manifest;
mod protocol;
mod recordee;
mod recorder;
pub mod wav;

pub use manifest::{RecorderEntry, RecordingManifest, MANIFEST_VERSION};
pub use protocol::{
    samples_from_bytes, samples_to_bytes, RecordeePhase, RecorderInfo, RecorderPhase,
    RecordingSessionInfo, SessionRole, START_COMMAND,
};
pub use recordee::{
    AudioSource, AudioSourceFactory, ChannelAudioSource, RecordeeSession,
};
pub use recorder::{RecorderSession, RecordingControl};
