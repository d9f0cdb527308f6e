//! Recorder side of the recording protocol
//!
//! The recorder opens a dedicated `recording/<id>` channel toward a guest,
//! waits for the info message, and from then on collects the guest's binary
//! audio chunks. Stopping closes the channel; that close is the stop signal
//! the recordee observes.

use crate::peer::RECORDING_LABEL_PREFIX;
use crate::recording::protocol::{
    RecorderInfo, RecorderPhase, RecordingSessionInfo, SessionRole, START_COMMAND,
};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

/// Start/stop surface of a recording session, as seen by the host
/// coordinator.
#[async_trait]
pub trait RecordingControl: Send + Sync {
    /// Session identifier
    fn session_id(&self) -> &str;

    /// Command the remote side to begin streaming
    async fn start(&self) -> Result<()>;

    /// Terminate the session by closing its channel
    async fn stop(&self) -> Result<()>;
}

/// Host-side recording session over a dedicated data channel
pub struct RecorderSession {
    session_id: String,
    channel: Arc<RTCDataChannel>,
    phase: Arc<Mutex<RecorderPhase>>,
    started: Arc<AtomicBool>,
    handshake: RecorderInfo,
    audio_rx: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
}

impl RecorderSession {
    /// Open a recording channel on `pc` and wait for the recordee's info
    /// message.
    ///
    /// Anything other than an info message first, or the channel closing
    /// before one arrives, fails construction. `handshake_timeout` bounds the
    /// wait; `None` waits indefinitely.
    pub async fn open(
        pc: &Arc<RTCPeerConnection>,
        handshake_timeout: Option<Duration>,
    ) -> Result<Arc<Self>> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let label = format!("{}{}", RECORDING_LABEL_PREFIX, session_id);

        info!("Opening recording session {}", session_id);

        let channel = pc
            .create_data_channel(
                &label,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to create recording channel: {}", e))
            })?;

        let phase = Arc::new(Mutex::new(RecorderPhase::AwaitingInfo));
        let (info_tx, info_rx) = oneshot::channel::<Result<RecorderInfo>>();
        let info_slot = Arc::new(Mutex::new(Some(info_tx)));
        let (audio_tx, audio_rx) = mpsc::unbounded_channel::<Bytes>();

        {
            let phase = Arc::clone(&phase);
            let info_slot = Arc::clone(&info_slot);
            let session_id = session_id.clone();
            channel.on_message(Box::new(move |message| {
                let phase = Arc::clone(&phase);
                let info_slot = Arc::clone(&info_slot);
                let audio_tx = audio_tx.clone();
                let session_id = session_id.clone();
                Box::pin(async move {
                    let current = *phase.lock().unwrap();
                    match current {
                        RecorderPhase::AwaitingInfo => {
                            let result = if message.is_string {
                                serde_json::from_slice::<RecorderInfo>(&message.data).map_err(|e| {
                                    Error::ProtocolViolation(format!(
                                        "bad info message for session {}: {}",
                                        session_id, e
                                    ))
                                })
                            } else {
                                Err(Error::ProtocolViolation(format!(
                                    "binary frame before info for session {}",
                                    session_id
                                )))
                            };

                            match result {
                                Ok(handshake) => {
                                    let mut phase = phase.lock().unwrap();
                                    match phase.on_info(&session_id) {
                                        Ok(next) => *phase = next,
                                        Err(e) => {
                                            warn!("Recording session {}: {}", session_id, e);
                                            return;
                                        }
                                    }
                                    if let Some(tx) = info_slot.lock().unwrap().take() {
                                        let _ = tx.send(Ok(handshake));
                                    }
                                }
                                Err(e) => {
                                    if let Some(tx) = info_slot.lock().unwrap().take() {
                                        let _ = tx.send(Err(e));
                                    }
                                }
                            }
                        }
                        RecorderPhase::Idle | RecorderPhase::Recording => {
                            if message.is_string {
                                warn!(
                                    "Recording session {}: unexpected text frame",
                                    session_id
                                );
                            } else {
                                let _ = audio_tx.send(message.data);
                            }
                        }
                        RecorderPhase::Stopped => {}
                    }
                })
            }));
        }

        {
            let phase = Arc::clone(&phase);
            let info_slot = Arc::clone(&info_slot);
            let session_id = session_id.clone();
            channel.on_close(Box::new(move || {
                let phase = Arc::clone(&phase);
                let info_slot = Arc::clone(&info_slot);
                let session_id = session_id.clone();
                Box::pin(async move {
                    if let Some(tx) = info_slot.lock().unwrap().take() {
                        let _ = tx.send(Err(Error::ChannelClosed(format!(
                            "recording channel closed before handshake for session {}",
                            session_id
                        ))));
                    }
                    let mut phase = phase.lock().unwrap();
                    if *phase != RecorderPhase::Stopped {
                        debug!("Recording session {} stopped by remote close", session_id);
                        *phase = RecorderPhase::Stopped;
                    }
                })
            }));
        }

        {
            let phase = Arc::clone(&phase);
            let info_slot = Arc::clone(&info_slot);
            let session_id = session_id.clone();
            channel.on_error(Box::new(move |error| {
                let phase = Arc::clone(&phase);
                let info_slot = Arc::clone(&info_slot);
                let session_id = session_id.clone();
                Box::pin(async move {
                    warn!("Recording session {} channel error: {}", session_id, error);
                    if let Some(tx) = info_slot.lock().unwrap().take() {
                        let _ = tx.send(Err(Error::DataChannelError(error.to_string())));
                    }
                    *phase.lock().unwrap() = RecorderPhase::Stopped;
                })
            }));
        }

        let abandoned =
            || Error::ChannelClosed(format!("handshake abandoned for session {}", session_id));
        let handshake = match handshake_timeout {
            Some(duration) => match tokio::time::timeout(duration, info_rx).await {
                Ok(received) => received.map_err(|_| abandoned()),
                Err(_) => Err(Error::Timeout(format!(
                    "recording handshake for session {}",
                    session_id
                ))),
            },
            None => info_rx.await.map_err(|_| abandoned()),
        };

        let handshake = match handshake.and_then(|inner| inner) {
            Ok(handshake) => handshake,
            Err(e) => {
                let _ = channel.close().await;
                return Err(e);
            }
        };

        info!(
            "Recording session {} ready: name={}, sample_rate={}",
            session_id, handshake.name, handshake.sample_rate
        );

        Ok(Arc::new(Self {
            session_id,
            channel,
            phase,
            started: Arc::new(AtomicBool::new(false)),
            handshake,
            audio_rx: Mutex::new(Some(audio_rx)),
        }))
    }

    /// Recordee display name from the handshake
    pub fn name(&self) -> &str {
        &self.handshake.name
    }

    /// Capture sample rate from the handshake
    pub fn sample_rate(&self) -> u32 {
        self.handshake.sample_rate
    }

    /// The handshake message as received
    pub fn handshake(&self) -> &RecorderInfo {
        &self.handshake
    }

    /// Take the stream of received audio chunks (once)
    pub fn take_audio_stream(&self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.audio_rx.lock().unwrap().take()
    }

    /// Snapshot of the session's progress
    pub fn session_info(&self) -> RecordingSessionInfo {
        let phase = *self.phase.lock().unwrap();
        RecordingSessionInfo {
            session_id: self.session_id.clone(),
            role: SessionRole::Recorder,
            sample_rate: self.handshake.sample_rate,
            name: self.handshake.name.clone(),
            started: self.started.load(Ordering::SeqCst),
            stopped: phase == RecorderPhase::Stopped,
        }
    }

    /// Whether this session reached its terminal state
    pub fn is_stopped(&self) -> bool {
        *self.phase.lock().unwrap() == RecorderPhase::Stopped
    }
}

#[async_trait]
impl RecordingControl for RecorderSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn start(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock().unwrap();
            *phase = phase.on_start(&self.session_id)?;
        }
        self.started.store(true, Ordering::SeqCst);

        let command = serde_json::to_string(START_COMMAND)
            .map_err(|e| Error::SerializationError(format!("Failed to encode start: {}", e)))?;
        self.channel
            .send_text(command)
            .await
            .map_err(|e| Error::DataChannelError(format!("Start send failed: {}", e)))?;

        info!("Recording session {} started", self.session_id);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock().unwrap();
            *phase = phase.on_stop(&self.session_id)?;
        }

        // Closing the channel is the stop signal
        self.channel
            .close()
            .await
            .map_err(|e| Error::DataChannelError(format!("Stop close failed: {}", e)))?;

        info!("Recording session {} stopped", self.session_id);
        Ok(())
    }
}
