//! Recordee side of the recording protocol
//!
//! A guest accepts an inbound `recording/<id>` channel, announces its name
//! and capture sample rate, waits for the start command, then streams raw
//! capture chunks until its source ends or the recorder closes the channel.

use crate::peer::{PeerState, RECORDING_LABEL_PREFIX};
use crate::recording::protocol::{
    samples_to_bytes, RecorderInfo, RecordeePhase, RecordingSessionInfo, SessionRole,
    START_COMMAND,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::data_channel::RTCDataChannel;

/// Local audio capture facility boundary.
///
/// Supplies a sequence of raw sample buffers; the engine only conveys them.
/// Returning `None` means capture ended and the session stops.
#[async_trait]
pub trait AudioSource: Send {
    /// Capture sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Next buffer of raw samples, or `None` when capture has ended
    async fn next_chunk(&mut self) -> Option<Vec<f32>>;
}

/// Produces a fresh capture source for each recording session
pub type AudioSourceFactory = Arc<dyn Fn() -> Box<dyn AudioSource> + Send + Sync>;

/// [`AudioSource`] fed through an unbounded channel.
///
/// The capture side holds the sender; dropping it ends the session.
pub struct ChannelAudioSource {
    sample_rate: u32,
    rx: mpsc::UnboundedReceiver<Vec<f32>>,
}

impl ChannelAudioSource {
    /// Create a source and the sender that feeds it
    pub fn new(sample_rate: u32) -> (mpsc::UnboundedSender<Vec<f32>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { sample_rate, rx })
    }
}

#[async_trait]
impl AudioSource for ChannelAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn next_chunk(&mut self) -> Option<Vec<f32>> {
        self.rx.recv().await
    }
}

/// Guest-side recording session accepted from an inbound channel
pub struct RecordeeSession {
    session_id: String,
    channel: Arc<RTCDataChannel>,
    phase: Arc<Mutex<RecordeePhase>>,
    started: Arc<AtomicBool>,
    sample_rate: Arc<AtomicU32>,
    name: Arc<Mutex<String>>,
    stream_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RecordeeSession {
    /// Accept an inbound recording channel.
    ///
    /// Wires the open/message/close handlers; the info message goes out when
    /// the channel opens, with the display name read from `local_state` at
    /// that moment.
    pub fn accept(
        channel: Arc<RTCDataChannel>,
        source_factory: AudioSourceFactory,
        local_state: Arc<RwLock<PeerState>>,
    ) -> Arc<Self> {
        let session_id = channel
            .label()
            .strip_prefix(RECORDING_LABEL_PREFIX)
            .unwrap_or(channel.label())
            .to_string();

        info!("Accepting recording session {}", session_id);

        let phase = Arc::new(Mutex::new(RecordeePhase::Constructed));
        let started = Arc::new(AtomicBool::new(false));
        let sample_rate = Arc::new(AtomicU32::new(0));
        let name = Arc::new(Mutex::new(String::new()));
        let stream_task: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));
        let source_slot: Arc<tokio::sync::Mutex<Option<Box<dyn AudioSource>>>> =
            Arc::new(tokio::sync::Mutex::new(None));

        {
            let channel = Arc::clone(&channel);
            let phase = Arc::clone(&phase);
            let sample_rate = Arc::clone(&sample_rate);
            let name = Arc::clone(&name);
            let source_slot = Arc::clone(&source_slot);
            let session_id = session_id.clone();
            let send_target = Arc::clone(&channel);
            channel.on_open(Box::new(move || {
                let phase = Arc::clone(&phase);
                let sample_rate = Arc::clone(&sample_rate);
                let name = Arc::clone(&name);
                let source_slot = Arc::clone(&source_slot);
                let source_factory = Arc::clone(&source_factory);
                let local_state = Arc::clone(&local_state);
                let send_target = Arc::clone(&send_target);
                let session_id = session_id.clone();
                Box::pin(async move {
                    {
                        let mut phase = phase.lock().unwrap();
                        match phase.on_open(&session_id) {
                            Ok(next) => *phase = next,
                            Err(e) => {
                                warn!("Recording session {}: {}", session_id, e);
                                return;
                            }
                        }
                    }

                    let source = (source_factory)();
                    let rate = source.sample_rate();
                    sample_rate.store(rate, Ordering::SeqCst);
                    *source_slot.lock().await = Some(source);

                    let display_name = local_state.read().await.name.clone();
                    *name.lock().unwrap() = display_name.clone();

                    let handshake = RecorderInfo {
                        name: display_name,
                        sample_rate: rate,
                    };
                    match serde_json::to_string(&handshake) {
                        Ok(json) => {
                            if let Err(e) = send_target.send_text(json).await {
                                warn!(
                                    "Recording session {}: info send failed: {}",
                                    session_id, e
                                );
                            }
                        }
                        Err(e) => warn!(
                            "Recording session {}: info unserializable: {}",
                            session_id, e
                        ),
                    }
                })
            }));
        }

        {
            let channel_for_stream = Arc::clone(&channel);
            let phase = Arc::clone(&phase);
            let started = Arc::clone(&started);
            let stream_task = Arc::clone(&stream_task);
            let source_slot = Arc::clone(&source_slot);
            let session_id = session_id.clone();
            channel.on_message(Box::new(move |message| {
                let channel_for_stream = Arc::clone(&channel_for_stream);
                let phase = Arc::clone(&phase);
                let started = Arc::clone(&started);
                let stream_task = Arc::clone(&stream_task);
                let source_slot = Arc::clone(&source_slot);
                let session_id = session_id.clone();
                Box::pin(async move {
                    let is_start = message.is_string
                        && serde_json::from_slice::<String>(&message.data)
                            .map(|command| command == START_COMMAND)
                            .unwrap_or(false);

                    if !is_start {
                        warn!(
                            "Recording session {}: unexpected message, tearing down",
                            session_id
                        );
                        {
                            let mut phase = phase.lock().unwrap();
                            if let Ok(next) = phase.on_stop(&session_id) {
                                *phase = next;
                            }
                        }
                        let _ = channel_for_stream.close().await;
                        return;
                    }

                    {
                        let mut phase = phase.lock().unwrap();
                        match phase.on_start(&session_id) {
                            Ok(next) => *phase = next,
                            Err(e) => {
                                warn!("Recording session {}: {}", session_id, e);
                                return;
                            }
                        }
                    }
                    started.store(true, Ordering::SeqCst);
                    debug!("Recording session {} streaming", session_id);

                    let task = tokio::spawn(stream_capture(
                        channel_for_stream,
                        source_slot,
                        Arc::clone(&phase),
                        session_id.clone(),
                    ));
                    *stream_task.lock().unwrap() = Some(task);
                })
            }));
        }

        {
            let phase = Arc::clone(&phase);
            let stream_task = Arc::clone(&stream_task);
            let session_id = session_id.clone();
            channel.on_close(Box::new(move || {
                let phase = Arc::clone(&phase);
                let stream_task = Arc::clone(&stream_task);
                let session_id = session_id.clone();
                Box::pin(async move {
                    {
                        let mut phase = phase.lock().unwrap();
                        if *phase == RecordeePhase::Stopped {
                            return;
                        }
                        *phase = RecordeePhase::Stopped;
                    }
                    debug!("Recording session {} stopped by remote close", session_id);
                    if let Some(task) = stream_task.lock().unwrap().take() {
                        task.abort();
                    }
                })
            }));
        }

        Arc::new(Self {
            session_id,
            channel,
            phase,
            started,
            sample_rate,
            name,
            stream_task,
        })
    }

    /// Session identifier (channel label suffix)
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Snapshot of the session's progress
    pub fn session_info(&self) -> RecordingSessionInfo {
        let phase = *self.phase.lock().unwrap();
        RecordingSessionInfo {
            session_id: self.session_id.clone(),
            role: SessionRole::Recordee,
            sample_rate: self.sample_rate.load(Ordering::SeqCst),
            name: self.name.lock().unwrap().clone(),
            started: self.started.load(Ordering::SeqCst),
            stopped: phase == RecordeePhase::Stopped,
        }
    }

    /// Whether this session reached its terminal state
    pub fn is_stopped(&self) -> bool {
        *self.phase.lock().unwrap() == RecordeePhase::Stopped
    }

    /// Terminate the session locally: stop streaming and close the channel
    pub async fn shutdown(&self) {
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase == RecordeePhase::Stopped {
                return;
            }
            *phase = RecordeePhase::Stopped;
        }
        if let Some(task) = self.stream_task.lock().unwrap().take() {
            task.abort();
        }
        let _ = self.channel.close().await;
        debug!("Recording session {} shut down", self.session_id);
    }
}

/// Pump capture chunks onto the channel until the source ends or the session
/// stops. When capture ends, this side initiates the close.
async fn stream_capture(
    channel: Arc<RTCDataChannel>,
    source_slot: Arc<tokio::sync::Mutex<Option<Box<dyn AudioSource>>>>,
    phase: Arc<Mutex<RecordeePhase>>,
    session_id: String,
) {
    let mut source = match source_slot.lock().await.take() {
        Some(source) => source,
        None => {
            warn!("Recording session {}: no capture source", session_id);
            return;
        }
    };

    while let Some(chunk) = source.next_chunk().await {
        if *phase.lock().unwrap() == RecordeePhase::Stopped {
            return;
        }
        let payload = Bytes::from(samples_to_bytes(&chunk));
        if let Err(e) = channel.send(&payload).await {
            debug!("Recording session {}: send failed, stopping: {}", session_id, e);
            break;
        }
    }

    {
        let mut phase = phase.lock().unwrap();
        if *phase == RecordeePhase::Stopped {
            return;
        }
        *phase = RecordeePhase::Stopped;
    }
    info!("Recording session {}: capture ended, closing", session_id);
    let _ = channel.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_yields_chunks() {
        let (tx, mut source) = ChannelAudioSource::new(44100);
        assert_eq!(source.sample_rate(), 44100);

        tx.send(vec![0.1, 0.2]).unwrap();
        tx.send(vec![0.3]).unwrap();

        assert_eq!(source.next_chunk().await, Some(vec![0.1, 0.2]));
        assert_eq!(source.next_chunk().await, Some(vec![0.3]));
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_drops() {
        let (tx, mut source) = ChannelAudioSource::new(48000);
        drop(tx);
        assert_eq!(source.next_chunk().await, None);
    }
}
