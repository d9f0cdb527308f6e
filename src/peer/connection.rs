//! Peer connection management
//!
//! One [`PeerConnection`] models a single remote participant: the underlying
//! WebRTC transport connection, the `"state"` side-channel used for small
//! JSON state blobs, remote media tracks, and inbound recording sessions.
//! Fatality decisions (tearing the peer down on ICE failure) belong to the
//! mesh, not to this type.

use crate::config::MeshConfig;
use crate::negotiation::NegotiationScheduler;
use crate::peer::state::{ConnectionStatus, PeerState, RemoteState};
use crate::recording::{AudioSourceFactory, RecordeeSession};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Label of the state side-channel
pub const STATE_CHANNEL_LABEL: &str = "state";

/// Label prefix of recording session channels
pub const RECORDING_LABEL_PREFIX: &str = "recording/";

/// Which side originated the transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// This side creates the state channel and originates the first offer
    Initiator,
    /// This side was created from an inbound offer and answers
    Responder,
}

/// Recording capability selected at peer construction
#[derive(Clone)]
pub enum RecordingRole {
    /// Peer never participates in recording channels
    None,
    /// Peer accepts inbound recording channels and streams local capture
    RecordeeCandidate {
        /// Produces a fresh capture source per recording session
        source_factory: AudioSourceFactory,
        /// Local participant state; the display name is read at handshake time
        local_state: Arc<RwLock<PeerState>>,
    },
}

/// Buffers the local state until the side-channel opens.
///
/// Before open, only the most recent value is kept; it is handed out exactly
/// once when the channel opens. After open, values pass straight through.
#[derive(Debug, Default)]
pub(crate) struct StateBuffer {
    open: bool,
    queued: Option<PeerState>,
}

impl StateBuffer {
    /// Record a local state update. Returns the value to transmit now, or
    /// `None` if it was queued for channel open.
    pub(crate) fn push(&mut self, state: PeerState) -> Option<PeerState> {
        if self.open {
            Some(state)
        } else {
            self.queued = Some(state);
            None
        }
    }

    /// Mark the channel open. Returns the single queued value to flush, if any.
    pub(crate) fn open(&mut self) -> Option<PeerState> {
        self.open = true;
        self.queued.take()
    }
}

/// Connection to one remote participant
pub struct PeerConnection {
    /// Signaling address of the remote participant
    address: String,

    /// Which side originated the connection
    role: PeerRole,

    /// Underlying WebRTC peer connection
    pc: Arc<RTCPeerConnection>,

    /// Set once close() has run
    closed: AtomicBool,

    /// The `"state"` side-channel, once acquired
    state_channel: Arc<RwLock<Option<Arc<RTCDataChannel>>>>,

    /// Local state queued until the side-channel opens
    state_buffer: Arc<Mutex<StateBuffer>>,

    /// Remote participant state as observed through the side-channel
    remote_state_tx: Arc<watch::Sender<RemoteState>>,

    /// Status derived from the transport's ICE state
    status_tx: Arc<watch::Sender<ConnectionStatus>>,

    /// Raw ICE state, for the mesh's fatality decision
    ice_tx: Arc<watch::Sender<RTCIceConnectionState>>,

    /// Locally gathered ICE candidates awaiting relay through the exchange
    candidate_rx: Mutex<Option<mpsc::UnboundedReceiver<RTCIceCandidateInit>>>,

    /// Remote media tracks exposed by the transport connection
    remote_tracks: Arc<RwLock<Vec<Arc<TrackRemote>>>>,

    /// Currently attached local audio track and its sender
    local_audio: RwLock<Option<(Arc<TrackLocalStaticSample>, Arc<webrtc::rtp_transceiver::rtp_sender::RTCRtpSender>)>>,

    /// Inbound recording sessions accepted on this connection
    recordees: Arc<RwLock<Vec<Arc<RecordeeSession>>>>,

    /// Teardown callbacks, each invoked exactly once at close
    disposables: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl PeerConnection {
    /// Create a connection to one remote participant.
    ///
    /// The initiator creates the `"state"` channel itself; the responder
    /// waits for the inbound channel with that label (matched exactly once).
    /// Renegotiation triggers from the transport are forwarded to the
    /// per-peer `scheduler`.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        address: String,
        role: PeerRole,
        config: &MeshConfig,
        scheduler: Arc<NegotiationScheduler>,
        recording: RecordingRole,
        initial_state: PeerState,
        initial_audio: Option<Arc<TrackLocalStaticSample>>,
    ) -> Result<Self> {
        info!("Creating peer connection: address={}, role={:?}", address, role);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::PeerConnectionError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::PeerConnectionError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
        })?);

        let (remote_state_tx, _) = watch::channel(RemoteState::Pending);
        let remote_state_tx = Arc::new(remote_state_tx);
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        let status_tx = Arc::new(status_tx);
        let (ice_tx, _) = watch::channel(RTCIceConnectionState::New);
        let ice_tx = Arc::new(ice_tx);

        // Mirror ICE state into the status and raw-state watches
        {
            let status_tx = Arc::clone(&status_tx);
            let ice_tx = Arc::clone(&ice_tx);
            let address = address.clone();
            pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                let status_tx = Arc::clone(&status_tx);
                let ice_tx = Arc::clone(&ice_tx);
                let address = address.clone();
                Box::pin(async move {
                    debug!("Peer {} ICE state: {}", address, state);
                    ice_tx.send_replace(state);
                    status_tx.send_replace(ConnectionStatus::from_ice(state));
                })
            }));
        }

        // Forward renegotiation triggers to the debounce scheduler
        {
            let scheduler = Arc::clone(&scheduler);
            pc.on_negotiation_needed(Box::new(move || {
                let scheduler = Arc::clone(&scheduler);
                Box::pin(async move {
                    scheduler.trigger();
                })
            }));
        }

        // Relay locally gathered candidates toward the exchange
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel::<RTCIceCandidateInit>();
        {
            let address = address.clone();
            pc.on_ice_candidate(Box::new(move |candidate| {
                let candidate_tx = candidate_tx.clone();
                let address = address.clone();
                Box::pin(async move {
                    if let Some(candidate) = candidate {
                        match candidate.to_json() {
                            Ok(init) => {
                                let _ = candidate_tx.send(init);
                            }
                            Err(e) => {
                                warn!("Peer {}: dropping unserializable candidate: {}", address, e)
                            }
                        }
                    }
                })
            }));
        }

        // Collect remote media tracks; a connection may expose several
        let remote_tracks: Arc<RwLock<Vec<Arc<TrackRemote>>>> = Arc::new(RwLock::new(Vec::new()));
        {
            let remote_tracks = Arc::clone(&remote_tracks);
            let address = address.clone();
            pc.on_track(Box::new(move |track, _receiver, _transceiver| {
                let remote_tracks = Arc::clone(&remote_tracks);
                let address = address.clone();
                Box::pin(async move {
                    debug!("Peer {}: remote track added ({})", address, track.id());
                    remote_tracks.write().await.push(track);
                })
            }));
        }

        let state_buffer = Arc::new(Mutex::new(StateBuffer::default()));
        state_buffer.lock().unwrap().queued = Some(initial_state);

        let state_channel: Arc<RwLock<Option<Arc<RTCDataChannel>>>> = Arc::new(RwLock::new(None));
        let recordees: Arc<RwLock<Vec<Arc<RecordeeSession>>>> = Arc::new(RwLock::new(Vec::new()));

        // Inbound channel dispatcher: state channel (responder only, one-shot
        // match) and recording channels (when the peer is a recordee candidate)
        {
            let state_channel = Arc::clone(&state_channel);
            let state_buffer = Arc::clone(&state_buffer);
            let remote_state_tx = Arc::clone(&remote_state_tx);
            let recordees = Arc::clone(&recordees);
            let recording = recording.clone();
            let address = address.clone();
            let state_matched = Arc::new(AtomicBool::new(role == PeerRole::Initiator));

            pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                let state_channel = Arc::clone(&state_channel);
                let state_buffer = Arc::clone(&state_buffer);
                let remote_state_tx = Arc::clone(&remote_state_tx);
                let recordees = Arc::clone(&recordees);
                let recording = recording.clone();
                let address = address.clone();
                let state_matched = Arc::clone(&state_matched);

                Box::pin(async move {
                    let label = channel.label().to_string();
                    if label == STATE_CHANNEL_LABEL {
                        if state_matched.swap(true, Ordering::SeqCst) {
                            debug!("Peer {}: ignoring duplicate state channel", address);
                            return;
                        }
                        wire_state_channel(
                            &channel,
                            Arc::clone(&state_buffer),
                            Arc::clone(&remote_state_tx),
                            address.clone(),
                        );
                        *state_channel.write().await = Some(channel);
                    } else if label.starts_with(RECORDING_LABEL_PREFIX) {
                        match &recording {
                            RecordingRole::RecordeeCandidate {
                                source_factory,
                                local_state,
                            } => {
                                let session = RecordeeSession::accept(
                                    channel,
                                    Arc::clone(source_factory),
                                    Arc::clone(local_state),
                                );
                                recordees.write().await.push(session);
                            }
                            RecordingRole::None => {
                                warn!(
                                    "Peer {}: inbound recording channel {} but no capture source",
                                    address, label
                                );
                            }
                        }
                    } else {
                        debug!("Peer {}: ignoring unknown channel {}", address, label);
                    }
                })
            }));
        }

        // The initiator creates the state channel itself
        if role == PeerRole::Initiator {
            let channel = pc
                .create_data_channel(
                    STATE_CHANNEL_LABEL,
                    Some(RTCDataChannelInit {
                        ordered: Some(true),
                        ..Default::default()
                    }),
                )
                .await
                .map_err(|e| {
                    Error::DataChannelError(format!("Failed to create state channel: {}", e))
                })?;
            wire_state_channel(
                &channel,
                Arc::clone(&state_buffer),
                Arc::clone(&remote_state_tx),
                address.clone(),
            );
            *state_channel.write().await = Some(channel);
        }

        let connection = Self {
            address,
            role,
            pc,
            closed: AtomicBool::new(false),
            state_channel,
            state_buffer,
            remote_state_tx,
            status_tx,
            ice_tx,
            candidate_rx: Mutex::new(Some(candidate_rx)),
            remote_tracks,
            local_audio: RwLock::new(None),
            recordees,
            disposables: Mutex::new(Vec::new()),
        };

        if let Some(track) = initial_audio {
            connection.set_local_audio(track).await?;
        }

        Ok(connection)
    }

    /// The remote participant's signaling address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Which side originated the connection
    pub fn role(&self) -> PeerRole {
        self.role
    }

    /// Whether close() has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The underlying WebRTC peer connection, for recording channel creation
    pub fn rtc(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    /// Current signaling state of the underlying connection
    pub fn signaling_state(&self) -> RTCSignalingState {
        self.pc.signaling_state()
    }

    /// Send the local state blob to the remote participant.
    ///
    /// Before the side-channel opens the value is queued; only the most
    /// recent queued value is transmitted, exactly once, at channel open.
    pub async fn set_local_state(&self, state: PeerState) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let to_send = self.state_buffer.lock().unwrap().push(state);
        if let Some(state) = to_send {
            let channel = self.state_channel.read().await.clone().ok_or_else(|| {
                Error::DataChannelError("State channel not available".to_string())
            })?;
            let json = serde_json::to_string(&state).map_err(|e| {
                Error::SerializationError(format!("Failed to serialize state: {}", e))
            })?;
            channel
                .send_text(json)
                .await
                .map_err(|e| Error::DataChannelError(format!("State send failed: {}", e)))?;
        }
        Ok(())
    }

    /// Most recent remote state observation
    pub fn remote_state(&self) -> RemoteState {
        self.remote_state_tx.borrow().clone()
    }

    /// Subscribe to remote state updates
    pub fn subscribe_remote_state(&self) -> watch::Receiver<RemoteState> {
        self.remote_state_tx.subscribe()
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to connection status changes
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to raw ICE state changes (the mesh watches this for fatality)
    pub fn subscribe_ice_state(&self) -> watch::Receiver<RTCIceConnectionState> {
        self.ice_tx.subscribe()
    }

    /// Take the stream of locally gathered ICE candidates (once)
    pub fn take_candidate_stream(&self) -> Option<mpsc::UnboundedReceiver<RTCIceCandidateInit>> {
        self.candidate_rx.lock().unwrap().take()
    }

    /// Remote media tracks exposed so far
    pub async fn remote_tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.remote_tracks.read().await.clone()
    }

    /// Inbound recording sessions accepted on this connection
    pub async fn recordee_sessions(&self) -> Vec<Arc<RecordeeSession>> {
        self.recordees.read().await.clone()
    }

    /// Attach the local audio track, replacing any previous one.
    ///
    /// Attaching the same track twice is a no-op.
    pub async fn set_local_audio(&self, track: Arc<TrackLocalStaticSample>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let mut local = self.local_audio.write().await;
        if let Some((current, _)) = local.as_ref() {
            if Arc::ptr_eq(current, &track) {
                return Ok(());
            }
        }
        if let Some((_, sender)) = local.take() {
            self.pc.remove_track(&sender).await.map_err(|e| {
                Error::MediaTrackError(format!("Failed to remove audio track: {}", e))
            })?;
        }

        let sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to add audio track: {}", e)))?;

        *local = Some((track, sender));
        debug!("Local audio attached for peer {}", self.address);
        Ok(())
    }

    /// Detach the local audio track, if any
    pub async fn unset_local_audio(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        if let Some((_, sender)) = self.local_audio.write().await.take() {
            self.pc.remove_track(&sender).await.map_err(|e| {
                Error::MediaTrackError(format!("Failed to remove audio track: {}", e))
            })?;
            debug!("Local audio detached for peer {}", self.address);
        }
        Ok(())
    }

    /// Whether a local audio track is currently attached
    pub async fn has_local_audio(&self) -> bool {
        self.local_audio.read().await.is_some()
    }

    /// Register a teardown callback, invoked exactly once at close.
    ///
    /// If the peer is already closed the callback runs immediately.
    pub fn add_disposable(&self, dispose: impl FnOnce() + Send + 'static) {
        if self.is_closed() {
            dispose();
        } else {
            self.disposables.lock().unwrap().push(Box::new(dispose));
        }
    }

    /// Create an offer and install it as the local description
    pub async fn create_offer_sdp(&self) -> Result<String> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local = self.pc.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting offer".to_string())
        })?;

        debug!("Created offer for peer {}", self.address);
        Ok(local.sdp)
    }

    /// Apply a remote offer and produce the local answer
    pub async fn accept_offer(&self, sdp: String) -> Result<String> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let offer = RTCSessionDescription::offer(sdp)
            .map_err(|e| Error::SdpError(format!("Failed to parse offer: {}", e)))?;

        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local = self.pc.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting answer".to_string())
        })?;

        debug!("Created answer for peer {}", self.address);
        Ok(local.sdp)
    }

    /// Apply a remote answer
    pub async fn apply_answer(&self, sdp: String) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::SdpError(format!("Failed to parse answer: {}", e)))?;

        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        debug!("Applied answer for peer {}", self.address);
        Ok(())
    }

    /// Add a trickled remote ICE candidate.
    ///
    /// The transport requires a remote description first; a candidate that
    /// arrives earlier surfaces as an `IceCandidateError` rather than being
    /// queued here.
    pub async fn add_remote_candidate(
        &self,
        sdp_m_line_index: u16,
        candidate: String,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed(self.address.clone()));
        }

        let init = RTCIceCandidateInit {
            candidate,
            sdp_mline_index: Some(sdp_m_line_index),
            ..Default::default()
        };

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add candidate: {}", e)))
    }

    /// Close the connection.
    ///
    /// A second call is an error. Registered disposables run first, exactly
    /// once; the underlying connection is closed only if its signaling state
    /// is not already closed; finally the remote-state stream terminates.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyClosed(self.address.clone()));
        }

        info!("Closing peer connection for {}", self.address);

        let disposables: Vec<_> = self.disposables.lock().unwrap().drain(..).collect();
        for dispose in disposables {
            dispose();
        }

        for session in self.recordees.read().await.iter() {
            session.shutdown().await;
        }

        if self.pc.signaling_state() != RTCSignalingState::Closed {
            self.pc
                .close()
                .await
                .map_err(|e| Error::PeerConnectionError(format!("Failed to close: {}", e)))?;
        }

        self.remote_state_tx.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = RemoteState::Ended;
                true
            }
        });

        Ok(())
    }
}

/// Wire the state side-channel handlers: flush-once on open, remote state
/// updates on message, terminal failure on error, terminal end on close.
fn wire_state_channel(
    channel: &Arc<RTCDataChannel>,
    buffer: Arc<Mutex<StateBuffer>>,
    remote_state_tx: Arc<watch::Sender<RemoteState>>,
    address: String,
) {
    {
        let channel = Arc::clone(channel);
        let buffer = Arc::clone(&buffer);
        let address = address.clone();
        let flush_target = Arc::clone(&channel);
        channel.on_open(Box::new(move || {
            let buffer = Arc::clone(&buffer);
            let flush_target = Arc::clone(&flush_target);
            let address = address.clone();
            Box::pin(async move {
                let flush = buffer.lock().unwrap().open();
                if let Some(state) = flush {
                    match serde_json::to_string(&state) {
                        Ok(json) => {
                            if let Err(e) = flush_target.send_text(json).await {
                                warn!("Peer {}: initial state flush failed: {}", address, e);
                            }
                        }
                        Err(e) => warn!("Peer {}: initial state unserializable: {}", address, e),
                    }
                }
            })
        }));
    }

    {
        let remote_state_tx = Arc::clone(&remote_state_tx);
        let address = address.clone();
        channel.on_message(Box::new(move |message| {
            let remote_state_tx = Arc::clone(&remote_state_tx);
            let address = address.clone();
            Box::pin(async move {
                if !message.is_string {
                    warn!("Peer {}: ignoring binary frame on state channel", address);
                    return;
                }
                match serde_json::from_slice::<PeerState>(&message.data) {
                    Ok(state) => {
                        remote_state_tx.send_if_modified(|current| {
                            if current.is_terminal() {
                                false
                            } else {
                                *current = RemoteState::Available(state);
                                true
                            }
                        });
                    }
                    Err(e) => warn!("Peer {}: malformed state blob: {}", address, e),
                }
            })
        }));
    }

    {
        let remote_state_tx = Arc::clone(&remote_state_tx);
        let address = address.clone();
        channel.on_error(Box::new(move |error| {
            let remote_state_tx = Arc::clone(&remote_state_tx);
            let address = address.clone();
            Box::pin(async move {
                warn!("Peer {}: state channel error: {}", address, error);
                remote_state_tx.send_if_modified(|current| {
                    if current.is_terminal() {
                        false
                    } else {
                        *current = RemoteState::Failed(error.to_string());
                        true
                    }
                });
            })
        }));
    }

    {
        let remote_state_tx = Arc::clone(&remote_state_tx);
        channel.on_close(Box::new(move || {
            let remote_state_tx = Arc::clone(&remote_state_tx);
            Box::pin(async move {
                remote_state_tx.send_if_modified(|current| {
                    if current.is_terminal() {
                        false
                    } else {
                        *current = RemoteState::Ended;
                        true
                    }
                });
            })
        }));
    }
}
