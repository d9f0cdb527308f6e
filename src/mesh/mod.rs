//! Peer mesh orchestration
//!
//! [`PeersMesh`] owns the directory of known peers, routes inbound signals to
//! the right peer, fans local state and media out to every peer, and drives
//! peer creation/teardown from connection lifecycle events. All directory
//! mutation happens here; peers never remove themselves.

mod host;

pub use host::HostRecordingCoordinator;

use crate::config::MeshConfig;
use crate::negotiation::NegotiationScheduler;
use crate::peer::{
    ice_is_fatal, PeerConnection, PeerRole, PeerState, RecordingRole,
};
use crate::recording::{AudioSourceFactory, RecorderSession};
use crate::signaling::{Signal, SignalingExchange};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// One live mesh participant: its connection, its debounce scheduler, and
/// the host-side recording session, if any
pub struct Peer {
    connection: Arc<PeerConnection>,
    scheduler: Arc<NegotiationScheduler>,
    negotiation_round: tokio::sync::Mutex<()>,
    recorder: RwLock<Option<Arc<RecorderSession>>>,
}

impl Peer {
    /// The transport connection
    pub fn connection(&self) -> &Arc<PeerConnection> {
        &self.connection
    }

    /// The per-peer negotiation scheduler
    pub fn scheduler(&self) -> &Arc<NegotiationScheduler> {
        &self.scheduler
    }

    /// Current host-side recording session, if one exists
    pub async fn recorder(&self) -> Option<Arc<RecorderSession>> {
        self.recorder.read().await.clone()
    }

    /// Reuse the live recording session or open a fresh one.
    ///
    /// A stopped session is terminal; re-recording always gets a new session.
    pub async fn ensure_recorder(
        &self,
        handshake_timeout: Option<Duration>,
    ) -> Result<Arc<RecorderSession>> {
        let mut guard = self.recorder.write().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_stopped() {
                return Ok(Arc::clone(session));
            }
        }
        let session = RecorderSession::open(self.connection.rtc(), handshake_timeout).await?;
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }
}

/// Address-keyed peer directory preserving insertion order
#[derive(Default)]
pub struct MeshDirectory {
    peers: HashMap<String, Arc<Peer>>,
    order: Vec<String>,
}

impl MeshDirectory {
    /// Look up a peer by address
    pub fn get(&self, address: &str) -> Option<Arc<Peer>> {
        self.peers.get(address).cloned()
    }

    /// Whether a peer exists for the address
    pub fn contains(&self, address: &str) -> bool {
        self.peers.contains_key(address)
    }

    /// Insert a peer. Returns false (and leaves the directory unchanged) if
    /// the address is already present.
    pub fn insert(&mut self, address: String, peer: Arc<Peer>) -> bool {
        if self.peers.contains_key(&address) {
            return false;
        }
        self.order.push(address.clone());
        self.peers.insert(address, peer);
        true
    }

    /// Remove a peer, keeping the remaining order intact
    pub fn remove(&mut self, address: &str) -> Option<Arc<Peer>> {
        let peer = self.peers.remove(address)?;
        self.order.retain(|a| a != address);
        Some(peer)
    }

    /// Addresses in insertion order
    pub fn addresses(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Peers in insertion order
    pub fn peers_in_order(&self) -> Vec<(String, Arc<Peer>)> {
        self.order
            .iter()
            .filter_map(|a| self.peers.get(a).map(|p| (a.clone(), Arc::clone(p))))
            .collect()
    }

    /// Number of live peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Remove and return every peer in insertion order
    pub fn drain(&mut self) -> Vec<(String, Arc<Peer>)> {
        let drained = self.peers_in_order();
        self.peers.clear();
        self.order.clear();
        drained
    }
}

/// Top-level mesh orchestrator
pub struct PeersMesh {
    config: MeshConfig,
    exchange: Arc<dyn SignalingExchange>,
    local_state: Arc<RwLock<PeerState>>,
    local_audio: RwLock<Option<Arc<TrackLocalStaticSample>>>,
    recording_source: Option<AudioSourceFactory>,
    directory: RwLock<MeshDirectory>,
    fire_tx: tokio::sync::mpsc::UnboundedSender<String>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PeersMesh {
    /// Create a mesh.
    ///
    /// `recording_source`, when given, makes every peer a recordee candidate:
    /// inbound recording channels get a fresh capture source from the
    /// factory.
    pub fn new(
        config: MeshConfig,
        exchange: Arc<dyn SignalingExchange>,
        local_state: PeerState,
        recording_source: Option<AudioSourceFactory>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        info!("Creating peer mesh for room {}", config.room_name);

        let (fire_tx, mut fire_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

        let mesh = Arc::new(Self {
            config,
            exchange,
            local_state: Arc::new(RwLock::new(local_state)),
            local_audio: RwLock::new(None),
            recording_source,
            directory: RwLock::new(MeshDirectory::default()),
            fire_tx,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        // Fired debounce timers land here; each address negotiates on its
        // own task
        let weak = Arc::downgrade(&mesh);
        let negotiation_loop = tokio::spawn(async move {
            while let Some(address) = fire_rx.recv().await {
                let Some(mesh) = weak.upgrade() else { break };
                tokio::spawn(async move {
                    mesh.negotiate(&address).await;
                });
            }
        });
        mesh.tasks.lock().unwrap().push(negotiation_loop);

        Ok(mesh)
    }

    /// The mesh configuration
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Whether close() has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of the local participant state
    pub async fn local_state(&self) -> PeerState {
        self.local_state.read().await.clone()
    }

    /// Peer addresses in insertion order
    pub async fn addresses(&self) -> Vec<String> {
        self.directory.read().await.addresses()
    }

    /// Look up a peer by address
    pub async fn peer(&self, address: &str) -> Option<Arc<Peer>> {
        self.directory.read().await.get(address)
    }

    /// Peers in insertion order
    pub async fn peers(&self) -> Vec<(String, Arc<Peer>)> {
        self.directory.read().await.peers_in_order()
    }

    /// Number of live peers
    pub async fn peer_count(&self) -> usize {
        self.directory.read().await.len()
    }

    /// Join the room and connect to its current occupants.
    ///
    /// Each existing occupant gets a peer in initiator role and a scheduled
    /// negotiation. An empty room is a no-op beyond opening the exchange.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed("mesh".to_string()));
        }

        let (occupants, mut incoming) = self.exchange.connect(&self.config.room_name).await?;
        info!(
            "Joined room {} ({} existing occupants)",
            self.config.room_name,
            occupants.len()
        );

        // Route inbound envelopes to the owning peer
        let weak = Arc::downgrade(self);
        let routing = tokio::spawn(async move {
            while let Some(envelope) = incoming.recv().await {
                let Some(mesh) = weak.upgrade() else { break };
                if let Err(e) = mesh.handle_signal(&envelope.from, envelope.signal).await {
                    warn!("Signal from {} failed: {}", envelope.from, e);
                }
            }
        });
        self.tasks.lock().unwrap().push(routing);

        for address in occupants {
            match self.create_peer(&address, PeerRole::Initiator).await {
                Ok(peer) => peer.scheduler().trigger(),
                Err(e) => warn!("Failed to create peer {}: {}", address, e),
            }
        }

        Ok(())
    }

    /// Route one inbound signal.
    ///
    /// An offer from an unknown address creates a peer in responder role; any
    /// other signal type for an unknown address is a protocol violation.
    pub async fn handle_signal(self: &Arc<Self>, from: &str, signal: Signal) -> Result<()> {
        if self.is_closed() {
            return Err(Error::PeerClosed("mesh".to_string()));
        }

        match signal {
            Signal::Offer { sdp } => {
                // Drop the read guard before create_peer takes the write lock
                let existing = self.directory.read().await.get(from);
                let peer = match existing {
                    Some(peer) => peer,
                    None => self.create_peer(from, PeerRole::Responder).await?,
                };

                let answer = peer.connection().accept_offer(sdp).await?;
                self.exchange
                    .send(from, Signal::Answer { sdp: answer })
                    .await?;
                debug!("Answered offer from {}", from);
                Ok(())
            }
            Signal::Answer { sdp } => {
                let peer = self
                    .directory
                    .read()
                    .await
                    .get(from)
                    .ok_or_else(|| Error::UnknownPeer(from.to_string()))?;
                peer.connection().apply_answer(sdp).await
            }
            Signal::Candidate {
                sdp_m_line_index,
                candidate,
            } => {
                let peer = self
                    .directory
                    .read()
                    .await
                    .get(from)
                    .ok_or_else(|| Error::UnknownPeer(from.to_string()))?;
                peer.connection()
                    .add_remote_candidate(sdp_m_line_index, candidate)
                    .await
            }
        }
    }

    /// Create a peer for an address, or return the existing one if another
    /// flow won the creation race. Exactly one live peer per address.
    async fn create_peer(self: &Arc<Self>, address: &str, role: PeerRole) -> Result<Arc<Peer>> {
        let scheduler = NegotiationScheduler::new(
            address,
            Duration::from_millis(self.config.debounce_ms),
            role == PeerRole::Responder,
            self.fire_tx.clone(),
        );

        let recording = match &self.recording_source {
            Some(factory) => RecordingRole::RecordeeCandidate {
                source_factory: Arc::clone(factory),
                local_state: Arc::clone(&self.local_state),
            },
            None => RecordingRole::None,
        };

        let initial_state = self.local_state.read().await.clone();
        let initial_audio = self.local_audio.read().await.clone();

        let connection = Arc::new(
            PeerConnection::new(
                address.to_string(),
                role,
                &self.config,
                Arc::clone(&scheduler),
                recording,
                initial_state,
                initial_audio,
            )
            .await?,
        );

        let peer = Arc::new(Peer {
            connection,
            scheduler,
            negotiation_round: tokio::sync::Mutex::new(()),
            recorder: RwLock::new(None),
        });

        {
            let mut directory = self.directory.write().await;
            if directory.len() >= self.config.max_peers as usize {
                drop(directory);
                let _ = peer.connection().close().await;
                return Err(Error::PeerConnectionError(format!(
                    "Maximum peer limit reached ({})",
                    self.config.max_peers
                )));
            }
            if !directory.insert(address.to_string(), Arc::clone(&peer)) {
                // Another flow created this peer first; keep theirs
                let existing = directory.get(address);
                drop(directory);
                peer.scheduler().cancel();
                let _ = peer.connection().close().await;
                return existing
                    .ok_or_else(|| Error::PeerConnectionError("Peer vanished".to_string()));
            }
        }

        self.spawn_peer_watchers(address, &peer);

        info!("Peer {} created ({:?})", address, role);
        Ok(peer)
    }

    /// Spawn the per-peer background flows: fatal ICE watcher and outbound
    /// candidate relay. Both end on their own once the peer is gone.
    fn spawn_peer_watchers(self: &Arc<Self>, address: &str, peer: &Arc<Peer>) {
        let mut ice_rx = peer.connection().subscribe_ice_state();
        let weak = Arc::downgrade(self);
        let watched = address.to_string();
        tokio::spawn(async move {
            loop {
                if ice_rx.changed().await.is_err() {
                    break;
                }
                let state = *ice_rx.borrow();
                if ice_is_fatal(state) {
                    if let Some(mesh) = weak.upgrade() {
                        mesh.remove_peer(&watched, &format!("ice {}", state)).await;
                    }
                    break;
                }
            }
        });

        if let Some(mut candidates) = peer.connection().take_candidate_stream() {
            let exchange = Arc::clone(&self.exchange);
            let target = address.to_string();
            tokio::spawn(async move {
                while let Some(init) = candidates.recv().await {
                    let signal = Signal::Candidate {
                        sdp_m_line_index: init.sdp_mline_index.unwrap_or(0),
                        candidate: init.candidate,
                    };
                    if let Err(e) = exchange.send(&target, signal).await {
                        debug!("Candidate relay to {} ended: {}", target, e);
                        break;
                    }
                }
            });
        }
    }

    /// Run one negotiation round for an address fired by the debounce timer.
    ///
    /// A fired address whose peer is gone is silently dropped. Rounds for the
    /// same peer are serialized so a new round can never clobber a pending
    /// local description.
    async fn negotiate(self: &Arc<Self>, address: &str) {
        let peer = match self.directory.read().await.get(address) {
            Some(peer) => peer,
            None => {
                debug!("Negotiation fired for departed peer {}", address);
                return;
            }
        };

        let _round = peer.negotiation_round.lock().await;

        let result = async {
            let sdp = peer.connection().create_offer_sdp().await?;
            self.exchange.send(address, Signal::Offer { sdp }).await
        }
        .await;

        match result {
            Ok(()) => {
                debug!("Sent offer to {}", address);
                self.arm_negotiation_watchdog(address);
            }
            Err(e) if e.is_state_error() => {
                debug!("Peer {} closed mid-negotiation", address);
            }
            Err(e) => warn!("Negotiation with {} failed: {}", address, e),
        }
    }

    /// After sending an offer, tear the peer down if the connection still
    /// sits in have-local-offer when the configured window elapses.
    fn arm_negotiation_watchdog(self: &Arc<Self>, address: &str) {
        let Some(timeout_ms) = self.config.negotiation_timeout_ms else {
            return;
        };

        let weak = Arc::downgrade(self);
        let watched = address.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            let Some(mesh) = weak.upgrade() else { return };
            let peer = match mesh.directory.read().await.get(&watched) {
                Some(peer) => peer,
                None => return,
            };
            let connection = peer.connection();
            if !connection.is_closed()
                && connection.signaling_state() == RTCSignalingState::HaveLocalOffer
            {
                warn!(
                    "Negotiation with {} stalled past {}ms, removing peer",
                    watched, timeout_ms
                );
                mesh.remove_peer(&watched, "negotiation timeout").await;
            }
        });
    }

    /// Replace the local participant state and push it to every peer.
    ///
    /// State travels over the already-open side-channels; no renegotiation.
    pub async fn set_local_state(&self, state: PeerState) -> Result<()> {
        *self.local_state.write().await = state.clone();
        self.push_state(state).await;
        Ok(())
    }

    /// Mutate the local participant state and push the result to every peer
    pub async fn update_local_state(&self, update: impl FnOnce(&mut PeerState)) -> Result<()> {
        let state = {
            let mut guard = self.local_state.write().await;
            update(&mut guard);
            guard.clone()
        };
        self.push_state(state).await;
        Ok(())
    }

    /// Set the local display name
    pub async fn set_local_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update_local_state(|state| state.name = name).await
    }

    /// Set the local mute flag
    pub async fn set_local_muted(&self, is_muted: bool) -> Result<()> {
        self.update_local_state(|state| state.is_muted = is_muted)
            .await
    }

    async fn push_state(&self, state: PeerState) {
        let peers = self.directory.read().await.peers_in_order();
        for (address, peer) in peers {
            if let Err(e) = peer.connection().set_local_state(state.clone()).await {
                warn!("State push to {} failed: {}", address, e);
            }
        }
    }

    /// Attach the local audio track on every peer and schedule renegotiation
    /// for each peer whose media set changed
    pub async fn set_local_audio(&self, track: Arc<TrackLocalStaticSample>) -> Result<()> {
        *self.local_audio.write().await = Some(Arc::clone(&track));

        let peers = self.directory.read().await.peers_in_order();
        for (address, peer) in peers {
            match peer.connection().set_local_audio(Arc::clone(&track)).await {
                Ok(()) => peer.scheduler().trigger(),
                Err(e) => warn!("Audio attach for {} failed: {}", address, e),
            }
        }
        Ok(())
    }

    /// Detach the local audio track everywhere and schedule renegotiation
    pub async fn unset_local_audio(&self) -> Result<()> {
        *self.local_audio.write().await = None;

        let peers = self.directory.read().await.peers_in_order();
        for (address, peer) in peers {
            match peer.connection().unset_local_audio().await {
                Ok(()) => peer.scheduler().trigger(),
                Err(e) => warn!("Audio detach for {} failed: {}", address, e),
            }
        }
        Ok(())
    }

    /// Remove a peer from the directory and release its resources.
    ///
    /// This is the only automatic removal path; it runs on fatal ICE
    /// transitions and on the negotiation watchdog.
    pub async fn remove_peer(&self, address: &str, reason: &str) {
        let peer = self.directory.write().await.remove(address);
        if let Some(peer) = peer {
            info!("Removing peer {} ({})", address, reason);
            peer.scheduler().cancel();
            match peer.connection().close().await {
                Ok(()) => {}
                Err(e) if e.is_state_error() => {}
                Err(e) => warn!("Close of removed peer {} failed: {}", address, e),
            }
        }
    }

    /// Close the mesh: exchange connection first (so teardown cannot spawn
    /// new peers), then every peer, clearing the directory. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing mesh for room {}", self.config.room_name);

        if let Err(e) = self.exchange.close().await {
            warn!("Exchange close failed: {}", e);
        }

        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        let peers = self.directory.write().await.drain();
        for (address, peer) in peers {
            peer.scheduler().cancel();
            match peer.connection().close().await {
                Ok(()) => {}
                Err(e) if e.is_state_error() => {}
                Err(e) => warn!("Close of peer {} failed: {}", address, e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_peer(address: &str) -> Arc<Peer> {
        let (fire_tx, _fire_rx) = tokio::sync::mpsc::unbounded_channel();
        let scheduler =
            NegotiationScheduler::new(address, Duration::from_millis(50), false, fire_tx);
        let connection = Arc::new(
            PeerConnection::new(
                address.to_string(),
                PeerRole::Initiator,
                &MeshConfig::default(),
                Arc::clone(&scheduler),
                RecordingRole::None,
                PeerState::default(),
                None,
            )
            .await
            .unwrap(),
        );
        Arc::new(Peer {
            connection,
            scheduler,
            negotiation_round: tokio::sync::Mutex::new(()),
            recorder: RwLock::new(None),
        })
    }

    #[tokio::test]
    async fn test_directory_preserves_insertion_order() {
        let mut directory = MeshDirectory::default();
        assert!(directory.is_empty());

        for address in ["c", "a", "b"] {
            assert!(directory.insert(address.to_string(), test_peer(address).await));
        }

        assert_eq!(directory.addresses(), vec!["c", "a", "b"]);
        assert_eq!(directory.len(), 3);

        directory.remove("a");
        assert_eq!(directory.addresses(), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_directory_rejects_duplicate_address() {
        let mut directory = MeshDirectory::default();
        assert!(directory.insert("a".to_string(), test_peer("a").await));
        assert!(!directory.insert("a".to_string(), test_peer("a").await));
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.addresses(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_directory_drain_empties_in_order() {
        let mut directory = MeshDirectory::default();
        directory.insert("x".to_string(), test_peer("x").await);
        directory.insert("y".to_string(), test_peer("y").await);

        let drained = directory.drain();
        assert_eq!(
            drained.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );
        assert!(directory.is_empty());
        assert!(directory.addresses().is_empty());
    }

    #[tokio::test]
    async fn test_directory_get_and_contains() {
        let mut directory = MeshDirectory::default();
        directory.insert("a".to_string(), test_peer("a").await);

        assert!(directory.contains("a"));
        assert!(!directory.contains("b"));
        assert!(directory.get("a").is_some());
        assert!(directory.get("b").is_none());
    }
}
