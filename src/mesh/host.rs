//! Host recording coordination
//!
//! The one participant authorized to record drives start/stop across every
//! peer. Start is all-or-nothing: when any peer's start fails, every session
//! that did start is stopped again and the first error is surfaced, so the
//! group is never left half-recording behind the caller's back.

use crate::mesh::PeersMesh;
use crate::recording::{RecorderEntry, RecorderSession, RecordingControl, RecordingManifest};
use crate::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Fans recording start/stop out across the mesh
pub struct HostRecordingCoordinator {
    mesh: Arc<PeersMesh>,
    manifest: Mutex<RecordingManifest>,
    active: RwLock<Vec<(String, Arc<RecorderSession>)>>,
}

impl HostRecordingCoordinator {
    /// Create a coordinator over an existing mesh
    pub fn new(mesh: Arc<PeersMesh>) -> Self {
        Self {
            mesh,
            manifest: Mutex::new(RecordingManifest::new()),
            active: RwLock::new(Vec::new()),
        }
    }

    /// The mesh this coordinator records from
    pub fn mesh(&self) -> &Arc<PeersMesh> {
        &self.mesh
    }

    /// Session metadata accumulated across successful starts
    pub fn manifest(&self) -> RecordingManifest {
        self.manifest.lock().unwrap().clone()
    }

    /// Start recording on every current peer.
    ///
    /// Handshakes a session per peer, then sends start to each. If any start
    /// fails, sessions that started are stopped again and the first error is
    /// returned.
    pub async fn start_recording(&self) -> Result<()> {
        let peers = self.mesh.peers().await;
        let handshake_timeout = self
            .mesh
            .config()
            .handshake_timeout_ms
            .map(Duration::from_millis);

        info!("Starting recording across {} peers", peers.len());

        let mut sessions: Vec<(String, Arc<RecorderSession>)> = Vec::new();
        for (address, peer) in &peers {
            let session = peer.ensure_recorder(handshake_timeout).await.map_err(|e| {
                warn!("Recording handshake with {} failed: {}", address, e);
                e
            })?;
            sessions.push((address.clone(), session));
        }

        let controls: Vec<Arc<dyn RecordingControl>> = sessions
            .iter()
            .map(|(_, session)| Arc::clone(session) as Arc<dyn RecordingControl>)
            .collect();
        start_with_rollback(&controls).await?;

        {
            let mut manifest = self.manifest.lock().unwrap();
            for (_, session) in &sessions {
                manifest.merge(
                    session.session_id().to_string(),
                    RecorderEntry {
                        name: session.name().to_string(),
                        sample_rate: session.sample_rate(),
                    },
                );
            }
        }

        *self.active.write().await = sessions;
        info!("Recording started");
        Ok(())
    }

    /// Stop recording on every active session.
    ///
    /// Every session gets a stop attempt; the first error is returned after
    /// the sweep, the rest are logged.
    pub async fn stop_recording(&self) -> Result<()> {
        let sessions: Vec<_> = self.active.write().await.drain(..).collect();
        info!("Stopping recording across {} sessions", sessions.len());

        let controls: Vec<Arc<dyn RecordingControl>> = sessions
            .iter()
            .map(|(_, session)| Arc::clone(session) as Arc<dyn RecordingControl>)
            .collect();
        stop_all(&controls).await
    }

    /// Sessions started by the last successful start_recording call
    pub async fn active_sessions(&self) -> Vec<(String, Arc<RecorderSession>)> {
        self.active.read().await.clone()
    }
}

/// Start every control in order; on the first failure, stop the ones that
/// started and return that failure
async fn start_with_rollback(controls: &[Arc<dyn RecordingControl>]) -> Result<()> {
    for (index, control) in controls.iter().enumerate() {
        if let Err(e) = control.start().await {
            warn!(
                "Start of session {} failed ({}); rolling back {} started sessions",
                control.session_id(),
                e,
                index
            );
            for started in &controls[..index] {
                if let Err(stop_err) = started.stop().await {
                    warn!(
                        "Rollback stop of session {} failed: {}",
                        started.session_id(),
                        stop_err
                    );
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Stop every control, returning the first error after attempting all
async fn stop_all(controls: &[Arc<dyn RecordingControl>]) -> Result<()> {
    let mut first_error = None;
    for control in controls {
        if let Err(e) = control.stop().await {
            warn!("Stop of session {} failed: {}", control.session_id(), e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
