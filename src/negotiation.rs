//! Renegotiation debounce scheduling
//!
//! Bursts of "renegotiation needed" triggers (a track added, a data channel
//! opened) collapse into a single offer/answer round per quiescent period.
//! Each peer owns its scheduler; there is no shared timer map, so teardown
//! of one peer can never disturb another's pending negotiation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Per-peer debounce handle for renegotiation triggers.
///
/// At most one timer is pending at a time; a new trigger always aborts the
/// prior timer before arming its own. When the timer fires uncancelled, the
/// peer's address is pushed onto the mesh's negotiation queue.
pub struct NegotiationScheduler {
    address: String,
    debounce: Duration,
    fire_tx: mpsc::UnboundedSender<String>,
    pending: Mutex<Option<JoinHandle<()>>>,
    suppress_first: AtomicBool,
}

impl NegotiationScheduler {
    /// Create a scheduler for one peer address.
    ///
    /// `suppress_first` is set for peers created from an inbound offer: the
    /// answering side swallows its first trigger so both sides do not race to
    /// originate an offer right after connection setup.
    pub fn new(
        address: impl Into<String>,
        debounce: Duration,
        suppress_first: bool,
        fire_tx: mpsc::UnboundedSender<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            address: address.into(),
            debounce,
            fire_tx,
            pending: Mutex::new(None),
            suppress_first: AtomicBool::new(suppress_first),
        })
    }

    /// The address this scheduler negotiates for
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Record a renegotiation trigger.
    ///
    /// Cancels any pending timer for this address and arms a new one. For a
    /// non-initiator peer the very first trigger is swallowed without
    /// scheduling anything.
    pub fn trigger(&self) {
        if self.suppress_first.swap(false, Ordering::SeqCst) {
            debug!(
                "Swallowing first negotiation trigger for answering peer {}",
                self.address
            );
            return;
        }

        let mut pending = self.pending.lock().unwrap();
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let tx = self.fire_tx.clone();
        let address = self.address.clone();
        let debounce = self.debounce;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = tx.send(address);
        }));
    }

    /// Cancel any pending timer (used at peer teardown)
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Whether a timer is currently armed and unfired
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for NegotiationScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
