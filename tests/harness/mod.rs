//! Test harness: in-memory signaling exchange
//!
//! Records everything the mesh sends and lets tests inject inbound signals,
//! so mesh behavior can be exercised without a WebSocket server.

use async_trait::async_trait;
use greenroom::signaling::{IncomingSignal, Signal, SignalingExchange};
use greenroom::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory signaling exchange double
pub struct MockExchange {
    occupants: Vec<String>,
    sent: Mutex<Vec<(String, Signal)>>,
    incoming_tx: Mutex<Option<mpsc::UnboundedSender<IncomingSignal>>>,
    closed: AtomicBool,
}

impl MockExchange {
    /// Exchange whose room already holds `occupants`
    pub fn new(occupants: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            occupants: occupants.iter().map(|s| s.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
            incoming_tx: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Everything the mesh sent, in order
    pub fn sent(&self) -> Vec<(String, Signal)> {
        self.sent.lock().unwrap().clone()
    }

    /// Count of offers sent to one address
    pub fn offers_to(&self, address: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(to, signal)| to == address && matches!(signal, Signal::Offer { .. }))
            .count()
    }

    /// Count of answers sent to one address
    pub fn answers_to(&self, address: &str) -> usize {
        self.sent()
            .iter()
            .filter(|(to, signal)| to == address && matches!(signal, Signal::Answer { .. }))
            .count()
    }

    /// Forget everything sent so far
    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Inject an inbound envelope, as if a remote peer had signaled
    pub fn inject(&self, from: &str, signal: Signal) {
        let guard = self.incoming_tx.lock().unwrap();
        let tx = guard.as_ref().expect("exchange not connected");
        tx.send(IncomingSignal {
            from: from.to_string(),
            signal,
        })
        .expect("incoming channel closed");
    }

    /// Whether close() was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingExchange for MockExchange {
    async fn connect(
        &self,
        _room_name: &str,
    ) -> Result<(Vec<String>, mpsc::UnboundedReceiver<IncomingSignal>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.incoming_tx.lock().unwrap() = Some(tx);
        Ok((self.occupants.clone(), rx))
    }

    async fn send(&self, to: &str, signal: Signal) -> Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), signal));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.incoming_tx.lock().unwrap().take();
        Ok(())
    }
}
