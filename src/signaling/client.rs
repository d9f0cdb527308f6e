//! Signaling exchange client
//!
//! The mesh talks to the exchange through the [`SignalingExchange`] trait so
//! the transport can be swapped in tests. The production implementation is a
//! WebSocket client speaking the JSON protocol in [`super::protocol`].

use crate::signaling::{IncomingSignal, JoinRequest, JoinResponse, OutgoingSignal, Signal};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Out-of-band channel used to ferry signals between peers before a direct
/// connection exists. Assumed reliable, ordered, and bidirectional.
#[async_trait]
pub trait SignalingExchange: Send + Sync {
    /// Join a room. Returns the addresses already present and the stream of
    /// inbound signal envelopes.
    async fn connect(
        &self,
        room_name: &str,
    ) -> Result<(Vec<String>, mpsc::UnboundedReceiver<IncomingSignal>)>;

    /// Send a signal to a peer address.
    async fn send(&self, to: &str, signal: Signal) -> Result<()>;

    /// Close the exchange connection. Further sends fail.
    async fn close(&self) -> Result<()>;
}

struct ClientInner {
    out_tx: mpsc::UnboundedSender<Message>,
    tasks: Vec<JoinHandle<()>>,
}

/// WebSocket signaling exchange client
pub struct WebSocketSignalingClient {
    url: String,
    inner: Mutex<Option<ClientInner>>,
}

impl WebSocketSignalingClient {
    /// Create a client for the given exchange URL (not yet connected)
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            inner: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SignalingExchange for WebSocketSignalingClient {
    async fn connect(
        &self,
        room_name: &str,
    ) -> Result<(Vec<String>, mpsc::UnboundedReceiver<IncomingSignal>)> {
        info!("Connecting to signaling exchange at {}", self.url);

        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::WebSocketError(format!("Failed to connect: {}", e)))?;

        let (mut write, mut read) = ws.split();

        // Join the room
        let join = serde_json::to_string(&JoinRequest {
            room_name: room_name.to_string(),
        })
        .map_err(|e| Error::SerializationError(format!("Failed to serialize join: {}", e)))?;

        write
            .send(Message::Text(join))
            .await
            .map_err(|e| Error::WebSocketError(format!("Failed to send join: {}", e)))?;

        // First text frame is the join response
        let response = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    break serde_json::from_str::<JoinResponse>(&text).map_err(|e| {
                        Error::SerializationError(format!("Bad join response: {}", e))
                    })?;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(other)) => {
                    return Err(Error::SignalingError(format!(
                        "Unexpected frame during join: {:?}",
                        other
                    )));
                }
                Some(Err(e)) => {
                    return Err(Error::WebSocketError(format!("Join failed: {}", e)));
                }
                None => {
                    return Err(Error::SignalingError(
                        "Exchange closed during join".to_string(),
                    ));
                }
            }
        };

        debug!(
            "Joined room {} with {} existing occupants",
            room_name,
            response.other_socket_ids.len()
        );

        let (in_tx, in_rx) = mpsc::unbounded_channel::<IncomingSignal>();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        // Writer task: drain the outbox into the socket
        let write_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    warn!("Signaling write failed: {}", e);
                    break;
                }
            }
        });

        // Reader task: parse inbound envelopes and push them to the mesh
        let read_task = tokio::spawn(async move {
            while let Some(result) = read.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<IncomingSignal>(&text) {
                            Ok(envelope) => {
                                if in_tx.send(envelope).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Discarding malformed signal: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Signaling exchange closed by remote");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling read failed: {}", e);
                        break;
                    }
                }
            }
        });

        *self.inner.lock().unwrap() = Some(ClientInner {
            out_tx,
            tasks: vec![write_task, read_task],
        });

        Ok((response.other_socket_ids, in_rx))
    }

    async fn send(&self, to: &str, signal: Signal) -> Result<()> {
        let envelope = OutgoingSignal {
            to: to.to_string(),
            signal,
        };
        let json = serde_json::to_string(&envelope)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize envelope: {}", e)))?;

        let inner = self.inner.lock().unwrap();
        let inner = inner
            .as_ref()
            .ok_or_else(|| Error::SignalingError("Exchange not connected".to_string()))?;

        inner
            .out_tx
            .send(Message::Text(json))
            .map_err(|_| Error::SignalingError("Exchange connection closed".to_string()))
    }

    async fn close(&self) -> Result<()> {
        let inner = self.inner.lock().unwrap().take();
        if let Some(inner) = inner {
            // Best-effort close frame; the writer task exits when the outbox drops
            let _ = inner.out_tx.send(Message::Close(None));
            for task in inner.tasks {
                task.abort();
            }
            info!("Signaling exchange connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let client = WebSocketSignalingClient::new("ws://localhost:9");
        let result = client
            .send(
                "b",
                Signal::Offer {
                    sdp: "x".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(Error::SignalingError(_))));
    }

    #[tokio::test]
    async fn test_close_without_connect_is_noop() {
        let client = WebSocketSignalingClient::new("ws://localhost:9");
        assert!(client.close().await.is_ok());
        assert!(client.close().await.is_ok());
    }
}
