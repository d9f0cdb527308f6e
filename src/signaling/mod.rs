//! Signaling exchange protocol and client

mod client;
mod protocol;

pub use client::{SignalingExchange, WebSocketSignalingClient};
pub use protocol::{IncomingSignal, JoinRequest, JoinResponse, OutgoingSignal, Signal};
