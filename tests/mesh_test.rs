//! Integration tests for mesh signal routing and peer lifecycle
//!
//! These run against the in-memory exchange harness with real (offline)
//! WebRTC peer connections, so offer/answer SDP is genuine.

mod harness;

use greenroom::negotiation::NegotiationScheduler;
use greenroom::{
    MeshConfig, PeerConnection, PeerRole, PeerState, PeersMesh, RecordingRole, Signal,
};
use harness::MockExchange;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const DEBOUNCE: Duration = Duration::from_millis(100);
const SETTLE: Duration = Duration::from_millis(500);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("greenroom=debug")
        .try_init();
}

fn test_config() -> MeshConfig {
    MeshConfig {
        debounce_ms: DEBOUNCE.as_millis() as u64,
        negotiation_timeout_ms: None,
        handshake_timeout_ms: Some(1_000),
        ..Default::default()
    }
}

/// Produce a genuine offer SDP from a standalone connection
async fn remote_offer() -> String {
    let (fire_tx, _fire_rx) = mpsc::unbounded_channel();
    let scheduler = NegotiationScheduler::new("remote", DEBOUNCE, false, fire_tx);
    let pc = PeerConnection::new(
        "remote".to_string(),
        PeerRole::Initiator,
        &MeshConfig::default(),
        scheduler,
        RecordingRole::None,
        PeerState::default(),
        None,
    )
    .await
    .unwrap();
    pc.create_offer_sdp().await.unwrap()
}

fn test_track() -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: "audio/opus".to_string(),
            clock_rate: 48000,
            channels: 1,
            sdp_fmtp_line: String::new(),
            rtcp_feedback: vec![],
        },
        "audio".to_string(),
        "capture".to_string(),
    ))
}

#[tokio::test]
async fn test_connect_creates_initiator_peers_and_negotiates() {
    init_logging();
    let exchange = MockExchange::new(&["b", "c"]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();

    mesh.connect().await.unwrap();

    assert_eq!(mesh.peer_count().await, 2);
    assert_eq!(mesh.addresses().await, vec!["b", "c"]);
    for address in ["b", "c"] {
        let peer = mesh.peer(address).await.unwrap();
        assert_eq!(peer.connection().role(), PeerRole::Initiator);
    }

    // Both scheduled negotiations collapse to one offer each
    sleep(SETTLE).await;
    assert_eq!(exchange.offers_to("b"), 1);
    assert_eq!(exchange.offers_to("c"), 1);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_room_connect_is_noop() {
    init_logging();
    let exchange = MockExchange::new(&[]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();

    mesh.connect().await.unwrap();
    assert_eq!(mesh.peer_count().await, 0);

    sleep(SETTLE).await;
    assert!(exchange.sent().is_empty());

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_offer_from_unknown_address_creates_responder_and_answers() {
    init_logging();
    let exchange = MockExchange::new(&[]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    let sdp = remote_offer().await;
    mesh.handle_signal("d", Signal::Offer { sdp }).await.unwrap();

    assert_eq!(mesh.peer_count().await, 1);
    let peer = mesh.peer("d").await.unwrap();
    assert_eq!(peer.connection().role(), PeerRole::Responder);
    assert_eq!(exchange.answers_to("d"), 1);

    // The answering side never originates an offer right after setup
    sleep(SETTLE).await;
    assert_eq!(exchange.offers_to("d"), 0);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_non_offer_from_unknown_address_is_rejected() {
    init_logging();
    let exchange = MockExchange::new(&[]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    let result = mesh
        .handle_signal(
            "x",
            Signal::Candidate {
                sdp_m_line_index: 0,
                candidate: "candidate:1 1 udp 1 127.0.0.1 5000 typ host".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(greenroom::Error::UnknownPeer(_))));

    let result = mesh
        .handle_signal(
            "x",
            Signal::Answer {
                sdp: "v=0".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(greenroom::Error::UnknownPeer(_))));

    // The violation must not create a dangling peer
    assert_eq!(mesh.peer_count().await, 0);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_offer_does_not_create_second_peer() {
    init_logging();
    let exchange = MockExchange::new(&[]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    let first = remote_offer().await;
    mesh.handle_signal("d", Signal::Offer { sdp: first })
        .await
        .unwrap();
    let peer_after_first = mesh.peer("d").await.unwrap();

    let second = remote_offer().await;
    mesh.handle_signal("d", Signal::Offer { sdp: second })
        .await
        .unwrap();

    assert_eq!(mesh.peer_count().await, 1);
    let peer_after_second = mesh.peer("d").await.unwrap();
    assert!(Arc::ptr_eq(&peer_after_first, &peer_after_second));
    assert_eq!(exchange.answers_to("d"), 2);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_inbound_signals_are_routed_through_the_exchange_stream() {
    init_logging();
    let exchange = MockExchange::new(&[]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    let sdp = remote_offer().await;
    exchange.inject("e", Signal::Offer { sdp });

    sleep(SETTLE).await;
    assert_eq!(mesh.peer_count().await, 1);
    assert_eq!(exchange.answers_to("e"), 1);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_media_change_schedules_renegotiation() {
    init_logging();
    let exchange = MockExchange::new(&["b"]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    sleep(SETTLE).await;
    exchange.clear_sent();

    mesh.set_local_audio(test_track()).await.unwrap();
    sleep(SETTLE).await;
    assert_eq!(exchange.offers_to("b"), 1);

    let peer = mesh.peer("b").await.unwrap();
    assert!(peer.connection().has_local_audio().await);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_state_change_does_not_renegotiate() {
    init_logging();
    let exchange = MockExchange::new(&["b"]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    sleep(SETTLE).await;
    exchange.clear_sent();

    mesh.set_local_name("ada").await.unwrap();
    mesh.set_local_muted(true).await.unwrap();
    assert_eq!(mesh.local_state().await.name, "ada");
    assert!(mesh.local_state().await.is_muted);

    // State rides the side-channel; no negotiation round
    sleep(SETTLE).await;
    assert_eq!(exchange.offers_to("b"), 0);

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_remove_peer_releases_resources() {
    init_logging();
    let exchange = MockExchange::new(&["b"]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();

    let peer = mesh.peer("b").await.unwrap();
    mesh.remove_peer("b", "test").await;

    assert_eq!(mesh.peer_count().await, 0);
    assert!(peer.connection().is_closed());
    assert!(!peer.scheduler().has_pending());

    mesh.close().await.unwrap();
}

#[tokio::test]
async fn test_close_clears_directory_and_exchange() {
    init_logging();
    let exchange = MockExchange::new(&["b", "c"]);
    let mesh = PeersMesh::new(
        test_config(),
        exchange.clone(),
        PeerState::default(),
        None,
    )
    .unwrap();
    mesh.connect().await.unwrap();
    assert_eq!(mesh.peer_count().await, 2);

    let peers: Vec<_> = mesh.peers().await;
    mesh.close().await.unwrap();

    assert!(exchange.is_closed());
    assert_eq!(mesh.peer_count().await, 0);
    for (_, peer) in peers {
        assert!(peer.connection().is_closed());
    }

    // Idempotent, and no routing survives teardown
    mesh.close().await.unwrap();
    let result = mesh
        .handle_signal(
            "b",
            Signal::Answer {
                sdp: "v=0".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(greenroom::Error::PeerClosed(_))));
}
