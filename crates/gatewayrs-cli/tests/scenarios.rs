//! End-to-end scenario tests driven entirely through public APIs, without a
//! live upstream connection (no network, no child process spawned).

use gatewayrs_core::{GatewayConfig, TransportMode};
use gatewayrs_session::{SessionController, ShutdownCoordinator, DEFAULT_SESSION_ID};
use std::collections::HashMap;

fn empty_config(transport: TransportMode) -> GatewayConfig {
    GatewayConfig {
        transport,
        port: Some(8080),
        host: Some("127.0.0.1".to_string()),
        mcp_clients: HashMap::new(),
    }
}

#[tokio::test]
async fn stream_mode_config_with_no_peers_validates() {
    let config = empty_config(TransportMode::Stream);
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn framed_mode_requires_port_and_host() {
    let mut config = empty_config(TransportMode::Framed);
    config.port = None;
    assert!(config.validate().is_err());
}

/// Scenario 6 (session isolation): closing one session never disturbs
/// another session's capability record or fleet entries.
#[tokio::test]
async fn closing_one_session_leaves_others_untouched() {
    let controller = SessionController::new(empty_config(TransportMode::Stream));
    let shutdown = ShutdownCoordinator::new(controller.fleet(), controller.aggregation(), controller.capabilities());

    controller.capabilities().set(
        "s1",
        gatewayrs_core::CapabilityRecord {
            sampling: true,
            elicitation: false,
        },
    );
    controller.capabilities().set(
        "s2",
        gatewayrs_core::CapabilityRecord {
            sampling: false,
            elicitation: true,
        },
    );

    shutdown.close_session("s1").await;

    assert!(controller.capabilities().get("s1").is_none());
    assert!(controller.capabilities().get("s2").is_some());
}

/// Traffic arriving before upstream attachment completes sees an empty
/// fleet rather than an error (§4.5's "0 servers, never errors" rule).
#[tokio::test]
async fn duplex_gateway_with_no_configured_peers_has_empty_fleet() {
    let controller = SessionController::new(empty_config(TransportMode::Stream));
    let _gateway = controller.duplex_gateway().await;

    assert!(controller.fleet().list(DEFAULT_SESSION_ID).is_empty());
    assert!(controller.fleet().failures(DEFAULT_SESSION_ID).is_empty());
}
