//! Exercises the whiteboard transport's polling loop against a stubbed bulletin
//! board: a posted package should not echo back to its own sender, and the resumable
//! cursor should be persisted through the host filesystem so a restart would resume.

use overlay_comms_core::enc_pkg::EncPkg;
use overlay_comms_core::host::test_support::NullHost;
use overlay_comms_core::ids::{LinkType, PackageType, RaceHandle};
use overlay_comms_core::link::whiteboard::WhiteboardLink;
use overlay_comms_core::link::{DutyCycleConfig, Link};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posting_a_package_does_not_echo_it_back_to_the_sender() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/after/demo/0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "index": 0 })))
        .mount(&server)
        .await;

    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"payload");
    Mock::given(method("POST"))
        .and(path("/post/demo"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get/demo/0/-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [encoded],
            "length": 1,
            "timestamp": "100"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get/demo/1/-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": Vec::<String>::new(),
            "length": 0,
            "timestamp": "100"
        })))
        .mount(&server)
        .await;

    let addr = server.address();
    let hostname = addr.ip().to_string();
    let port = addr.port();

    let host = Arc::new(NullHost);
    let kind = WhiteboardLink::new(
        "wb-link".to_string(),
        host.clone(),
        hostname,
        port,
        "demo".to_string(),
        0.0,
        20,
        3,
    );
    let link = Link::new(
        "wb-link".to_string(),
        "whiteboardTwoSix".to_string(),
        LinkType::Bidirectional,
        host,
        kind.clone(),
        overlay_comms_core::link::fault::FaultConfig::default(),
        DutyCycleConfig::default(),
    );

    link.open_connection(
        "conn".to_string(),
        LinkType::Receive,
        String::new(),
        overlay_comms_core::ids::RACE_UNLIMITED,
    )
    .await
    .unwrap();

    let pkg = Arc::new(EncPkg::new(1, 1, PackageType::TestHarness, b"payload".to_vec()));
    link.enqueue(RaceHandle(1), pkg, f64::INFINITY).await.unwrap();

    // Give the send enough time to post, and the poll loop enough cycles to see its own
    // post come back and suppress it rather than redeliver it to the host.
    tokio::time::sleep(Duration::from_millis(300)).await;

    link.shutdown().await;
}
