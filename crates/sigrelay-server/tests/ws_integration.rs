#[allow(dead_code)]
mod common;

use std::time::Duration;

use common::{TestServer, connect, read_json, send_binary, send_text, token_for, try_read_text};

#[tokio::test]
async fn missing_query_parameter_is_rejected_as_bad_request() {
    let server = TestServer::with_defaults().await;
    let url = format!("ws://{}/?room=r1&clientId=alice", server.addr); // no token
    let mut stream = connect(&url).await;

    let env = read_json(&mut stream).await;
    assert_eq!(env["type"], "error");
    assert_eq!(env["payload"]["code"], "bad_request");
}

#[tokio::test]
async fn invalid_room_code_is_rejected_as_bad_request() {
    let server = TestServer::with_defaults().await;
    let token = token_for("alice");
    let url = format!("ws://{}/?room=has%20space&clientId=alice&token={token}", server.addr);
    let mut stream = connect(&url).await;

    let env = read_json(&mut stream).await;
    assert_eq!(env["type"], "error");
    assert_eq!(env["payload"]["code"], "bad_request");
}

#[tokio::test]
async fn unsigned_token_is_rejected_as_auth_failed() {
    let server = TestServer::with_defaults().await;
    let mut stream = connect(&server.url_with_token("r1", "alice", "not-a-real-token")).await;

    let env = read_json(&mut stream).await;
    assert_eq!(env["type"], "error");
    assert_eq!(env["payload"]["code"], "auth_failed");
}

#[tokio::test]
async fn token_signed_with_the_wrong_secret_is_rejected() {
    let server = TestServer::with_defaults().await;
    let forged = sigrelay_server::auth::HmacTokenVerifier::new("wrong-secret").issue("alice", 60);
    let mut stream = connect(&server.url_with_token("r1", "alice", &forged)).await;

    let env = read_json(&mut stream).await;
    assert_eq!(env["payload"]["code"], "auth_failed");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let server = TestServer::with_defaults().await;
    let verifier = sigrelay_server::auth::HmacTokenVerifier::new(common::TOKEN_SECRET);
    // issue() only supports a forward ttl; build an already-expired token by
    // hand using the same signing scheme the verifier checks against.
    let expired = verifier.issue("alice", 0);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let mut stream = connect(&server.url_with_token("r1", "alice", &expired)).await;

    let env = read_json(&mut stream).await;
    assert_eq!(env["payload"]["code"], "auth_failed");
}

#[tokio::test]
async fn oversized_frame_closes_the_connection() {
    let mut config = sigrelay_server::config::ServerConfig::default();
    config.limits.max_frame_size_bytes = 16;
    let server = TestServer::start(config).await;

    let mut a = connect(&server.url("r1", "alice")).await;
    let _b = connect(&server.url("r1", "bob")).await;
    let _ = read_json(&mut a).await; // bob's peer_joined

    send_binary(&mut a, vec![0u8; 64]).await;

    let env = read_json(&mut a).await;
    assert_eq!(env["type"], "error");
    assert_eq!(env["payload"]["code"], "bad_request");
}

#[tokio::test]
async fn rate_limit_boundary_denies_the_eleventh_frame_and_recovers_after_the_window() {
    let server = TestServer::with_defaults().await; // default: 10 frames / 1s

    let mut a = connect(&server.url("rl-room", "alice")).await;
    let mut b = connect(&server.url("rl-room", "bob")).await;
    let _ = read_json(&mut a).await; // bob's peer_joined

    for i in 0..10 {
        send_text(&mut a, &format!("frame-{i}")).await;
    }
    for i in 0..10 {
        let received = common::read_text(&mut b).await;
        assert_eq!(received, format!("frame-{i}"));
    }

    send_text(&mut a, "frame-10").await;
    let env = read_json(&mut a).await;
    assert_eq!(env["type"], "error");
    assert_eq!(env["payload"]["code"], "rate_limited");

    // The rate-limited frame was never relayed, and the connection stayed open.
    let maybe = try_read_text(&mut b, 200).await;
    assert!(maybe.is_none(), "a rate-limited frame must not be forwarded");

    tokio::time::sleep(Duration::from_secs(1)).await;
    send_text(&mut a, "frame-after-recovery").await;
    let received = common::read_text(&mut b).await;
    assert_eq!(received, "frame-after-recovery");
}

#[tokio::test]
async fn health_endpoint_reports_live_connection_and_room_counts() {
    let server = TestServer::with_defaults().await;

    let before = server.health().await;
    assert_eq!(before["status"], "healthy");
    assert_eq!(before["connections"], 0);
    assert_eq!(before["rooms"], 0);

    let _a = connect(&server.url("health-room", "alice")).await;
    let _b = connect(&server.url("health-room", "bob")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = server.health().await;
    assert_eq!(after["connections"], 2);
    assert_eq!(after["rooms"], 1);
}
