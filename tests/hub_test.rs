//! Integration tests for WebSocket connect/disconnect, group membership,
//! targeted fan-out, and status introspection.

mod common;

use common::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn status_reflects_connect_and_disconnect() {
    let server = start_test_server().await;
    let token = token_for(&server, 7, "Doctor");

    let (write, read) = ws_connect(&server, Some(&token)).await;

    let status = wait_for_status(&server, &token, |s| s["total_connections"] == 1).await;
    assert_eq!(status["authenticated_users"], 1);
    assert_eq!(status["anonymous_connections"], 0);
    assert_eq!(status["role_distribution"]["Doctor"], 1);
    assert_eq!(status["connections_per_user"]["7"], 1);
    let groups = status["active_groups"].as_array().unwrap();
    assert!(groups.contains(&json!("user:7")));
    assert!(groups.contains(&json!("role:doctor")));

    // Both halves must go away for the underlying stream to close.
    drop(write);
    drop(read);
    let status = wait_for_status(&server, &token, |s| s["total_connections"] == 0).await;
    assert_eq!(status["authenticated_users"], 0);
    assert_eq!(status["role_distribution"], json!({}));
    assert_eq!(status["active_groups"], json!([]));
    assert_eq!(status["connections_per_user"], json!({}));
}

#[tokio::test]
async fn send_to_user_reaches_every_tab() {
    let server = start_test_server().await;
    let token = token_for(&server, 5, "Patient");

    let (_w1, mut tab1) = ws_connect(&server, Some(&token)).await;
    let (_w2, mut tab2) = ws_connect(&server, Some(&token)).await;
    let other_token = token_for(&server, 6, "Patient");
    let (_w3, mut other) = ws_connect(&server, Some(&other_token)).await;
    wait_for_status(&server, &token, |s| s["total_connections"] == 3).await;

    let payload = json!({"kind": "lab-result", "ready": true});
    let resp = reqwest::Client::new()
        .post(format!("{}/api/hub/users/5", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "payload": payload }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    assert_eq!(recv_json(&mut tab1, Duration::from_secs(2)).await, payload);
    assert_eq!(recv_json(&mut tab2, Duration::from_secs(2)).await, payload);
    assert_silent(&mut other, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn broadcast_includes_anonymous_connections() {
    let server = start_test_server().await;
    let doctor = token_for(&server, 1, "Doctor");
    let nurse = token_for(&server, 2, "Nurse");

    let (_w1, mut doc) = ws_connect(&server, Some(&doctor)).await;
    let (_w2, mut nur) = ws_connect(&server, Some(&nurse)).await;
    let (_w3, mut anon) = ws_connect(&server, None).await;
    let status = wait_for_status(&server, &doctor, |s| s["total_connections"] == 3).await;
    assert_eq!(status["anonymous_connections"], 1);
    assert_eq!(status["authenticated_users"], 2);

    let payload = json!({"announcement": "clinic closes early today"});
    let resp = reqwest::Client::new()
        .post(format!("{}/api/hub/broadcast", server.base_url))
        .bearer_auth(&doctor)
        .json(&json!({ "payload": payload }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    for read in [&mut doc, &mut nur, &mut anon] {
        assert_eq!(recv_json(read, Duration::from_secs(2)).await, payload);
    }
}

#[tokio::test]
async fn role_targeting_matches_case_insensitively() {
    let server = start_test_server().await;
    let doctor = token_for(&server, 1, "Doctor");
    let nurse = token_for(&server, 2, "Nurse");

    let (_w1, mut doc) = ws_connect(&server, Some(&doctor)).await;
    let (_w2, mut nur) = ws_connect(&server, Some(&nurse)).await;
    wait_for_status(&server, &doctor, |s| s["total_connections"] == 2).await;

    let payload = json!({"to": "doctors only"});
    let resp = reqwest::Client::new()
        .post(format!("{}/api/hub/roles/DOCTOR", server.base_url))
        .bearer_auth(&doctor)
        .json(&json!({ "payload": payload }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    assert_eq!(recv_json(&mut doc, Duration::from_secs(2)).await, payload);
    assert_silent(&mut nur, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn ad_hoc_groups_join_send_leave() {
    let server = start_test_server().await;
    let token = token_for(&server, 3, "Nurse");
    let bystander_token = token_for(&server, 4, "Nurse");

    let (mut write, mut read) = ws_connect(&server, Some(&token)).await;
    let (_w2, mut bystander) = ws_connect(&server, Some(&bystander_token)).await;
    wait_for_status(&server, &token, |s| s["total_connections"] == 2).await;

    let reply = send_command(
        &mut write,
        &mut read,
        json!({"type": "join_group", "group": "ward-3"}),
    )
    .await;
    assert_eq!(reply["type"], "ack");
    assert_eq!(reply["group"], "ward-3");

    let payload = json!({"ward": 3, "alert": "bed 12"});
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/hub/groups/ward-3", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "payload": payload }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);

    assert_eq!(recv_json(&mut read, Duration::from_secs(2)).await, payload);
    assert_silent(&mut bystander, Duration::from_millis(300)).await;

    let reply = send_command(
        &mut write,
        &mut read,
        json!({"type": "leave_group", "group": "ward-3"}),
    )
    .await;
    assert_eq!(reply["type"], "ack");

    // After leaving, a group send is accepted but nothing arrives.
    let resp = client
        .post(format!("{}/api/hub/groups/ward-3", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "payload": {"alert": "second"} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    assert_silent(&mut read, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn reserved_group_prefixes_are_rejected() {
    let server = start_test_server().await;
    let token = token_for(&server, 3, "Nurse");
    let (mut write, mut read) = ws_connect(&server, Some(&token)).await;

    let reply = send_command(
        &mut write,
        &mut read,
        json!({"type": "join_group", "group": "user:9"}),
    )
    .await;
    assert_eq!(reply["type"], "error");

    let reply = send_command(
        &mut write,
        &mut read,
        json!({"type": "join_group", "group": "role:admin"}),
    )
    .await;
    assert_eq!(reply["type"], "error");
}

#[tokio::test]
async fn sends_to_empty_targets_are_accepted() {
    let server = start_test_server().await;
    let token = token_for(&server, 1, "Admin");
    let client = reqwest::Client::new();

    // Nobody is connected at all; every send is still accepted.
    for url in [
        format!("{}/api/hub/users/42", server.base_url),
        format!("{}/api/hub/roles/Doctor", server.base_url),
        format!("{}/api/hub/groups/ghost-ward", server.base_url),
        format!("{}/api/hub/broadcast", server.base_url),
    ] {
        let resp = client
            .post(url)
            .bearer_auth(&token)
            .json(&json!({ "payload": {"x": 1} }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
    }

    // Malformed targets are rejected up front.
    let resp = client
        .post(format!("{}/api/hub/users/0", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "payload": {"x": 1} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn invalid_token_closes_with_4002() {
    let server = start_test_server().await;
    let (_write, mut read) = ws_connect(&server, Some("not-a-real-token")).await;

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("close within deadline")
        .expect("stream open")
        .expect("frame ok");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4002),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn token_without_real_user_id_closes_with_4002() {
    let server = start_test_server().await;
    // Signed and unexpired, but uid 0 is not a targetable user.
    let token = token_for(&server, 0, "Doctor");
    let (_write, mut read) = ws_connect(&server, Some(&token)).await;

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("close within deadline")
        .expect("stream open")
        .expect("frame ok");
    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4002),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn hub_endpoints_require_auth() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/hub/status", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/hub/broadcast", server.base_url))
        .json(&json!({ "payload": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn server_answers_client_pings() {
    let server = start_test_server().await;
    let token = token_for(&server, 1, "Doctor");
    let (mut write, mut read) = ws_connect(&server, Some(&token)).await;

    write
        .send(Message::Ping(vec![9, 9].into()))
        .await
        .expect("ping sent");

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("pong within deadline")
        .expect("stream open")
        .expect("frame ok");
    match msg {
        Message::Pong(data) => assert_eq!(data.as_ref(), &[9u8, 9][..]),
        other => panic!("expected pong, got {other:?}"),
    }
}
