//! Shared harness: boots the real router on an ephemeral port with a
//! temp-dir data directory, and mints access tokens for test identities.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub jwt_secret: Vec<u8>,
    // Held so the data dir outlives the server.
    _tmp_dir: tempfile::TempDir,
}

/// Start the server exactly as main wires it, minus the logging mailer being
/// the only side-channel (which is also what production defaults to).
pub async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = clinic_hub::db::init_db(&data_dir).expect("init db");
    let jwt_secret =
        clinic_hub::auth::jwt::load_or_generate_jwt_secret(&data_dir).expect("jwt secret");

    let registry = Arc::new(clinic_hub::hub::registry::ConnectionRegistry::new());
    let hub = clinic_hub::hub::worker::spawn_dispatch_workers(registry.clone(), 2);

    let notifications = Arc::new(clinic_hub::notify::service::NotificationService::new(
        Arc::new(clinic_hub::notify::store::SqliteStore::new(db)),
        Arc::new(clinic_hub::notify::email::LogMailer),
        hub.clone(),
        5,
    ));

    let state = clinic_hub::state::AppState {
        jwt_secret: jwt_secret.clone(),
        registry,
        hub,
        notifications,
    };

    let app = clinic_hub::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        base_url: format!("http://{}", addr),
        jwt_secret,
        _tmp_dir: tmp_dir,
    }
}

pub fn token_for(server: &TestServer, user_id: i64, role: &str) -> String {
    clinic_hub::auth::jwt::issue_access_token(&server.jwt_secret, user_id, role)
        .expect("token issued")
}

/// Open a WebSocket connection, authenticated when a token is given.
pub async fn ws_connect(server: &TestServer, token: Option<&str>) -> (WsWriter, WsReader) {
    let url = match token {
        Some(token) => format!("ws://{}/ws?token={}", server.addr, token),
        None => format!("ws://{}/ws", server.addr),
    };
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .expect("ws connect");
    socket.split()
}

/// Wait for the next text frame and parse it as JSON.
pub async fn recv_json(read: &mut WsReader, wait: Duration) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(wait, read.next())
            .await
            .expect("frame within deadline")
            .expect("stream open")
            .expect("frame ok");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("json frame")
            }
            // Control frames can interleave; keep waiting for text.
            _ => continue,
        }
    }
}

/// Assert that no text frame arrives within the window.
pub async fn assert_silent(read: &mut WsReader, wait: Duration) {
    let outcome = tokio::time::timeout(wait, read.next()).await;
    match outcome {
        Err(_) => {} // timed out: silent, as expected
        Ok(Some(Ok(Message::Text(text)))) => {
            panic!("unexpected frame: {}", text.as_str())
        }
        Ok(_) => {} // close/control frame is fine
    }
}

/// Send a client command and wait for the ack/error reply.
pub async fn send_command(
    write: &mut WsWriter,
    read: &mut WsReader,
    command: serde_json::Value,
) -> serde_json::Value {
    write
        .send(Message::Text(command.to_string().into()))
        .await
        .expect("command sent");
    recv_json(read, Duration::from_secs(2)).await
}

/// Poll the status endpoint until `check` passes or the deadline hits.
/// Disconnect bookkeeping runs in the actor after the socket closes, so
/// status-based assertions need a few retries.
pub async fn wait_for_status<F>(server: &TestServer, token: &str, check: F) -> serde_json::Value
where
    F: Fn(&serde_json::Value) -> bool,
{
    let client = reqwest::Client::new();
    let mut last = serde_json::Value::Null;
    for _ in 0..50 {
        last = client
            .get(format!("{}/api/hub/status", server.base_url))
            .bearer_auth(token)
            .send()
            .await
            .expect("status request")
            .json()
            .await
            .expect("status json");
        if check(&last) {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("status never converged, last: {last}");
}
