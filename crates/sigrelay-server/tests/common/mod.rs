use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use sigrelay_server::auth::HmacTokenVerifier;
use sigrelay_server::config::ServerConfig;
use sigrelay_server::{build_app, spawn_idle_sweeper};

pub const TOKEN_SECRET: &str = "test-secret";

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live hub bound to an ephemeral port. The serve task is abandoned on
/// drop; tests don't need graceful shutdown.
pub struct TestServer {
    pub addr: SocketAddr,
    _serve: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server from a given config, always forcing a known
    /// `token_secret` so tests can mint valid tokens via [`token_for`].
    pub async fn start(mut config: ServerConfig) -> Self {
        config.auth.token_secret = Some(TOKEN_SECRET.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        spawn_idle_sweeper(&state);

        let serve = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        Self { addr, _serve: serve }
    }

    pub async fn with_defaults() -> Self {
        Self::start(ServerConfig::default()).await
    }

    pub fn url(&self, room: &str, client_id: &str) -> String {
        let token = token_for(client_id);
        self.url_with_token(room, client_id, &token)
    }

    pub fn url_with_token(&self, room: &str, client_id: &str, token: &str) -> String {
        format!("ws://{}/?room={room}&clientId={client_id}&token={token}", self.addr)
    }

    pub async fn health(&self) -> Value {
        let body = raw_get_health(self.addr).await;
        serde_json::from_str(&body).unwrap()
    }
}

/// Minimal hand-rolled GET, just enough for the one health-check assertion
/// that needs it — not worth a dependency for a single endpoint.
async fn raw_get_health(addr: SocketAddr) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").as_bytes(),
        )
        .await
        .unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).await.unwrap();
    buf.rsplit("\r\n\r\n").next().unwrap_or("").to_string()
}

pub fn token_for(subject: &str) -> String {
    HmacTokenVerifier::new(TOKEN_SECRET).issue(subject, 3600)
}

pub async fn connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Read the next text frame as parsed JSON, with a bounded timeout so a
/// hanging assertion fails fast instead of wedging the test suite.
pub async fn read_json(stream: &mut WsStream) -> Value {
    let data = read_text(stream).await;
    serde_json::from_str(&data).expect("server frame is valid JSON")
}

pub async fn read_text(stream: &mut WsStream) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(t))) => return t.to_string(),
                Some(Ok(Message::Close(_))) => panic!("socket closed while waiting for a frame"),
                Some(Err(e)) => panic!("websocket error: {e}"),
                None => panic!("stream ended while waiting for a frame"),
                _ => continue,
            }
        }
    })
    .await
    .expect("timed out waiting for a server frame")
}

/// Try to read the next text frame, returning `None` on timeout. Used to
/// assert that nothing arrives within a window.
pub async fn try_read_text(stream: &mut WsStream, timeout_ms: u64) -> Option<String> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(t))) => return Some(t.to_string()),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(_)) => return None,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(None)
}

pub async fn send_text(stream: &mut WsStream, body: &str) {
    stream.send(Message::Text(body.into())).await.unwrap();
}

pub async fn send_binary(stream: &mut WsStream, body: Vec<u8>) {
    stream.send(Message::Binary(body.into())).await.unwrap();
}
