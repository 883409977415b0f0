//! Test helpers for integration tests
//!
//! Provides a test server bound to an ephemeral port, HTTP helpers for the
//! login endpoint and a WebSocket client that speaks the relay's event frames.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use relay_common::AppConfig;
use relay_gateway::{create_gateway_state, serve, GatewayState};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, http::HeaderValue, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Origin accepted by the default allow-list
pub const ALLOWED_ORIGIN: &str = "http://localhost:8080";

/// How long a test waits for a frame before giving up
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server instance that manages lifecycle
///
/// Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with default settings
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a test server with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let state = create_gateway_state(config)?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            serve(listener, server_state).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, otp: &str) -> String {
        format!("ws://{}/ws?otp={otp}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Log in and return the one-time token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .post("/login", &serde_json::json!({"username": username, "password": password}))
            .await?;
        let body: Value = assert_json(response, StatusCode::OK).await?;

        body["otp"]
            .as_str()
            .map(str::to_string)
            .context("login response has no otp")
    }

    /// Log in with the default account and open a WebSocket
    pub async fn connect(&self) -> Result<WsClient> {
        let otp = self.login("test", "123").await?;
        Ok(self.upgrade(&otp, Some(ALLOWED_ORIGIN)).await?)
    }

    /// Attempt the WebSocket upgrade with `otp` and an optional Origin header
    pub async fn upgrade(&self, otp: &str, origin: Option<&str>) -> Result<WsClient, tungstenite::Error> {
        let mut request = self.ws_url(otp).into_client_request()?;
        if let Some(origin) = origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
            request.headers_mut().insert("Origin", value);
        }

        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(ws)
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        self.state.shutdown().cancel();
    }

    /// Poll until the server tracks exactly `count` connections
    pub async fn wait_for_connections(&self, count: usize) -> Result<()> {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while self.state.registry().connection_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .with_context(|| {
            format!(
                "expected {count} connections, have {}",
                self.state.registry().connection_count()
            )
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create a test configuration
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.port = 0;
    config
}

/// Send one event frame
pub async fn send_event(ws: &mut WsClient, event: &Value) -> Result<()> {
    ws.send(Message::Text(event.to_string())).await?;
    Ok(())
}

/// Send a `send_message` event
pub async fn send_message(ws: &mut WsClient, message: &str, from: &str) -> Result<()> {
    send_event(
        ws,
        &serde_json::json!({
            "type": "send_message",
            "payload": {"message": message, "from": from},
        }),
    )
    .await
}

/// Receive the next event frame, skipping control frames
pub async fn next_event(ws: &mut WsClient) -> Result<Value> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .context("timed out waiting for an event")?
            .context("connection ended")??;

        match frame {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => anyhow::bail!("unexpected frame: {other:?}"),
        }
    }
}

/// Read until the server closes the connection
///
/// Returns `true` when a close frame, stream end or transport error was seen
/// within the timeout.
pub async fn wait_for_close(ws: &mut WsClient) -> bool {
    tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .is_ok()
}

/// HTTP status of a rejected upgrade
pub fn rejection_status(err: &tungstenite::Error) -> Option<u16> {
    match err {
        tungstenite::Error::Http(response) => Some(response.status().as_u16()),
        _ => None,
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(())
}
