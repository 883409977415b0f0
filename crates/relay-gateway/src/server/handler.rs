//! WebSocket upgrade handler
//!
//! `GET /ws?otp=<token>`: redeem the token, check the origin, then hand the
//! upgraded socket to the connection pump.

use super::origin::origin_allowed;
use super::response::ApiResult;
use super::GatewayState;
use crate::error::GatewayError;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::{header::ORIGIN, HeaderMap},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct UpgradeParams {
    pub otp: Option<String>,
}

/// WebSocket gateway handler
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(params): Query<UpgradeParams>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let remote_addr = connect_info.map(|ConnectInfo(addr)| addr);

    // The token is spent here even if the handshake below fails
    let otp = params.otp.unwrap_or_default();
    if !state.tokens().verify(&otp) {
        tracing::info!(remote_addr = ?remote_addr, "Upgrade rejected: invalid token");
        return Err(GatewayError::Auth.into());
    }

    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !origin_allowed(origin, &state.config().relay.allowed_origins) {
        tracing::info!(remote_addr = ?remote_addr, origin = ?origin, "Upgrade rejected: origin");
        let reason = format!("origin not allowed: {}", origin.unwrap_or("<none>"));
        return Err(GatewayError::Upgrade(reason).into());
    }

    let upgrade = upgrade.map_err(|e| GatewayError::Upgrade(e.body_text()))?;

    let max_frame_size = state.config().relay.max_frame_size;

    Ok(upgrade
        .max_message_size(max_frame_size)
        .max_frame_size(max_frame_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(remote_addr = ?remote_addr, error = %e, "WebSocket handshake failed");
        })
        .on_upgrade(move |socket| async move {
            let Some((connection, outbound)) = state.register_connection(remote_addr) else {
                tracing::debug!(remote_addr = ?remote_addr, "Upgrade completed during shutdown");
                return;
            };

            tracing::info!(
                connection_id = %connection.id(),
                remote_addr = ?remote_addr,
                connections = state.registry().connection_count(),
                "WebSocket connection established"
            );

            state.pump().run(socket, connection, outbound).await;
        })
        .into_response())
}
