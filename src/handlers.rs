// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP and WebSocket entry points.
//!
//! The configuration endpoint attaches an MQTT client to an already
//! registered session; the WebSocket handler accepts transports and runs
//! their sessions to completion.

use crate::broker::{self, default_client_id, BrokerConfig, DEFAULT_PORT};
use crate::session::Session;
use crate::AppState;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: 400,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: 404,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Body of `POST /api/mqtt/connect`. All fields optional so missing ones
/// produce the endpoint's own 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub mqtt_config: Option<MqttConfigBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfigBody {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl MqttConfigBody {
    /// Apply defaults; `None` when the required host is missing.
    fn resolve(self) -> Option<BrokerConfig> {
        let host = self.host.filter(|h| !h.is_empty())?;
        Some(BrokerConfig {
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            username: self.username,
            password: self.password,
            client_id: self.client_id.unwrap_or_else(default_client_id),
        })
    }
}

/// Success acknowledgment echoing the session id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAck {
    pub success: bool,
    pub connection_id: String,
}

/// POST /api/mqtt/connect - attach or replace a session's MQTT client.
pub async fn mqtt_connect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectAck>, ApiError> {
    let connection_id = request.connection_id.filter(|id| !id.is_empty());
    let config = request.mqtt_config.and_then(MqttConfigBody::resolve);

    let (Some(connection_id), Some(config)) = (connection_id, config) else {
        return Err(ApiError::bad_request("Missing required parameters"));
    };

    let session = state
        .registry
        .lookup(&connection_id)
        .ok_or_else(|| ApiError::not_found("WebSocket connection not found"))?;

    info!(
        "[{}] MQTT connect requested: {}:{}",
        connection_id, config.host, config.port
    );
    broker::connect(&session, &config);

    Ok(Json(ConnectAck {
        success: true,
        connection_id,
    }))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}

/// GET /ws - WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session_id = derive_session_id(&params, &headers);

    // Accepted but not validated; no security contract is attached to it.
    if let Some(seckey) = params.get("seckey") {
        info!("[{}] seckey presented: {}", session_id, seckey);
    }

    ws.on_upgrade(move |socket| async move {
        let (session, rx) = Session::new(session_id);
        if let Some(displaced) = state.registry.register(session.clone()) {
            warn!(
                "[{}] session id collision, closing previous connection",
                displaced.id()
            );
            displaced.shutdown();
        }

        session.run(socket, rx).await;

        session.teardown();
        state.registry.remove_session(&session);
        info!("[{}] WebSocket disconnected", session.id());
    })
}

/// Preferred id is the `connid` query parameter; the WebSocket handshake
/// key and finally a timestamp serve as fallbacks.
fn derive_session_id(params: &HashMap<String, String>, headers: &HeaderMap) -> String {
    if let Some(id) = params.get("connid").filter(|id| !id.is_empty()) {
        return id.clone();
    }
    if let Some(key) = headers
        .get("sec-websocket-key")
        .and_then(|value| value.to_str().ok())
    {
        return key.to_string();
    }
    crate::unix_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionRegistry;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            registry: SessionRegistry::new(),
        })
    }

    fn valid_config() -> MqttConfigBody {
        MqttConfigBody {
            host: Some("mqtt://test".into()),
            port: Some(1883),
            username: None,
            password: None,
            client_id: None,
        }
    }

    #[tokio::test]
    async fn connect_rejects_missing_parameters() {
        let state = state();

        let request = ConnectRequest {
            connection_id: None,
            mqtt_config: Some(valid_config()),
        };
        let err = mqtt_connect(State(state.clone()), Json(request))
            .await
            .expect_err("missing connection id");
        assert_eq!(err.code, 400);
        assert_eq!(err.error, "Missing required parameters");

        let request = ConnectRequest {
            connection_id: Some("s1".into()),
            mqtt_config: Some(MqttConfigBody {
                host: None,
                ..valid_config()
            }),
        };
        let err = mqtt_connect(State(state), Json(request))
            .await
            .expect_err("missing host");
        assert_eq!(err.code, 400);
    }

    #[tokio::test]
    async fn connect_rejects_unknown_session() {
        let state = state();

        let request = ConnectRequest {
            connection_id: Some("ghost".into()),
            mqtt_config: Some(valid_config()),
        };
        let err = mqtt_connect(State(state), Json(request))
            .await
            .expect_err("no such session");
        assert_eq!(err.code, 404);
        assert_eq!(err.error, "WebSocket connection not found");
    }

    #[tokio::test]
    async fn connect_attaches_client_and_acknowledges() {
        let state = state();
        let (session, _rx) = Session::new("s1".into());
        state.registry.register(session.clone());

        let request = ConnectRequest {
            connection_id: Some("s1".into()),
            mqtt_config: Some(valid_config()),
        };
        let ack = mqtt_connect(State(state), Json(request))
            .await
            .expect("acknowledged");
        assert!(ack.success);
        assert_eq!(ack.connection_id, "s1");
        assert!(session.has_broker());

        session.teardown();
    }

    #[test]
    fn session_id_prefers_connid() {
        let mut params = HashMap::new();
        params.insert("connid".to_string(), "abc".to_string());
        let mut headers = HeaderMap::new();
        headers.insert("sec-websocket-key", "key123".parse().expect("header"));

        assert_eq!(derive_session_id(&params, &headers), "abc");
    }

    #[test]
    fn session_id_falls_back_to_handshake_key() {
        let params = HashMap::new();
        let mut headers = HeaderMap::new();
        headers.insert("sec-websocket-key", "key123".parse().expect("header"));

        assert_eq!(derive_session_id(&params, &headers), "key123");
    }

    #[test]
    fn session_id_falls_back_to_timestamp() {
        let id = derive_session_id(&HashMap::new(), &HeaderMap::new());
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
