// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket to MQTT bridge - Connect browsers to MQTT brokers.
//!
//! Each WebSocket client gets a session that can dynamically attach,
//! reconfigure, and close an MQTT client. Pub/sub traffic and connection
//! status flow as JSON frames over the WebSocket; a REST endpoint supplies
//! broker connection parameters.
//!
//! # Protocol
//!
//! Client → bridge frames carry an `action` tag:
//!
//! ```json
//! {"action": "subscribe", "topic": "sensors/temp"}
//! {"action": "unsubscribe", "topic": "sensors/temp"}
//! {"action": "publish", "topic": "commands", "message": "start"}
//! ```
//!
//! Bridge → client frames carry a `type` tag:
//!
//! ```json
//! {"type": "mqtt-status", "status": "connected"}
//! {"type": "mqtt-message", "topic": "sensors/temp", "message": "23.5"}
//! {"type": "mqtt-subscribed", "topic": "sensors/temp"}
//! {"type": "mqtt-error", "error": "Subscribe failed: ..."}
//! ```
//!
//! # Configuration endpoint
//!
//! ```json
//! POST /api/mqtt/connect
//! {"connectionId": "s1", "mqttConfig": {"host": "mqtt://broker", "port": 1883}}
//! ```

pub mod broker;
pub mod codec;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod session;

use registry::SessionRegistry;

/// Shared application state
pub struct AppState {
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch; used for synthesized identifiers.
pub(crate) fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}
