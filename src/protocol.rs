// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket relay frames for the MQTT bridge.
//!
//! JSON-based protocol for browser ↔ broker communication. Inbound frames
//! carry an `action` tag, outbound frames a `type` tag.

use serde::{Deserialize, Serialize};

/// Client → Bridge control actions
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientAction {
    /// Subscribe the session's broker client to a topic
    Subscribe { topic: String },

    /// Unsubscribe from a topic
    Unsubscribe { topic: String },

    /// Publish a text payload to a topic
    Publish { topic: String, message: String },

    /// Any unrecognized action tag; logged and ignored
    #[serde(other)]
    Unknown,
}

/// Bridge → Client events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Broker connection status changed
    #[serde(rename = "mqtt-status")]
    Status { status: ConnectionStatus },

    /// Broker-side failure (connection, subscribe, publish)
    #[serde(rename = "mqtt-error")]
    Error { error: String },

    /// Message received from the broker
    #[serde(rename = "mqtt-message")]
    Message { topic: String, message: String },

    /// Subscription confirmed
    #[serde(rename = "mqtt-subscribed")]
    Subscribed { topic: String },
}

/// Broker connection status as reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ServerEvent {
    /// Create a status frame
    pub fn status(status: ConnectionStatus) -> Self {
        Self::Status { status }
    }

    /// Create an error frame
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// Create a message relay frame
    pub fn message(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Message {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a subscription confirmation frame
    pub fn subscribed(topic: impl Into<String>) -> Self {
        Self::Subscribed {
            topic: topic.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_subscribe() {
        let json = r#"{"action": "subscribe", "topic": "a/b"}"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        match action {
            ClientAction::Subscribe { topic } => assert_eq!(topic, "a/b"),
            _ => panic!("Expected Subscribe"),
        }
    }

    #[test]
    fn parse_publish() {
        let json = r#"{"action": "publish", "topic": "cmd", "message": "on"}"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        match action {
            ClientAction::Publish { topic, message } => {
                assert_eq!(topic, "cmd");
                assert_eq!(message, "on");
            }
            _ => panic!("Expected Publish"),
        }
    }

    #[test]
    fn parse_unknown_action() {
        let json = r#"{"action": "dance", "topic": "floor"}"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        assert!(matches!(action, ClientAction::Unknown));
    }

    #[test]
    fn serialize_status() {
        let frame = ServerEvent::status(ConnectionStatus::Connected);
        let json: serde_json::Value =
            serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "mqtt-status", "status": "connected"})
        );
    }

    #[test]
    fn serialize_error() {
        let frame = ServerEvent::error("Subscribe failed: timeout");
        let json: serde_json::Value =
            serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "mqtt-error", "error": "Subscribe failed: timeout"})
        );
    }

    #[test]
    fn serialize_message() {
        let frame = ServerEvent::message("a/b", "hi");
        let json: serde_json::Value =
            serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "mqtt-message", "topic": "a/b", "message": "hi"})
        );
    }

    #[test]
    fn serialize_subscribed() {
        let frame = ServerEvent::subscribed("a/b");
        let json: serde_json::Value =
            serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"type": "mqtt-subscribed", "topic": "a/b"})
        );
    }
}
