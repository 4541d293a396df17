// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker session controller - manages the one MQTT client of a session.
//!
//! A [`BrokerLink`] pairs a `rumqttc` client handle with the task that drives
//! its event loop. Installing a new link always closes the previous one
//! first, so a session never holds more than one live broker connection.
//! Broker-side events are translated into relay frames by [`outbound`] and
//! pushed through the session's event channel; translation failures never
//! reach the HTTP caller once the client is constructed.

use crate::protocol::{ConnectionStatus, ServerEvent};
use crate::session::Session;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default broker port when the config and host carry none.
pub const DEFAULT_PORT: u16 = 1883;

/// Fixed delay between reconnect attempts. Not client-configurable.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const REQUEST_QUEUE_CAP: usize = 128;

/// Validated broker connection parameters for a single `connect` request.
/// Not retained once the client is constructed.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

/// Synthesized client id, used when the request carries none.
pub fn default_client_id() -> String {
    format!("mqtt_{}", crate::unix_millis())
}

/// Split a host string into address and port.
///
/// Accepts bare hostnames, `mqtt://` / `mqtts://` / `tcp://` / `ws://`
/// prefixed URLs, and `host:port` pairs; an embedded port wins over the
/// configured one.
fn parse_host(raw: &str, fallback_port: u16) -> (String, u16) {
    let stripped = raw
        .strip_prefix("mqtt://")
        .or_else(|| raw.strip_prefix("mqtts://"))
        .or_else(|| raw.strip_prefix("tcp://"))
        .or_else(|| raw.strip_prefix("ws://"))
        .unwrap_or(raw);

    match stripped.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (stripped.to_string(), fallback_port),
        },
        None => (stripped.to_string(), fallback_port),
    }
}

/// Internal broker-side event, decoupled from the MQTT library's packet
/// types so the frame translation stays a pure function.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    Connected,
    Disconnected,
    Message { topic: String, payload: Vec<u8> },
    Error(String),
}

/// Translate a broker event into the relay frame sent to the transport.
pub fn outbound(event: BrokerEvent) -> ServerEvent {
    match event {
        BrokerEvent::Connected => ServerEvent::status(ConnectionStatus::Connected),
        BrokerEvent::Disconnected => ServerEvent::status(ConnectionStatus::Disconnected),
        BrokerEvent::Message { topic, payload } => {
            ServerEvent::message(topic, String::from_utf8_lossy(&payload).into_owned())
        }
        BrokerEvent::Error(error) => ServerEvent::error(error),
    }
}

/// An active MQTT client bound to one session.
pub struct BrokerLink {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl BrokerLink {
    /// Construct the client and spawn its poll task. Connection failures
    /// surface asynchronously as `mqtt-error` frames, never here.
    pub fn open(config: &BrokerConfig, session_id: &str, events: mpsc::Sender<ServerEvent>) -> Self {
        let (host, port) = parse_host(&config.host, config.port);

        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(ref username) = config.username {
            options.set_credentials(username.as_str(), config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAP);
        let session_id = session_id.to_string();
        let task = tokio::spawn(poll_loop(eventloop, events, session_id));

        Self { client, task }
    }

    /// Clone of the client handle for issuing requests.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Close the link: request a disconnect and stop the poll task.
    ///
    /// Consumes the link, so a client can be closed at most once. The
    /// disconnect request is best-effort; the broker's own shutdown
    /// handshake is not awaited.
    pub fn close(self) {
        let _ = self.client.try_disconnect();
        self.task.abort();
    }
}

/// Drive the MQTT event loop, relaying broker events to the transport.
///
/// Keeps retrying at the fixed reconnect interval until the link is closed
/// or the session's event channel goes away. A `disconnected` status is
/// emitted only on a connected → down transition so the retry loop does not
/// repeat it.
async fn poll_loop(
    mut eventloop: EventLoop,
    events: mpsc::Sender<ServerEvent>,
    session_id: String,
) {
    let mut connected = false;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                connected = true;
                info!("[{}] MQTT connected", session_id);
                if events
                    .send(outbound(BrokerEvent::Connected))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let event = BrokerEvent::Message {
                    payload: publish.payload.to_vec(),
                    topic: publish.topic,
                };
                if events.send(outbound(event)).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                info!("[{}] MQTT disconnected by broker", session_id);
                if connected {
                    connected = false;
                    if events
                        .send(outbound(BrokerEvent::Disconnected))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!("[{}] MQTT error: {}", session_id, err);
                if events
                    .send(outbound(BrokerEvent::Error(err.to_string())))
                    .await
                    .is_err()
                {
                    break;
                }
                if connected {
                    connected = false;
                    if events
                        .send(outbound(BrokerEvent::Disconnected))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                tokio::time::sleep(RECONNECT_INTERVAL).await;
            }
        }
    }

    debug!("[{}] MQTT poll loop ended", session_id);
}

/// Attach a broker client to the session, closing any previous one first.
pub fn connect(session: &Session, config: &BrokerConfig) {
    let mut slot = session.broker_slot();
    if let Some(old) = slot.take() {
        info!("[{}] replacing existing MQTT client", session.id());
        old.close();
    }
    *slot = Some(BrokerLink::open(config, session.id(), session.events()));
}

/// Subscribe the session's broker client to a topic.
///
/// Emits exactly one of `mqtt-subscribed` or `mqtt-error` per call. A
/// session without a broker client ignores the request.
pub async fn subscribe(session: &Session, topic: &str) {
    let Some(client) = session.broker_client() else {
        debug!("[{}] subscribe ignored, no MQTT client", session.id());
        return;
    };

    match client.subscribe(topic, QoS::AtMostOnce).await {
        Ok(()) => {
            info!("[{}] subscribed to '{}'", session.id(), topic);
            session.send(ServerEvent::subscribed(topic)).await;
        }
        Err(err) => {
            session
                .send(ServerEvent::error(format!("Subscribe failed: {}", err)))
                .await;
        }
    }
}

/// Unsubscribe from a topic. Fire-and-forget; failures are logged only.
pub async fn unsubscribe(session: &Session, topic: &str) {
    let Some(client) = session.broker_client() else {
        debug!("[{}] unsubscribe ignored, no MQTT client", session.id());
        return;
    };

    if let Err(err) = client.unsubscribe(topic).await {
        warn!("[{}] unsubscribe '{}' failed: {}", session.id(), topic, err);
    } else {
        info!("[{}] unsubscribed from '{}'", session.id(), topic);
    }
}

/// Publish a text payload to a topic. Success is silent; failures emit an
/// `mqtt-error` frame.
pub async fn publish(session: &Session, topic: &str, message: String) {
    let Some(client) = session.broker_client() else {
        debug!("[{}] publish ignored, no MQTT client", session.id());
        return;
    };

    if let Err(err) = client
        .publish(topic, QoS::AtMostOnce, false, message)
        .await
    {
        session
            .send(ServerEvent::error(format!("Publish failed: {}", err)))
            .await;
    }
}

#[cfg(test)]
pub(crate) fn idle_link() -> BrokerLink {
    // A client whose event loop is kept alive but never polled: requests
    // queue successfully without any network activity.
    let (client, eventloop) = AsyncClient::new(MqttOptions::new("idle", "127.0.0.1", 1883), 16);
    let task = tokio::spawn(async move {
        let _keep = eventloop;
        std::future::pending::<()>().await
    });
    BrokerLink { client, task }
}
