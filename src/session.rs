// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge sessions - one per connected WebSocket client.
//!
//! A [`Session`] pairs the transport connection with at most one broker
//! client. It is the sole writer to the socket: every outbound frame goes
//! through the session's event channel and a single forward task. Inbound
//! frames are dispatched by their `action` tag to the broker controller.

use crate::broker::{self, BrokerLink};
use crate::protocol::{ClientAction, ServerEvent};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAP: usize = 256;

/// A WebSocket client session and its optional broker client.
pub struct Session {
    id: String,
    events: mpsc::Sender<ServerEvent>,
    broker: Mutex<Option<BrokerLink>>,
    closed: Notify,
}

impl Session {
    /// Create a session and the receiving end of its outbound channel.
    /// The caller feeds the receiver into [`Session::run`].
    pub fn new(id: String) -> (Arc<Self>, mpsc::Receiver<ServerEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAP);
        info!("[{}] session created", id);

        let session = Arc::new(Self {
            id,
            events,
            broker: Mutex::new(None),
            closed: Notify::new(),
        });
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sender half of the outbound channel, handed to the broker poll task.
    pub(crate) fn events(&self) -> mpsc::Sender<ServerEvent> {
        self.events.clone()
    }

    /// Queue an outbound frame. Dropped silently when the transport is gone.
    pub(crate) async fn send(&self, event: ServerEvent) {
        let _ = self.events.send(event).await;
    }

    /// Exclusive access to the broker slot. Never held across an await.
    pub(crate) fn broker_slot(&self) -> MutexGuard<'_, Option<BrokerLink>> {
        self.broker.lock()
    }

    /// Clone of the broker client handle, if one is attached.
    pub(crate) fn broker_client(&self) -> Option<rumqttc::AsyncClient> {
        self.broker.lock().as_ref().map(BrokerLink::client)
    }

    pub fn has_broker(&self) -> bool {
        self.broker.lock().is_some()
    }

    /// Close the broker client if present. Idempotent.
    pub fn teardown(&self) {
        if let Some(link) = self.broker.lock().take() {
            info!("[{}] closing MQTT client", self.id);
            link.close();
        }
    }

    /// Tear down the broker client and wake the transport loop so the
    /// socket closes. Used on shutdown and on session id collisions.
    pub fn shutdown(&self) {
        self.teardown();
        self.closed.notify_one();
    }

    /// Run the transport loop until the client disconnects or the session
    /// is shut down.
    pub async fn run(&self, socket: WebSocket, mut rx: mpsc::Receiver<ServerEvent>) {
        let (mut ws_tx, mut ws_rx) = socket.split();

        // Forward outbound events to the socket
        let session_id = self.id.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            debug!("[{}] WebSocket send failed, closing", session_id);
                            break;
                        }
                    }
                    Err(err) => {
                        error!("[{}] failed to serialize frame: {}", session_id, err);
                    }
                }
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        });

        loop {
            tokio::select! {
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => dispatch(self, &text).await,
                    Some(Ok(Message::Close(_))) => {
                        info!("[{}] client closed connection", self.id);
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Binary(_))) => {
                        warn!("[{}] binary frames not supported", self.id);
                    }
                    Some(Err(err)) => {
                        error!("[{}] WebSocket error: {}", self.id, err);
                        break;
                    }
                    None => break,
                },
                _ = self.closed.notified() => {
                    info!("[{}] session closing", self.id);
                    break;
                }
            }
        }

        forward.abort();
        info!("[{}] session ended", self.id);
    }
}

/// Route one inbound transport frame to the broker controller.
///
/// Malformed frames are dropped with a local diagnostic; they never
/// terminate the session.
pub async fn dispatch(session: &Session, text: &str) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(err) => {
            warn!("[{}] malformed frame dropped: {}", session.id(), err);
            return;
        }
    };

    match action {
        ClientAction::Subscribe { topic } => broker::subscribe(session, &topic).await,
        ClientAction::Unsubscribe { topic } => broker::unsubscribe(session, &topic).await,
        ClientAction::Publish { topic, message } => {
            broker::publish(session, &topic, message).await;
        }
        ClientAction::Unknown => {
            warn!("[{}] unrecognized action ignored: {}", session.id(), text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{idle_link, outbound, BrokerEvent};
    use crate::protocol::ConnectionStatus;
    use crate::registry::SessionRegistry;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let (session, mut rx) = Session::new("s1".into());

        dispatch(&session, "not json at all").await;
        dispatch(&session, r#"{"topic": "a/b"}"#).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        // Session still handles valid frames afterwards (no broker, so the
        // action is ignored rather than failing).
        dispatch(&session, r#"{"action": "subscribe", "topic": "a/b"}"#).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn unknown_action_is_ignored() {
        let (session, mut rx) = Session::new("s1".into());

        dispatch(&session, r#"{"action": "reboot", "topic": "a/b"}"#).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn broker_messages_preserve_order() {
        let (session, mut rx) = Session::new("s1".into());

        for n in 0..5 {
            let event = BrokerEvent::Message {
                topic: "a/b".into(),
                payload: format!("m{}", n).into_bytes(),
            };
            session.send(outbound(event)).await;
        }

        for n in 0..5 {
            let frame = rx.recv().await.expect("frame");
            assert_eq!(frame, ServerEvent::message("a/b", format!("m{}", n)));
        }
    }

    /// Full relay scenario: configure, subscribe, receive, disconnect.
    #[tokio::test]
    async fn end_to_end_relay() {
        let registry = SessionRegistry::new();
        let (session, mut rx) = Session::new("s1".into());
        assert!(registry.register(session.clone()).is_none());

        {
            let mut slot = session.broker_slot();
            *slot = Some(idle_link());
        }

        // Broker reports the connection is up.
        session.send(outbound(BrokerEvent::Connected)).await;

        // Client subscribes; confirmation follows the status frame.
        dispatch(&session, r#"{"action": "subscribe", "topic": "a/b"}"#).await;

        // Broker delivers a message on the subscribed topic.
        session
            .send(outbound(BrokerEvent::Message {
                topic: "a/b".into(),
                payload: b"hi".to_vec(),
            }))
            .await;

        assert_eq!(
            rx.recv().await.expect("status"),
            ServerEvent::status(ConnectionStatus::Connected)
        );
        assert_eq!(
            rx.recv().await.expect("confirmation"),
            ServerEvent::subscribed("a/b")
        );
        assert_eq!(
            rx.recv().await.expect("message"),
            ServerEvent::message("a/b", "hi")
        );

        // Transport closes: broker client released, session un-registered.
        session.teardown();
        registry.remove_session(&session);
        assert!(!session.has_broker());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn shutdown_closes_all_broker_clients() {
        let registry = SessionRegistry::new();
        let (a, _rx1) = Session::new("a".into());
        let (b, _rx2) = Session::new("b".into());
        registry.register(a.clone());
        registry.register(b.clone());

        *a.broker_slot() = Some(idle_link());
        *b.broker_slot() = Some(idle_link());

        registry.for_each(|session| session.shutdown());

        assert!(!a.has_broker());
        assert!(!b.has_broker());
    }
}
