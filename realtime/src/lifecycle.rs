//! Per-connection state machine: authenticate, register, serve, deregister.

use crate::auth::TokenVerifier;
use crate::connection::{ConnectionHandle, Platform, Tenant};
use crate::error::Error;
use crate::manager::Manager;
use crate::message::{ConnectedFrame, ControlFrame, InboundFrame};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use events::TenantType;
use futures::stream::{SplitSink, Stream};
use futures::{SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// An authenticated connection attempt, ready to be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub tenant: Tenant,
    pub platform: Platform,
}

#[derive(Clone)]
pub struct Lifecycle {
    manager: Arc<Manager>,
    verifier: Arc<dyn TokenVerifier>,
}

impl Lifecycle {
    pub fn new(manager: Arc<Manager>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { manager, verifier }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Verify the token and check it may open the requested channel. The
    /// platform parameter wins over the token's platform claim, which wins
    /// over the `web` default.
    pub fn authenticate(
        &self,
        token: &str,
        requested: TenantType,
        platform: Option<Platform>,
    ) -> Result<Registration, Error> {
        let identity = self.verifier.verify(token)?;
        let platform = platform.or(identity.platform).unwrap_or_default();
        let tenant = identity.authorize(requested, platform)?;

        Ok(Registration { tenant, platform })
    }

    /// Register a new handle writing into `sender` and greet it with a
    /// `connected` frame.
    pub fn register(
        &self,
        registration: &Registration,
        sender: UnboundedSender<Message>,
    ) -> ConnectionHandle {
        let handle = ConnectionHandle::new(registration.tenant, registration.platform, sender);
        self.manager.register(handle.clone());

        let connected = ConnectedFrame::new(
            registration.tenant.tenant_type,
            registration.tenant.tenant_id,
        );
        if let Err(e) = self.manager.send_personal(&handle, &connected) {
            warn!("Failed to confirm connection {}: {e}", handle.id());
        }

        handle
    }

    /// Process client frames until the peer goes away, then deregister.
    pub async fn serve<S>(&self, handle: &ConnectionHandle, mut inbound: S)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        while let Some(received) = inbound.next().await {
            let text = match received {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("Connection {} sent non-UTF-8 binary frame, closing", handle.id());
                        break;
                    }
                },
                Ok(Message::Close(_)) => break,
                // Protocol-level ping/pong is answered by the transport.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => {
                    debug!("Connection {} read error: {e}", handle.id());
                    break;
                }
            };

            if let Err(e) = self.handle_frame(handle, &text) {
                warn!("Connection {} sent a malformed frame, closing: {e}", handle.id());
                break;
            }
        }

        debug!("Connection {} closed by {}", handle.id(), handle.tenant());
        self.manager.deregister(handle.id());
    }

    fn handle_frame(&self, handle: &ConnectionHandle, text: &str) -> Result<(), Error> {
        let reply = match InboundFrame::parse(text)? {
            InboundFrame::Ping { timestamp } => Some(ControlFrame::Pong { timestamp }),
            InboundFrame::SubscribeRoom { room: Some(room) } if !room.is_empty() => {
                self.manager
                    .join_room(handle, &room)
                    .then_some(ControlFrame::Subscribed { room })
            }
            InboundFrame::UnsubscribeRoom { room: Some(room) } if !room.is_empty() => {
                self.manager.leave_room(handle, &room);
                Some(ControlFrame::Unsubscribed { room })
            }
            InboundFrame::SubscribeRoom { .. }
            | InboundFrame::UnsubscribeRoom { .. }
            | InboundFrame::Unknown => {
                trace!("Ignoring frame from connection {}: {text}", handle.id());
                None
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = self.manager.send_personal(handle, &reply) {
                debug!("Failed to reply to connection {}: {e}", handle.id());
            }
        }

        Ok(())
    }

    /// Drive an upgraded socket through its whole registered life.
    pub async fn run(&self, socket: WebSocket, registration: Registration) {
        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_frames(sink, rx));

        let handle = self.register(&registration, tx);
        self.serve(&handle, stream).await;
        drop(handle);

        if let Err(e) = writer.await {
            warn!("WebSocket writer task failed: {e}");
        }
    }
}

/// Refuse a connection that failed authentication. It is never registered.
pub async fn reject(mut socket: WebSocket, err: &Error) {
    warn!("WebSocket connection refused: {err}");
    let close = Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: err.close_reason().into(),
    }));
    if let Err(e) = socket.send(close).await {
        debug!("Failed to send close frame: {e}");
    }
}

/// Drains a connection's queue into its socket. Exiting drops the receiver,
/// which is how handles observe that the socket is dead.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: UnboundedReceiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = sink.send(message).await {
            debug!("WebSocket write failed: {e}");
            return;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::error::{AuthErrorKind, ErrorKind};
    use futures::channel::mpsc as futures_mpsc;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    struct StaticVerifier {
        identities: HashMap<&'static str, Identity>,
    }

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<Identity, Error> {
            self.identities
                .get(token)
                .cloned()
                .ok_or_else(|| Error::auth(AuthErrorKind::InvalidToken))
        }
    }

    fn lifecycle() -> Lifecycle {
        let identities = HashMap::from([
            (
                "user-5",
                Identity {
                    tenant_type: TenantType::User,
                    tenant_id: 5,
                    platform: Some(Platform::Mobile),
                    is_admin: false,
                },
            ),
            (
                "shop-7",
                Identity {
                    tenant_type: TenantType::Shop,
                    tenant_id: 7,
                    platform: None,
                    is_admin: false,
                },
            ),
        ]);
        Lifecycle::new(
            Arc::new(Manager::new()),
            Arc::new(StaticVerifier { identities }),
        )
    }

    fn next_json(rx: &mut UnboundedReceiver<Message>) -> Value {
        match rx.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    fn text(value: Value) -> Result<Message, axum::Error> {
        Ok(Message::Text(value.to_string()))
    }

    #[test]
    fn test_authenticate_prefers_explicit_platform() {
        let lifecycle = lifecycle();

        let from_claim = lifecycle.authenticate("user-5", TenantType::User, None).unwrap();
        let explicit = lifecycle
            .authenticate("user-5", TenantType::User, Some(Platform::Web))
            .unwrap();
        let defaulted = lifecycle.authenticate("shop-7", TenantType::Shop, None).unwrap();

        assert_eq!(from_claim.platform, Platform::Mobile);
        assert_eq!(explicit.platform, Platform::Web);
        assert_eq!(defaulted.platform, Platform::Web);
    }

    #[test]
    fn test_shop_token_on_admin_channel_is_refused_and_never_registered() {
        let lifecycle = lifecycle();

        let err = lifecycle
            .authenticate("shop-7", TenantType::Admin, None)
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Auth(AuthErrorKind::AdminRoleRequired)
        );
        assert_eq!(lifecycle.manager().stats().total, 0);
    }

    #[test]
    fn test_unknown_token_is_refused() {
        let err = lifecycle()
            .authenticate("forged", TenantType::User, None)
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Auth(AuthErrorKind::InvalidToken));
        assert_eq!(err.close_reason(), "Invalid token");
    }

    #[test]
    fn test_register_sends_connected_frame_to_new_socket_only() {
        let lifecycle = lifecycle();
        let existing = lifecycle.authenticate("user-5", TenantType::User, None).unwrap();
        let (existing_tx, mut existing_rx) = mpsc::unbounded_channel();
        lifecycle.register(&existing, existing_tx);
        next_json(&mut existing_rx);

        let registration = lifecycle.authenticate("user-5", TenantType::User, None).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = lifecycle.register(&registration, tx);

        let connected = next_json(&mut rx);
        assert_eq!(connected["event"], "connected");
        assert_eq!(connected["client_type"], "user");
        assert_eq!(connected["client_id"], 5);
        assert!(existing_rx.try_recv().is_err());
        assert_eq!(
            lifecycle.manager().connections_of(TenantType::User, 5).len(),
            2
        );
        assert!(lifecycle
            .manager()
            .connections_of(TenantType::User, 5)
            .contains(&handle));
    }

    #[tokio::test]
    async fn test_serve_answers_commands_and_deregisters_on_disconnect() {
        let lifecycle = Arc::new(lifecycle());
        let registration = lifecycle.authenticate("user-5", TenantType::User, None).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = lifecycle.register(&registration, tx);
        next_json(&mut rx);

        let (inbound_tx, inbound_rx) = futures_mpsc::unbounded();
        let serving = {
            let lifecycle = lifecycle.clone();
            let handle = handle.clone();
            tokio::spawn(async move { lifecycle.serve(&handle, inbound_rx).await })
        };

        inbound_tx
            .unbounded_send(text(json!({"type": "ping", "timestamp": 1234})))
            .unwrap();
        inbound_tx
            .unbounded_send(text(json!({"type": "subscribe_room", "room": "A"})))
            .unwrap();
        inbound_tx
            .unbounded_send(text(json!({"type": "subscribe_room", "room": "B"})))
            .unwrap();
        inbound_tx
            .unbounded_send(text(json!({"type": "typing"})))
            .unwrap();
        inbound_tx
            .unbounded_send(text(json!({"type": "unsubscribe_room", "room": "never-joined"})))
            .unwrap();

        match rx.recv().await.unwrap() {
            Message::Text(reply) => {
                let reply: Value = serde_json::from_str(&reply).unwrap();
                assert_eq!(reply, json!({"type": "pong", "timestamp": 1234}));
            }
            other => panic!("expected pong, got {other:?}"),
        }
        for room in ["A", "B"] {
            match rx.recv().await.unwrap() {
                Message::Text(reply) => {
                    let reply: Value = serde_json::from_str(&reply).unwrap();
                    assert_eq!(reply, json!({"type": "subscribed", "room": room}));
                }
                other => panic!("expected subscription ack, got {other:?}"),
            }
        }
        match rx.recv().await.unwrap() {
            Message::Text(reply) => {
                let reply: Value = serde_json::from_str(&reply).unwrap();
                assert_eq!(reply, json!({"type": "unsubscribed", "room": "never-joined"}));
            }
            other => panic!("expected unsubscription ack, got {other:?}"),
        }
        assert_eq!(lifecycle.manager().room_members("A"), vec![handle.id().clone()]);

        drop(inbound_tx);
        serving.await.unwrap();

        let manager = lifecycle.manager();
        assert!(!manager.is_connected(TenantType::User, 5));
        assert!(manager.room_members("A").is_empty());
        assert!(manager.room_members("B").is_empty());
        assert_eq!(manager.stats().rooms, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_the_session() {
        let lifecycle = lifecycle();
        let registration = lifecycle.authenticate("shop-7", TenantType::Shop, None).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = lifecycle.register(&registration, tx);
        next_json(&mut rx);

        let inbound = futures::stream::iter(vec![
            Ok(Message::Text("not json".to_string())),
            text(json!({"type": "ping", "timestamp": 1})),
        ]);
        lifecycle.serve(&handle, inbound).await;

        assert!(rx.try_recv().is_err());
        assert!(!lifecycle.manager().is_connected(TenantType::Shop, 7));
    }

    #[tokio::test]
    async fn test_read_error_ends_the_session() {
        let lifecycle = lifecycle();
        let registration = lifecycle.authenticate("shop-7", TenantType::Shop, None).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = lifecycle.register(&registration, tx);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let inbound = futures::stream::iter(vec![Err(axum::Error::new(reset))]);
        lifecycle.serve(&handle, inbound).await;

        assert_eq!(lifecycle.manager().stats().total, 0);
    }

    #[tokio::test]
    async fn test_close_frame_ends_the_session() {
        let lifecycle = lifecycle();
        let registration = lifecycle.authenticate("user-5", TenantType::User, None).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = lifecycle.register(&registration, tx);

        let inbound = futures::stream::iter(vec![
            Ok(Message::Close(None)),
            text(json!({"type": "subscribe_room", "room": "A"})),
        ]);
        lifecycle.serve(&handle, inbound).await;

        assert!(lifecycle.manager().room_members("A").is_empty());
        assert!(!lifecycle.manager().is_connected(TenantType::User, 5));
    }
}
