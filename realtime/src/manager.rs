use crate::connection::{ConnectionHandle, ConnectionId, ConnectionRegistry, Tenant};
use crate::error::{Error, TransportErrorKind};
use crate::room::RoomRegistry;
use axum::extract::ws::Message;
use events::{Audience, EventEnvelope, TenantId, TenantType};
use log::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Outcome of one fan-out. Dispatch never fails; dead sockets are counted
/// and cleaned up instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// Snapshot for operational monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub total: usize,
    pub by_type: BTreeMap<TenantType, usize>,
    pub rooms: usize,
}

/// Routes event envelopes to live connections and owns their registration.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
}

impl Manager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
        }
    }

    pub fn register(&self, handle: ConnectionHandle) {
        info!(
            "Registered WebSocket connection {} for {} (platform: {})",
            handle.id(),
            handle.tenant(),
            handle.platform()
        );
        self.registry.insert(handle);
        debug!("Total WebSocket connections: {}", self.registry.len());
    }

    /// Remove a connection from its tenant bucket and from every room.
    /// Safe to call more than once; later calls change nothing.
    pub fn deregister(&self, connection_id: &ConnectionId) -> bool {
        // Tenant removal happens before the room sweep; `join_room` relies on it.
        let removed = self.registry.remove(connection_id);
        self.rooms.remove_everywhere(connection_id);

        match removed {
            Some(handle) => {
                info!(
                    "Unregistered WebSocket connection {} for {}",
                    connection_id,
                    handle.tenant()
                );
                true
            }
            None => false,
        }
    }

    /// Subscribe a registered connection to a room. Returns false if the
    /// connection has already been deregistered.
    pub fn join_room(&self, handle: &ConnectionHandle, room: &str) -> bool {
        self.rooms.insert(room, handle.id().clone());

        if !self.registry.contains(handle.id()) {
            // Lost a race with deregistration; undo so no orphan membership remains.
            self.rooms.remove(room, handle.id());
            return false;
        }

        info!("Connection {} joined room {room}", handle.id());
        true
    }

    pub fn leave_room(&self, handle: &ConnectionHandle, room: &str) -> bool {
        let left = self.rooms.remove(room, handle.id());
        if left {
            info!("Connection {} left room {room}", handle.id());
        }
        left
    }

    /// Send a frame to one socket only, outside any fan-out.
    pub fn send_personal<T: Serialize>(&self, handle: &ConnectionHandle, frame: &T) -> Result<(), Error> {
        if !handle.is_alive() {
            warn!("Connection {} is closed, skipping message", handle.id());
            return Err(Error::transport(TransportErrorKind::ConnectionClosed));
        }
        handle.send_json(frame)
    }

    /// Deliver to every connection of one tenant. An offline tenant is not an error.
    pub fn send_to_client(
        &self,
        envelope: &EventEnvelope,
        tenant_type: TenantType,
        tenant_id: TenantId,
    ) -> Delivery {
        let tenant = Tenant::new(tenant_type, tenant_id);
        let targets = self.registry.members_of(&tenant);

        if targets.is_empty() {
            debug!("No active connections for {tenant}, dropping {}", envelope.event());
            return Delivery::default();
        }

        self.dispatch(envelope, targets, Vec::new(), &tenant.to_string())
    }

    /// Deliver to every connection of every tenant of one type.
    pub fn broadcast_to_type(&self, envelope: &EventEnvelope, tenant_type: TenantType) -> Delivery {
        let targets = self.registry.members_of_type(tenant_type);
        self.dispatch(envelope, targets, Vec::new(), tenant_type.as_str())
    }

    pub fn broadcast_to_all(&self, envelope: &EventEnvelope) -> Delivery {
        let targets = self.registry.all_members();
        self.dispatch(envelope, targets, Vec::new(), "all")
    }

    /// Deliver to the members of a room. A room nobody joined simply has no members.
    pub fn broadcast_to_room(&self, envelope: &EventEnvelope, room: &str) -> Delivery {
        let (targets, orphaned) = self.room_targets(room);
        self.dispatch(envelope, targets, orphaned, &format!("room {room}"))
    }

    /// Deliver once to every connection reached by at least one audience. A
    /// connection that is both a tenant target and a room member gets a
    /// single copy.
    pub fn send_to_audiences(&self, envelope: &EventEnvelope, audiences: &[Audience]) -> Delivery {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        let mut orphaned = Vec::new();

        for audience in audiences {
            let (handles, stale) = match audience {
                Audience::Client {
                    tenant_type,
                    tenant_id,
                } => (
                    self.registry
                        .members_of(&Tenant::new(*tenant_type, *tenant_id)),
                    Vec::new(),
                ),
                Audience::TenantType(tenant_type) => {
                    (self.registry.members_of_type(*tenant_type), Vec::new())
                }
                Audience::Everyone => (self.registry.all_members(), Vec::new()),
                Audience::Room(room) => self.room_targets(room),
            };

            targets.extend(
                handles
                    .into_iter()
                    .filter(|handle| seen.insert(handle.id().clone())),
            );
            orphaned.extend(stale.into_iter().filter(|id| seen.insert(id.clone())));
        }

        self.dispatch(
            envelope,
            targets,
            orphaned,
            &format!("{} audience(s)", audiences.len()),
        )
    }

    pub fn is_connected(&self, tenant_type: TenantType, tenant_id: TenantId) -> bool {
        self.registry
            .is_connected(&Tenant::new(tenant_type, tenant_id))
    }

    pub fn connections_of(&self, tenant_type: TenantType, tenant_id: TenantId) -> Vec<ConnectionHandle> {
        self.registry
            .members_of(&Tenant::new(tenant_type, tenant_id))
    }

    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms.members_of(room)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total: self.registry.len(),
            by_type: self.registry.count_by_type(),
            rooms: self.rooms.room_count(),
        }
    }

    /// Split a room's members into live handles and ids whose connection is
    /// already gone from the tenant registry.
    fn room_targets(&self, room: &str) -> (Vec<ConnectionHandle>, Vec<ConnectionId>) {
        let mut targets = Vec::new();
        let mut orphaned = Vec::new();

        for connection_id in self.rooms.members_of(room) {
            match self.registry.get(&connection_id) {
                Some(handle) => targets.push(handle),
                None => orphaned.push(connection_id),
            }
        }

        (targets, orphaned)
    }

    /// Traverse every target, then deregister the ones that failed. Removal is
    /// deferred until the traversal is finished.
    fn dispatch(
        &self,
        envelope: &EventEnvelope,
        targets: Vec<ConnectionHandle>,
        mut stale: Vec<ConnectionId>,
        scope: &str,
    ) -> Delivery {
        let message = match serde_json::to_string(envelope) {
            Ok(json) => Message::Text(json),
            Err(e) => {
                error!("Failed to serialize {} event: {e}", envelope.event());
                return Delivery::default();
            }
        };

        let mut delivery = Delivery::default();

        for handle in targets {
            if !handle.is_alive() {
                warn!(
                    "Connection {} for {} is closed, marking for removal",
                    handle.id(),
                    handle.tenant()
                );
                stale.push(handle.id().clone());
                continue;
            }

            match handle.send(message.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to send {} to connection {} for {}: {e}. Connection will be cleaned up.",
                        envelope.event(),
                        handle.id(),
                        handle.tenant()
                    );
                    stale.push(handle.id().clone());
                }
            }
        }

        delivery.dropped = stale.len();
        for connection_id in &stale {
            self.deregister(connection_id);
        }

        debug!(
            "Sent {} to {scope}: {} delivered, {} dropped",
            envelope.event(),
            delivery.delivered,
            delivery.dropped
        );

        delivery
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
