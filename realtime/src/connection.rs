use crate::error::{Error, TransportErrorKind};
use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use events::{TenantId, TenantType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client platform a connection was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Mobile,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Mobile => "mobile",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct PlatformParseError;

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "mobile" => Ok(Platform::Mobile),
            _ => Err(PlatformParseError),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registry key: one tenant may hold several connections (devices, tabs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tenant {
    pub tenant_type: TenantType,
    pub tenant_id: TenantId,
}

impl Tenant {
    pub fn new(tenant_type: TenantType, tenant_id: TenantId) -> Self {
        Self {
            tenant_type,
            tenant_id,
        }
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.tenant_type, self.tenant_id)
    }
}

/// One live socket. Identity is fixed at creation; cloning shares the
/// underlying outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tenant: Tenant,
    platform: Platform,
    joined_at: DateTime<Utc>,
    sender: UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn new(tenant: Tenant, platform: Platform, sender: UnboundedSender<Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            tenant,
            platform,
            joined_at: Utc::now(),
            sender,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn tenant(&self) -> Tenant {
        self.tenant
    }

    pub fn tenant_type(&self) -> TenantType {
        self.tenant.tenant_type
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.tenant_id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// False once the connection's writer has stopped draining the queue.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a frame for this socket. Frames sent through one handle are
    /// written in the order they were queued.
    pub fn send(&self, message: Message) -> Result<(), Error> {
        self.sender
            .send(message)
            .map_err(|_| Error::transport(TransportErrorKind::ConnectionClosed))
    }

    pub fn send_json<T: Serialize>(&self, frame: &T) -> Result<(), Error> {
        let text = serde_json::to_string(frame)?;
        self.send(Message::Text(text))
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// Concurrent connection registry with dual indices:
/// connections by id for cleanup, and connection ids by tenant for routing.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup
    connections: DashMap<ConnectionId, ConnectionHandle>,

    /// Secondary index: tenant -> its live connection ids. Empty sets are pruned,
    /// so key presence means the tenant is online.
    tenant_index: DashMap<Tenant, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            tenant_index: DashMap::new(),
        }
    }

    pub fn insert(&self, handle: ConnectionHandle) {
        let tenant = handle.tenant();
        let connection_id = handle.id().clone();

        self.connections.insert(connection_id.clone(), handle);

        self.tenant_index
            .entry(tenant)
            .or_default()
            .insert(connection_id);
    }

    /// Remove a connection from both indices. Returns the handle if it was
    /// still registered; removing an absent connection is a no-op.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionHandle> {
        let (_, handle) = self.connections.remove(connection_id)?;
        let tenant = handle.tenant();

        if let Some(mut ids) = self.tenant_index.get_mut(&tenant) {
            ids.remove(connection_id);
        }
        // Checked under the shard lock so a concurrent insert for the same
        // tenant is never dropped with the bucket.
        self.tenant_index.remove_if(&tenant, |_, ids| ids.is_empty());

        Some(handle)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn is_connected(&self, tenant: &Tenant) -> bool {
        self.tenant_index.contains_key(tenant)
    }

    /// Snapshot of every connection of one tenant. Empty if the tenant is offline.
    pub fn members_of(&self, tenant: &Tenant) -> Vec<ConnectionHandle> {
        let ids: Vec<ConnectionId> = match self.tenant_index.get(tenant) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };

        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Snapshot of every connection across all tenants of one kind.
    pub fn members_of_type(&self, tenant_type: TenantType) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .filter(|entry| entry.value().tenant_type() == tenant_type)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn all_members(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Live connection count per tenant type; every type is present, even at zero.
    pub fn count_by_type(&self) -> BTreeMap<TenantType, usize> {
        let mut counts: BTreeMap<TenantType, usize> =
            TenantType::ALL.iter().map(|t| (*t, 0)).collect();

        for entry in self.connections.iter() {
            *counts.entry(entry.value().tenant_type()).or_default() += 1;
        }

        counts
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
