use crate::connection::ConnectionId;
use dashmap::DashMap;
use std::collections::HashSet;

/// Ad-hoc topic subscriptions (e.g. `product:42`), independent of tenant
/// classification. A connection may be in any number of rooms; rooms with no
/// members are dropped, so an empty room does not exist.
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Returns true if the connection was not already a member.
    pub fn insert(&self, room: &str, connection_id: ConnectionId) -> bool {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id)
    }

    /// Leave one room. Leaving a room the connection is not in is a no-op.
    pub fn remove(&self, room: &str, connection_id: &ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.remove(connection_id),
            None => false,
        };
        self.rooms.remove_if(room, |_, members| members.is_empty());
        removed
    }

    /// Leave every room. Sweeps all rooms rather than tracking per-connection
    /// membership.
    pub fn remove_everywhere(&self, connection_id: &ConnectionId) {
        self.rooms.retain(|_, members| {
            members.remove(connection_id);
            !members.is_empty()
        });
    }

    pub fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Distinct connections across all rooms.
    pub fn all_members(&self) -> HashSet<ConnectionId> {
        self.rooms
            .iter()
            .flat_map(|entry| entry.value().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
