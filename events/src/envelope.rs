//! The unit of real-time notification delivered to connected clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of event kinds. The wire name is dot-namespaced by resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "product.created")]
    ProductCreated,
    #[serde(rename = "product.updated")]
    ProductUpdated,
    #[serde(rename = "product.deleted")]
    ProductDeleted,
    #[serde(rename = "product.approved")]
    ProductApproved,
    #[serde(rename = "product.rejected")]
    ProductRejected,
    #[serde(rename = "balance.updated")]
    BalanceUpdated,
    #[serde(rename = "transaction.completed")]
    TransactionCompleted,
    #[serde(rename = "transaction.failed")]
    TransactionFailed,
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.completed")]
    OrderCompleted,
    #[serde(rename = "review.created")]
    ReviewCreated,
    #[serde(rename = "settings.updated")]
    SettingsUpdated,
    #[serde(rename = "moderation.queue_updated")]
    ModerationQueueUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::ProductCreated,
        EventKind::ProductUpdated,
        EventKind::ProductDeleted,
        EventKind::ProductApproved,
        EventKind::ProductRejected,
        EventKind::BalanceUpdated,
        EventKind::TransactionCompleted,
        EventKind::TransactionFailed,
        EventKind::OrderCreated,
        EventKind::OrderCompleted,
        EventKind::ReviewCreated,
        EventKind::SettingsUpdated,
        EventKind::ModerationQueueUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProductCreated => "product.created",
            EventKind::ProductUpdated => "product.updated",
            EventKind::ProductDeleted => "product.deleted",
            EventKind::ProductApproved => "product.approved",
            EventKind::ProductRejected => "product.rejected",
            EventKind::BalanceUpdated => "balance.updated",
            EventKind::TransactionCompleted => "transaction.completed",
            EventKind::TransactionFailed => "transaction.failed",
            EventKind::OrderCreated => "order.created",
            EventKind::OrderCompleted => "order.completed",
            EventKind::ReviewCreated => "review.created",
            EventKind::SettingsUpdated => "settings.updated",
            EventKind::ModerationQueueUpdated => "moderation.queue_updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable, kind-tagged notification.
///
/// Serializes as `{"event": "<kind>", "timestamp": "<ISO8601>", "data": {...}}`.
/// Envelopes carry no sequence number or dedup key; two envelopes with the
/// same content are indistinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event: EventKind,
    timestamp: DateTime<Utc>,
    data: Value,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn new(event: EventKind, data: Value) -> Self {
        Self::with_timestamp(event, Utc::now(), data)
    }

    pub fn with_timestamp(event: EventKind, timestamp: DateTime<Utc>, data: Value) -> Self {
        Self {
            event,
            timestamp,
            data,
        }
    }

    pub(crate) fn from_payload<T: Serialize>(event: EventKind, payload: &T) -> Self {
        // Payload structs only hold string-keyed data, so this cannot fail.
        let data = serde_json::to_value(payload).unwrap_or_default();
        Self::new(event, data)
    }

    pub fn event(&self) -> EventKind {
        self.event
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_kind_wire_names_match_as_str() {
        for kind in EventKind::ALL {
            let serialized = serde_json::to_value(kind).unwrap();
            assert_eq!(serialized, Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_moderation_queue_kind_uses_underscore_suffix() {
        assert_eq!(
            EventKind::ModerationQueueUpdated.to_string(),
            "moderation.queue_updated"
        );
    }

    #[test]
    fn test_envelope_serializes_to_wire_shape() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let envelope = EventEnvelope::with_timestamp(
            EventKind::BalanceUpdated,
            timestamp,
            json!({"entity_id": 5}),
        );

        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["event"], "balance.updated");
        assert_eq!(value["timestamp"], "2024-05-01T12:30:00Z");
        assert_eq!(value["data"], json!({"entity_id": 5}));
    }

    #[test]
    fn test_envelope_parses_back_from_client_side_json() {
        let raw = r#"{"event":"order.created","timestamp":"2024-05-01T12:30:00Z","data":{"order_id":9}}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).unwrap();

        assert_eq!(envelope.event(), EventKind::OrderCreated);
        assert_eq!(envelope.data()["order_id"], 9);
    }

    #[test]
    fn test_unknown_event_kind_is_rejected() {
        let raw = r#"{"event":"shop.created","timestamp":"2024-05-01T12:30:00Z","data":{}}"#;
        assert!(serde_json::from_str::<EventEnvelope>(raw).is_err());
    }
}
