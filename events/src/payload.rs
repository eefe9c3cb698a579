//! Kind-specific payloads carried in an envelope's `data` field, and the
//! constructors that pair each payload with its event kind.

use crate::envelope::{EventEnvelope, EventKind};
use crate::{TenantId, TenantType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which CRUD change a product event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductChange {
    Created,
    Updated,
    Deleted,
}

impl ProductChange {
    fn kind(self) -> EventKind {
        match self {
            ProductChange::Created => EventKind::ProductCreated,
            ProductChange::Updated => EventKind::ProductUpdated,
            ProductChange::Deleted => EventKind::ProductDeleted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductChange::Created => "created",
            ProductChange::Updated => "updated",
            ProductChange::Deleted => "deleted",
        }
    }
}

/// Outcome of an administrator reviewing a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approved,
    Rejected,
}

impl ModerationDecision {
    fn kind(self) -> EventKind {
        match self {
            ModerationDecision::Approved => EventKind::ProductApproved,
            ModerationDecision::Rejected => EventKind::ProductRejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModerationDecision::Approved => "approved",
            ModerationDecision::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Completed,
    Failed,
}

impl TransactionOutcome {
    fn kind(self) -> EventKind {
        match self {
            TransactionOutcome::Completed => EventKind::TransactionCompleted,
            TransactionOutcome::Failed => EventKind::TransactionFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStage {
    Created,
    Completed,
}

impl OrderStage {
    fn kind(self) -> EventKind {
        match self {
            OrderStage::Created => EventKind::OrderCreated,
            OrderStage::Completed => EventKind::OrderCompleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEventData {
    pub product_id: TenantId,
    pub product_name: String,
    pub shop_id: TenantId,
    /// `created`, `updated` or `deleted`; filled in from the [`ProductChange`].
    pub action: String,
    pub moderation_status: Option<String>,
    pub is_active: Option<bool>,
    /// Full product record for clients that render without refetching.
    pub product: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductModerationEventData {
    pub product_id: TenantId,
    pub product_name: String,
    pub shop_id: TenantId,
    pub shop_name: Option<String>,
    /// `approved` or `rejected`; filled in from the [`ModerationDecision`].
    pub moderation_status: String,
    pub moderation_notes: Option<String>,
    pub admin_id: TenantId,
    pub approval_fee: Option<f64>,
    pub product: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdateEventData {
    /// Owner of the balance; only users and shops hold one.
    pub entity_type: TenantType,
    pub entity_id: TenantId,
    pub old_balance: f64,
    pub new_balance: f64,
    pub change_amount: f64,
    pub transaction_id: Option<TenantId>,
    pub reason: Option<String>,
}

impl BalanceUpdateEventData {
    pub fn new(
        entity_type: TenantType,
        entity_id: TenantId,
        old_balance: f64,
        new_balance: f64,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            old_balance,
            new_balance,
            change_amount: new_balance - old_balance,
            transaction_id: None,
            reason: None,
        }
    }

    pub fn with_transaction(mut self, transaction_id: TenantId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEventData {
    pub transaction_id: TenantId,
    pub transaction_type: String,
    pub amount: f64,
    pub status: String,
    pub user_id: Option<TenantId>,
    pub shop_id: Option<TenantId>,
    pub description: Option<String>,
    pub extra_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventData {
    pub order_id: TenantId,
    /// `purchase` or `rental`.
    pub order_type: String,
    pub status: String,
    pub user_id: TenantId,
    pub shop_id: TenantId,
    pub product_id: TenantId,
    pub product_name: String,
    pub amount: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEventData {
    pub review_id: TenantId,
    pub product_id: TenantId,
    pub product_name: String,
    pub shop_id: TenantId,
    pub user_id: TenantId,
    pub user_name: String,
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdateEventData {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub description: Option<String>,
    /// Administrator who made the change.
    pub updated_by: TenantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationQueueEventData {
    pub pending_count: u64,
    /// `added` or `processed`.
    pub action: String,
    pub product_id: Option<TenantId>,
}

impl EventEnvelope {
    pub fn product(change: ProductChange, mut data: ProductEventData) -> Self {
        data.action = change.as_str().to_string();
        Self::from_payload(change.kind(), &data)
    }

    pub fn product_moderation(
        decision: ModerationDecision,
        mut data: ProductModerationEventData,
    ) -> Self {
        data.moderation_status = decision.as_str().to_string();
        Self::from_payload(decision.kind(), &data)
    }

    pub fn balance_updated(data: &BalanceUpdateEventData) -> Self {
        Self::from_payload(EventKind::BalanceUpdated, data)
    }

    pub fn transaction(outcome: TransactionOutcome, data: &TransactionEventData) -> Self {
        Self::from_payload(outcome.kind(), data)
    }

    pub fn order(stage: OrderStage, data: &OrderEventData) -> Self {
        Self::from_payload(stage.kind(), data)
    }

    pub fn review_created(data: &ReviewEventData) -> Self {
        Self::from_payload(EventKind::ReviewCreated, data)
    }

    pub fn settings_updated(data: &SettingsUpdateEventData) -> Self {
        Self::from_payload(EventKind::SettingsUpdated, data)
    }

    pub fn moderation_queue_updated(data: &ModerationQueueEventData) -> Self {
        Self::from_payload(EventKind::ModerationQueueUpdated, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_data() -> ProductEventData {
        ProductEventData {
            product_id: 42,
            product_name: "Linen blazer".to_string(),
            shop_id: 7,
            action: String::new(),
            moderation_status: Some("pending".to_string()),
            is_active: Some(true),
            product: None,
        }
    }

    #[test]
    fn test_balance_update_computes_change_amount() {
        let data = BalanceUpdateEventData::new(TenantType::User, 5, 10.0, 35.5)
            .with_transaction(88)
            .with_reason("top-up");

        assert_eq!(data.change_amount, 25.5);

        let envelope = EventEnvelope::balance_updated(&data);
        assert_eq!(envelope.event(), EventKind::BalanceUpdated);
        assert_eq!(envelope.data()["entity_type"], "user");
        assert_eq!(envelope.data()["change_amount"], 25.5);
        assert_eq!(envelope.data()["transaction_id"], 88);
    }

    #[test]
    fn test_product_change_sets_action_and_kind() {
        let envelope = EventEnvelope::product(ProductChange::Deleted, product_data());

        assert_eq!(envelope.event(), EventKind::ProductDeleted);
        assert_eq!(envelope.data()["action"], "deleted");
        assert_eq!(envelope.data()["product_id"], 42);
    }

    #[test]
    fn test_moderation_decision_sets_status_and_kind() {
        let data = ProductModerationEventData {
            product_id: 42,
            product_name: "Linen blazer".to_string(),
            shop_id: 7,
            shop_name: None,
            moderation_status: String::new(),
            moderation_notes: Some("blurry photos".to_string()),
            admin_id: 1,
            approval_fee: None,
            product: None,
        };

        let envelope = EventEnvelope::product_moderation(ModerationDecision::Rejected, data);

        assert_eq!(envelope.event(), EventKind::ProductRejected);
        assert_eq!(envelope.data()["moderation_status"], "rejected");
        assert_eq!(envelope.data()["moderation_notes"], "blurry photos");
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let data = ModerationQueueEventData {
            pending_count: 3,
            action: "added".to_string(),
            product_id: None,
        };

        let envelope = EventEnvelope::moderation_queue_updated(&data);

        assert!(envelope.data()["product_id"].is_null());
        assert_eq!(envelope.data()["pending_count"], 3);
    }
}
