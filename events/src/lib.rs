//! Event system infrastructure for the marketplace backend.
//!
//! This crate provides the event system that decouples business logic from
//! real-time delivery.
//!
//! # Architecture
//!
//! - **EventEnvelope**: the immutable, kind-tagged notification sent to clients
//! - **DomainEvent**: an envelope plus the audiences that should receive it
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on other internal crates, avoiding circular
//! dependencies. Entity data is carried as serialized JSON values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod envelope;
pub mod payload;

pub use envelope::{EventEnvelope, EventKind};

/// Identifier of a user, shop or administrator, as issued by the persistence layer.
pub type TenantId = i64;

/// The three kinds of principal that hold real-time connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    User,
    Shop,
    Admin,
}

impl TenantType {
    pub const ALL: [TenantType; 3] = [TenantType::User, TenantType::Shop, TenantType::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::User => "user",
            TenantType::Shop => "shop",
            TenantType::Admin => "admin",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TenantTypeParseError;

impl FromStr for TenantType {
    type Err = TenantTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(TenantType::User),
            "shop" => Ok(TenantType::Shop),
            "admin" => Ok(TenantType::Admin),
            _ => Err(TenantTypeParseError),
        }
    }
}

impl fmt::Display for TenantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who a domain event should reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every live connection of one tenant.
    Client {
        tenant_type: TenantType,
        tenant_id: TenantId,
    },
    /// Every live connection of every tenant of one kind.
    TenantType(TenantType),
    /// Every live connection.
    Everyone,
    /// Every connection subscribed to a room.
    Room(String),
}

/// A business-level change paired with the audiences to notify.
///
/// The business layer decides who is notified; handlers only route.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub envelope: EventEnvelope,
    pub audiences: Vec<Audience>,
}

impl DomainEvent {
    pub fn new(envelope: EventEnvelope) -> Self {
        Self {
            envelope,
            audiences: Vec::new(),
        }
    }

    pub fn notify_client(mut self, tenant_type: TenantType, tenant_id: TenantId) -> Self {
        self.audiences.push(Audience::Client {
            tenant_type,
            tenant_id,
        });
        self
    }

    pub fn notify_tenant_type(mut self, tenant_type: TenantType) -> Self {
        self.audiences.push(Audience::TenantType(tenant_type));
        self
    }

    pub fn notify_everyone(mut self) -> Self {
        self.audiences.push(Audience::Everyone);
        self
    }

    pub fn notify_room(mut self, room: impl Into<String>) -> Self {
        self.audiences.push(Audience::Room(room.into()));
        self
    }
}

/// Room name clients subscribe to for live updates about one product.
pub fn product_room(product_id: TenantId) -> String {
    format!("product:{product_id}")
}

/// Notification policies used by the marketplace's business logic.
impl DomainEvent {
    /// Product CRUD changes reach every shop and administrator, plus anyone
    /// watching the product's room.
    pub fn product_changed(
        change: payload::ProductChange,
        data: payload::ProductEventData,
    ) -> Self {
        let room = product_room(data.product_id);
        Self::new(EventEnvelope::product(change, data))
            .notify_tenant_type(TenantType::Shop)
            .notify_tenant_type(TenantType::Admin)
            .notify_room(room)
    }

    /// The owning shop always learns the decision; approved products are
    /// also announced to every user.
    pub fn product_moderated(
        decision: payload::ModerationDecision,
        data: payload::ProductModerationEventData,
    ) -> Self {
        let shop_id = data.shop_id;
        let room = product_room(data.product_id);
        let event = Self::new(EventEnvelope::product_moderation(decision, data))
            .notify_client(TenantType::Shop, shop_id)
            .notify_room(room);
        match decision {
            payload::ModerationDecision::Approved => event.notify_tenant_type(TenantType::User),
            payload::ModerationDecision::Rejected => event,
        }
    }

    pub fn balance_updated(data: &payload::BalanceUpdateEventData) -> Self {
        Self::new(EventEnvelope::balance_updated(data))
            .notify_client(data.entity_type, data.entity_id)
            .notify_tenant_type(TenantType::Admin)
    }

    pub fn transaction(
        outcome: payload::TransactionOutcome,
        data: &payload::TransactionEventData,
    ) -> Self {
        let mut event = Self::new(EventEnvelope::transaction(outcome, data));
        if let Some(user_id) = data.user_id {
            event = event.notify_client(TenantType::User, user_id);
        }
        if let Some(shop_id) = data.shop_id {
            event = event.notify_client(TenantType::Shop, shop_id);
        }
        event.notify_tenant_type(TenantType::Admin)
    }

    pub fn order(stage: payload::OrderStage, data: &payload::OrderEventData) -> Self {
        Self::new(EventEnvelope::order(stage, data))
            .notify_client(TenantType::User, data.user_id)
            .notify_client(TenantType::Shop, data.shop_id)
    }

    pub fn review_created(data: &payload::ReviewEventData) -> Self {
        Self::new(EventEnvelope::review_created(data))
            .notify_client(TenantType::Shop, data.shop_id)
            .notify_room(product_room(data.product_id))
    }

    pub fn settings_updated(data: &payload::SettingsUpdateEventData) -> Self {
        Self::new(EventEnvelope::settings_updated(data)).notify_everyone()
    }

    pub fn moderation_queue_updated(data: &payload::ModerationQueueEventData) -> Self {
        Self::new(EventEnvelope::moderation_queue_updated(data)).notify_tenant_type(TenantType::Admin)
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
