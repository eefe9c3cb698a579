//! WebSocket infrastructure for real-time marketplace events.
//!
//! This crate keeps long-lived WebSocket sessions for users, shops and
//! administrators and fans domain events out to the right live subscribers.
//!
//! # Architecture
//!
//! - **Multiple connections per tenant**: a tenant (`user:5`, `shop:7`) may
//!   hold several sockets at once, one per device or tab.
//! - **Dual-index registry**: connections by id for cleanup, connection ids by
//!   tenant for routing, both in DashMap so dispatch and lifecycle tasks can
//!   run on any worker thread.
//! - **Rooms**: opt-in topic subscriptions (`product:42`) orthogonal to tenants.
//! - **Best-effort delivery**: at most once, no acknowledgement, no replay. A
//!   client that misses an event re-fetches state through the HTTP API.
//! - **Fault isolation**: a dead socket found during fan-out is skipped,
//!   counted and deregistered after the traversal; the caller never sees it.
//!
//! # Connection Flow
//!
//! 1. Client opens `/ws/{client_type}?token=...&platform=...`
//! 2. `Lifecycle::authenticate` verifies the token and checks the channel
//! 3. On success the socket is registered and receives a `connected` frame;
//!    on failure it is closed with a policy-violation code
//! 4. The serve loop answers `ping`, `subscribe_room` and `unsubscribe_room`
//! 5. On disconnect the connection is removed from its tenant bucket and
//!    from every room
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use events::{payload::BalanceUpdateEventData, EventEnvelope, TenantType};
//!
//! let data = BalanceUpdateEventData::new(TenantType::User, user_id, old, new);
//! app_state.realtime_manager.send_to_client(
//!     &EventEnvelope::balance_updated(&data),
//!     TenantType::User,
//!     user_id,
//! );
//! ```
//!
//! # Modules
//!
//! - `auth`: TokenVerifier seam, JWT verification and channel policy
//! - `connection`: ConnectionHandle and the tenant ConnectionRegistry
//! - `room`: RoomRegistry
//! - `manager`: dispatch operations, registration and stats
//! - `lifecycle`: per-socket authenticate/serve/deregister state machine
//! - `message`: client commands and control replies
//! - `domain_event_handler`: routes published domain events to the manager

pub mod auth;
pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod room;

pub use domain_event_handler::RealtimeEventHandler;
pub use lifecycle::Lifecycle;
pub use manager::Manager;
