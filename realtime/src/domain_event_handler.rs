use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by routing their envelopes to live connections.
///
/// The business layer determines who should be notified and lists the
/// audiences on the event. This handler resolves their union and sends one
/// copy to each connection reached; it never fails.
pub struct RealtimeEventHandler {
    manager: Arc<Manager>,
}

impl RealtimeEventHandler {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for RealtimeEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        let envelope = &event.envelope;
        let delivery = self.manager.send_to_audiences(envelope, &event.audiences);

        debug!(
            "Routed {} to {} audience(s), {} delivery(ies)",
            envelope.event(),
            event.audiences.len(),
            delivery.delivered
        );
    }
}
