//! Wire frames exchanged over a real-time connection, other than event
//! envelopes which live in the `events` crate.

use crate::error::{Error, ErrorKind, TransportErrorKind};
use chrono::{DateTime, Utc};
use events::{TenantId, TenantType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Liveness probe; the timestamp is echoed back untouched.
    Ping {
        #[serde(default)]
        timestamp: Value,
    },
    SubscribeRoom { room: Option<String> },
    UnsubscribeRoom { room: Option<String> },
    /// Any other frame type. Ignored so newer clients keep working.
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    /// Text that is not JSON is a malformed frame; JSON that is not a known
    /// command is [`InboundFrame::Unknown`].
    pub fn parse(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(TransportErrorKind::MalformedFrame),
        })?;

        Ok(serde_json::from_value(value).unwrap_or(InboundFrame::Unknown))
    }
}

/// Replies to client commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Pong { timestamp: Value },
    Subscribed { room: String },
    Unsubscribed { room: String },
}

/// Sent once, to the new socket only, right after registration.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedFrame {
    event: &'static str,
    pub client_type: TenantType,
    pub client_id: TenantId,
    pub timestamp: DateTime<Utc>,
}

impl ConnectedFrame {
    pub fn new(client_type: TenantType, client_id: TenantId) -> Self {
        Self {
            event: "connected",
            client_type,
            client_id,
            timestamp: Utc::now(),
        }
    }
}
