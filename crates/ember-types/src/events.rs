use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageKind;

/// A chat frame sent FROM a client TO its match's actor.
///
/// The variant set is closed on purpose: anything that does not parse into
/// this shape is dropped at the connection layer with a logged warning and
/// never reaches the actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundFrame {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Client-side send time. Informational only — the actor stamps its own
    /// server time on the broadcast copy.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Frames sent FROM the server TO every live session of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Emitted immediately after a session registers, to all live sessions.
    Connected { participants: usize },

    /// A message accepted by the actor, in actor processing order.
    Message {
        id: Uuid,
        sender_id: Uuid,
        text: String,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    },

    /// A session deregistered.
    UserLeft { participants: usize },
}
