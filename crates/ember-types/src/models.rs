use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discovery mode. Candidates never cross modes — a romantic feed only
/// contains romantic profiles and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Romantic,
    Platonic,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Romantic => "romantic",
            Mode::Platonic => "platonic",
        }
    }

    pub fn parse(s: &str) -> Option<Mode> {
        match s {
            "romantic" => Some(Mode::Romantic),
            "platonic" => Some(Mode::Platonic),
            _ => None,
        }
    }
}

/// A directional swipe decision. Last decision wins — re-swiping replaces
/// the prior row, it never appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Like,
    Pass,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Like => "like",
            Decision::Pass => "pass",
        }
    }

    pub fn parse(s: &str) -> Option<Decision> {
        match s {
            "like" => Some(Decision::Like),
            "pass" => Some(Decision::Pass),
            _ => None,
        }
    }
}

/// Chat message payload kind. Closed set — anything else is rejected at the
/// connection layer before it reaches an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Gift,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Gift => "gift",
            MessageKind::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<MessageKind> {
        match s {
            "text" => Some(MessageKind::Text),
            "gift" => Some(MessageKind::Gift),
            "image" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

/// A user profile as the core reads it from the shared store. Owned by the
/// profile collaborator; the only field the core writes back is the position
/// (and the cell derived from it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub age: u8,
    pub mode: Mode,
    pub goals: Vec<String>,
    pub interests: Vec<String>,
    pub drinks: bool,
    pub smokes: bool,
    pub bio: String,
    pub lat: f64,
    pub lon: f64,
    /// Spatial cell derived from (lat, lon). Invariant: recomputed on every
    /// position update, never stale relative to the stored coordinates.
    pub cell: String,
}

/// A chat message as served by `history` and broadcast to live sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}
