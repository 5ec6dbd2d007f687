use tokio::sync::{mpsc, oneshot};
use tracing::info;
use uuid::Uuid;

/// Operations on the waiting-room membership registry. Same single-writer
/// shape as the chat actor, one fixed logical key, entirely in-memory —
/// lobby membership is short-lived and loss on restart is only a UX blip.
enum LobbyCommand {
    Join {
        user_id: Uuid,
        preferences: serde_json::Value,
        reply: oneshot::Sender<usize>,
    },
    Leave {
        user_id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<usize>,
    },
}

#[derive(Clone)]
pub struct LobbyHandle {
    tx: mpsc::UnboundedSender<LobbyCommand>,
}

impl LobbyHandle {
    /// Insert or overwrite the member's entry. Re-joining updates the
    /// preferences but keeps the original queue position. Returns the
    /// 1-based position.
    pub async fn join(&self, user_id: Uuid, preferences: serde_json::Value) -> usize {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(LobbyCommand::Join {
            user_id,
            preferences,
            reply,
        });
        rx.await.unwrap_or(0)
    }

    /// Returns true if the member was actually waiting.
    pub async fn leave(&self, user_id: Uuid) -> bool {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(LobbyCommand::Leave { user_id, reply });
        rx.await.unwrap_or(false)
    }

    pub async fn status(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(LobbyCommand::Status { reply });
        rx.await.unwrap_or(0)
    }
}

struct Member {
    user_id: Uuid,
    preferences: serde_json::Value,
}

/// Spawn the lobby actor. Unlike chat actors it never retires — there is
/// exactly one and it is cheap to keep.
pub fn spawn_lobby() -> LobbyHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<LobbyCommand>();

    tokio::spawn(async move {
        // Join order; position is index + 1.
        let mut members: Vec<Member> = Vec::new();

        while let Some(cmd) = rx.recv().await {
            match cmd {
                LobbyCommand::Join {
                    user_id,
                    preferences,
                    reply,
                } => {
                    let position = match members.iter().position(|m| m.user_id == user_id) {
                        Some(idx) => {
                            members[idx].preferences = preferences;
                            idx + 1
                        }
                        None => {
                            members.push(Member {
                                user_id,
                                preferences,
                            });
                            members.len()
                        }
                    };
                    info!("Lobby join {} (position {})", user_id, position);
                    let _ = reply.send(position);
                }

                LobbyCommand::Leave { user_id, reply } => {
                    let before = members.len();
                    members.retain(|m| m.user_id != user_id);
                    let _ = reply.send(members.len() < before);
                }

                LobbyCommand::Status { reply } => {
                    let _ = reply.send(members.len());
                }
            }
        }
    });

    LobbyHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_leave_status() {
        let lobby = spawn_lobby();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(lobby.status().await, 0);
        assert_eq!(lobby.join(a, serde_json::json!({"mode": "romantic"})).await, 1);
        assert_eq!(lobby.join(b, serde_json::json!({})).await, 2);
        assert_eq!(lobby.status().await, 2);

        assert!(lobby.leave(a).await);
        assert!(!lobby.leave(a).await);
        assert_eq!(lobby.status().await, 1);
    }

    #[tokio::test]
    async fn rejoin_keeps_position_and_updates_preferences() {
        let lobby = spawn_lobby();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        lobby.join(a, serde_json::json!({"max_distance": 5})).await;
        lobby.join(b, serde_json::json!({})).await;

        // a re-joins with new preferences but stays first in line.
        assert_eq!(lobby.join(a, serde_json::json!({"max_distance": 10})).await, 1);
        assert_eq!(lobby.status().await, 2);
    }

    #[tokio::test]
    async fn positions_shift_after_leave() {
        let lobby = spawn_lobby();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        lobby.join(a, serde_json::json!({})).await;
        lobby.join(b, serde_json::json!({})).await;
        lobby.leave(a).await;

        assert_eq!(lobby.join(b, serde_json::json!({})).await, 1);
    }
}
