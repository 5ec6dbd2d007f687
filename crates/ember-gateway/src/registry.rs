use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use ember_db::Database;
use ember_types::events::InboundFrame;
use ember_types::models::ChatMessage;

use crate::actor::{ChatActor, ChatCommand, SessionSender};

/// Address of a live chat actor instance.
#[derive(Clone)]
pub struct ChatHandle {
    tx: mpsc::UnboundedSender<ChatCommand>,
    instance_id: Uuid,
}

impl ChatHandle {
    pub(crate) fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

/// Routing layer: one chat actor per channel id, spawned on first reference
/// and re-spawned from cold after retirement. Operations against different
/// channels run fully in parallel; operations against one channel serialize
/// inside its actor.
#[derive(Clone)]
pub struct ChatRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    actors: Arc<RwLock<HashMap<Uuid, ChatHandle>>>,
    db: Arc<Database>,
    idle_timeout: Duration,
}

impl ChatRegistry {
    pub fn new(db: Arc<Database>, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                actors: Arc::new(RwLock::new(HashMap::new())),
                db,
                idle_timeout,
            }),
        }
    }

    /// Register a live session. Returns the session id to use for frames and
    /// disconnect.
    pub async fn connect(
        &self,
        channel_id: Uuid,
        match_id: Uuid,
        participant_id: Uuid,
        sender: SessionSender,
    ) -> Result<Uuid> {
        let (reply, rx) = oneshot::channel();
        self.send(
            channel_id,
            match_id,
            ChatCommand::Connect {
                participant_id,
                sender,
                reply,
            },
        )
        .await;
        rx.await.context("chat actor dropped connect reply")
    }

    pub async fn frame(
        &self,
        channel_id: Uuid,
        match_id: Uuid,
        session_id: Uuid,
        frame: InboundFrame,
    ) {
        self.send(channel_id, match_id, ChatCommand::Frame { session_id, frame })
            .await;
    }

    pub async fn disconnect(&self, channel_id: Uuid, match_id: Uuid, session_id: Uuid) {
        self.send(channel_id, match_id, ChatCommand::Disconnect { session_id })
            .await;
    }

    /// Most recent `limit` messages, oldest first. Works with zero live
    /// sessions — a cold channel is spawned just to serve the read.
    pub async fn history(
        &self,
        channel_id: Uuid,
        match_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let (reply, rx) = oneshot::channel();
        self.send(channel_id, match_id, ChatCommand::History { limit, reply })
            .await;
        rx.await.context("chat actor dropped history reply")?
    }

    /// Whether a live actor instance currently exists for the channel.
    pub async fn is_active(&self, channel_id: Uuid) -> bool {
        self.inner
            .actors
            .read()
            .await
            .get(&channel_id)
            .is_some_and(|h| !h.tx.is_closed())
    }

    /// Deliver a command, re-spawning the actor if the previous instance
    /// retired between lookup and send.
    async fn send(&self, channel_id: Uuid, match_id: Uuid, cmd: ChatCommand) {
        let mut cmd = cmd;
        loop {
            let handle = self.get_or_spawn(channel_id, match_id).await;
            match handle.tx.send(cmd) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => cmd = returned,
            }
        }
    }

    async fn get_or_spawn(&self, channel_id: Uuid, match_id: Uuid) -> ChatHandle {
        {
            let actors = self.inner.actors.read().await;
            if let Some(handle) = actors.get(&channel_id) {
                if !handle.tx.is_closed() {
                    return handle.clone();
                }
            }
        }

        let mut actors = self.inner.actors.write().await;
        // Double-check under the write lock — another request may have
        // spawned while we waited.
        if let Some(handle) = actors.get(&channel_id) {
            if !handle.tx.is_closed() {
                return handle.clone();
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let instance_id = Uuid::new_v4();
        let handle = ChatHandle { tx, instance_id };
        actors.insert(channel_id, handle.clone());

        let actor = ChatActor::new(
            channel_id,
            match_id,
            instance_id,
            self.inner.db.clone(),
            self.inner.idle_timeout,
        );
        tokio::spawn(actor.run(rx, self.inner.actors.clone()));

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::models::{Decision, MessageKind, Mode, UserProfile};
    use ember_db::queries::SwipeOutcome;
    use ember_types::events::ServerFrame;

    fn seeded_match(db: &Database) -> (Uuid, Uuid, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for id in [a, b] {
            db.insert_profile(&UserProfile {
                id,
                display_name: "p".into(),
                age: 30,
                mode: Mode::Romantic,
                goals: vec![],
                interests: vec![],
                drinks: false,
                smokes: false,
                bio: String::new(),
                lat: 40.0,
                lon: -73.9,
                cell: "c2:4000:-7390".into(),
            })
            .unwrap();
        }
        db.record_swipe(a, b, Decision::Like).unwrap();
        let SwipeOutcome::Matched { row, .. } = db.record_swipe(b, a, Decision::Like).unwrap()
        else {
            panic!("expected match");
        };
        (a, b, row.id.parse().unwrap(), row.channel_id.parse().unwrap())
    }

    fn frame(text: &str) -> InboundFrame {
        InboundFrame {
            text: text.into(),
            kind: MessageKind::Text,
            timestamp: None,
        }
    }

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<ServerFrame>) -> ServerFrame {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("session channel closed")
    }

    #[tokio::test]
    async fn broadcast_reaches_all_sessions_in_order() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = ChatRegistry::new(db, Duration::from_secs(600));
        let (user_a, user_b, match_id, channel) = seeded_match(&registry.inner.db);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let session_a = registry.connect(channel, match_id, user_a, tx_a).await.unwrap();
        let _session_b = registry.connect(channel, match_id, user_b, tx_b).await.unwrap();

        // a sees connected twice (own join, b's join); b sees it once.
        assert!(matches!(next_message(&mut rx_a).await, ServerFrame::Connected { participants: 1 }));
        assert!(matches!(next_message(&mut rx_a).await, ServerFrame::Connected { participants: 2 }));
        assert!(matches!(next_message(&mut rx_b).await, ServerFrame::Connected { participants: 2 }));

        registry.frame(channel, match_id, session_a, frame("first")).await;
        registry.frame(channel, match_id, session_a, frame("second")).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let ServerFrame::Message { text, sender_id, .. } = next_message(rx).await else {
                panic!("expected message frame");
            };
            assert_eq!(text, "first");
            assert_eq!(sender_id, user_a);
            let ServerFrame::Message { text, .. } = next_message(rx).await else {
                panic!("expected message frame");
            };
            assert_eq!(text, "second");
        }
    }

    #[tokio::test]
    async fn history_round_trips_immediately_after_broadcast() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = ChatRegistry::new(db, Duration::from_secs(600));
        let (user_a, _, match_id, channel) = seeded_match(&registry.inner.db);

        // Fresh channel: history is empty, served from cold with no sessions.
        assert!(registry.history(channel, match_id, 50).await.unwrap().is_empty());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.connect(channel, match_id, user_a, tx).await.unwrap();
        let _ = next_message(&mut rx).await; // connected

        registry.frame(channel, match_id, session, frame("hello")).await;
        let _ = next_message(&mut rx).await; // the broadcast copy

        // The actor processed Frame before History, so the fast log already
        // has the message even if the durable write is still in flight.
        let history = registry.history(channel, match_id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "hello");
        assert_eq!(history[0].sender_id, user_a);
    }

    #[tokio::test]
    async fn disconnect_broadcasts_user_left() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = ChatRegistry::new(db, Duration::from_secs(600));
        let (user_a, user_b, match_id, channel) = seeded_match(&registry.inner.db);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let session_a = registry.connect(channel, match_id, user_a, tx_a).await.unwrap();
        let _session_b = registry.connect(channel, match_id, user_b, tx_b).await.unwrap();
        let _ = next_message(&mut rx_a).await;
        let _ = next_message(&mut rx_a).await;
        let _ = next_message(&mut rx_b).await;

        registry.disconnect(channel, match_id, session_a).await;
        assert!(matches!(
            next_message(&mut rx_b).await,
            ServerFrame::UserLeft { participants: 1 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_actor_retires_and_respawns_with_history() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = ChatRegistry::new(db, Duration::from_secs(120));
        let (user_a, _, match_id, channel) = seeded_match(&registry.inner.db);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = registry.connect(channel, match_id, user_a, tx).await.unwrap();
        let _ = next_message(&mut rx).await;
        registry.frame(channel, match_id, session, frame("keep this")).await;
        let _ = next_message(&mut rx).await;
        registry.disconnect(channel, match_id, session).await;
        assert!(registry.is_active(channel).await);

        // Not yet past the idle threshold: the alarm re-arms.
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(registry.is_active(channel).await);

        // Past the threshold: the actor lapses.
        tokio::time::advance(Duration::from_secs(120)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!registry.is_active(channel).await);

        // A new reference recreates from cold: no sessions, history intact.
        let history = registry.history(channel, match_id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, "keep this");
        assert!(registry.is_active(channel).await);
    }

    #[tokio::test]
    async fn actors_for_different_channels_are_independent() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = ChatRegistry::new(db, Duration::from_secs(600));
        let (user_a, _, match_1, channel_1) = seeded_match(&registry.inner.db);
        let (user_c, _, match_2, channel_2) = seeded_match(&registry.inner.db);

        let (tx_1, mut rx_1) = mpsc::unbounded_channel();
        let (tx_2, mut rx_2) = mpsc::unbounded_channel();
        let session_1 = registry.connect(channel_1, match_1, user_a, tx_1).await.unwrap();
        let _session_2 = registry.connect(channel_2, match_2, user_c, tx_2).await.unwrap();
        let _ = next_message(&mut rx_1).await;
        let _ = next_message(&mut rx_2).await;

        registry.frame(channel_1, match_1, session_1, frame("only in channel 1")).await;
        let _ = next_message(&mut rx_1).await;

        assert_eq!(registry.history(channel_1, match_1, 10).await.unwrap().len(), 1);
        assert!(registry.history(channel_2, match_2, 10).await.unwrap().is_empty());
    }
}
