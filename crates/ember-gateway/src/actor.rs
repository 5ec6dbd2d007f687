use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use ember_db::Database;
use ember_types::events::{InboundFrame, ServerFrame};
use ember_types::models::ChatMessage;

use crate::registry::ChatHandle;

/// How often the actor wakes to check for idleness. The wake-up re-arms
/// itself whenever retirement conditions are not met.
const ALARM_PERIOD: Duration = Duration::from_secs(60);

/// Channel a live session's frames are pushed through. Each WebSocket
/// connection owns the receiving end.
pub type SessionSender = mpsc::UnboundedSender<ServerFrame>;

/// Operations on one chat actor. All of them funnel through a single mpsc
/// channel, so the actor processes them strictly one at a time — the
/// broadcast-ordering guarantee falls out of that, with no locking.
pub enum ChatCommand {
    Connect {
        participant_id: Uuid,
        sender: SessionSender,
        reply: oneshot::Sender<Uuid>,
    },
    Frame {
        session_id: Uuid,
        frame: InboundFrame,
    },
    Disconnect {
        session_id: Uuid,
    },
    History {
        limit: u32,
        reply: oneshot::Sender<anyhow::Result<Vec<ChatMessage>>>,
    },
}

struct Session {
    participant_id: Uuid,
    sender: SessionSender,
}

/// One instance per chat channel. Holds the live session set and last-activity
/// time privately; persistent state lives in the fast per-channel log.
pub(crate) struct ChatActor {
    channel_id: Uuid,
    match_id: Uuid,
    instance_id: Uuid,
    db: Arc<Database>,
    idle_timeout: Duration,
    sessions: HashMap<Uuid, Session>,
    last_activity: Instant,
}

impl ChatActor {
    pub(crate) fn new(
        channel_id: Uuid,
        match_id: Uuid,
        instance_id: Uuid,
        db: Arc<Database>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            channel_id,
            match_id,
            instance_id,
            db,
            idle_timeout,
            sessions: HashMap::new(),
            last_activity: Instant::now(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<ChatCommand>,
        actors: Arc<RwLock<HashMap<Uuid, ChatHandle>>>,
    ) {
        info!("Chat actor {} started", self.channel_id);

        let mut alarm = tokio::time::interval(ALARM_PERIOD);
        alarm.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = alarm.tick() => {
                    if self.sessions.is_empty()
                        && self.last_activity.elapsed() >= self.idle_timeout
                    {
                        info!("Chat actor {} idle, retiring", self.channel_id);
                        break;
                    }
                }
            }
        }

        // Deregister, but only if this instance still owns the slot — a newer
        // instance may have been spawned for the same channel in the meantime.
        let mut actors = actors.write().await;
        if actors
            .get(&self.channel_id)
            .is_some_and(|h| h.instance_id() == self.instance_id)
        {
            actors.remove(&self.channel_id);
        }
    }

    async fn handle(&mut self, cmd: ChatCommand) {
        match cmd {
            ChatCommand::Connect {
                participant_id,
                sender,
                reply,
            } => {
                let session_id = Uuid::new_v4();
                self.sessions.insert(
                    session_id,
                    Session {
                        participant_id,
                        sender,
                    },
                );
                self.last_activity = Instant::now();
                let _ = reply.send(session_id);

                self.broadcast(ServerFrame::Connected {
                    participants: self.sessions.len(),
                });
            }

            ChatCommand::Frame { session_id, frame } => {
                let Some(session) = self.sessions.get(&session_id) else {
                    warn!(
                        "Frame from unknown session {} on channel {}, dropped",
                        session_id, self.channel_id
                    );
                    return;
                };

                let message = ChatMessage {
                    id: Uuid::new_v4(),
                    channel_id: self.channel_id,
                    sender_id: session.participant_id,
                    body: frame.text,
                    kind: frame.kind,
                    created_at: Utc::now(),
                };

                // Broadcast first: live delivery order is the actor's
                // processing order, independent of storage latency.
                self.broadcast(ServerFrame::Message {
                    id: message.id,
                    sender_id: message.sender_id,
                    text: message.body.clone(),
                    kind: message.kind,
                    timestamp: message.created_at,
                });
                self.last_activity = Instant::now();

                // Fast log is authoritative for history — a failure here is
                // an error, not a shrug.
                let db = self.db.clone();
                let fast_copy = message.clone();
                let fast_write =
                    tokio::task::spawn_blocking(move || db.append_chat_log(&fast_copy)).await;
                match fast_write {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(
                        "Fast log write failed for channel {}: {}",
                        self.channel_id, e
                    ),
                    Err(e) => error!("Fast log task panicked: {}", e),
                }

                // Durable cross-channel copy is best-effort: logged, swallowed.
                let db = self.db.clone();
                let match_id = self.match_id;
                tokio::spawn(async move {
                    let result =
                        tokio::task::spawn_blocking(move || db.insert_durable_message(match_id, &message))
                            .await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("Durable message write failed: {}", e),
                        Err(e) => warn!("Durable message task panicked: {}", e),
                    }
                });
            }

            ChatCommand::Disconnect { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    self.last_activity = Instant::now();
                    self.broadcast(ServerFrame::UserLeft {
                        participants: self.sessions.len(),
                    });
                }
            }

            ChatCommand::History { limit, reply } => {
                let db = self.db.clone();
                let channel_id = self.channel_id;
                let result =
                    tokio::task::spawn_blocking(move || db.chat_history(channel_id, limit)).await;
                let _ = reply.send(match result {
                    Ok(r) => r,
                    Err(e) => Err(anyhow::anyhow!("history task panicked: {}", e)),
                });
            }
        }
    }

    fn broadcast(&self, frame: ServerFrame) {
        for session in self.sessions.values() {
            let _ = session.sender.send(frame.clone());
        }
    }
}
