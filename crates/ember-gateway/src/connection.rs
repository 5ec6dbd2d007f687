use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use ember_types::events::{InboundFrame, ServerFrame};

use crate::registry::ChatRegistry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection for one match channel.
/// The JWT and match membership were already validated at the HTTP upgrade
/// layer, so this goes straight to session registration and the event loop.
pub async fn handle_connection(
    socket: WebSocket,
    registry: ChatRegistry,
    channel_id: Uuid,
    match_id: Uuid,
    participant_id: Uuid,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The actor pushes frames through this channel; a dedicated task below
    // relays them onto the socket in actor order.
    let (session_tx, mut session_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let session_id = match registry
        .connect(channel_id, match_id, participant_id, session_tx)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to register chat session on {}: {}", channel_id, e);
            return;
        }
    };

    info!("{} connected to chat channel {}", participant_id, channel_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward actor frames -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                frame = session_rx.recv() => {
                    let frame = match frame {
                        Some(frame) => frame,
                        None => break,
                    };
                    let text = serde_json::to_string(&frame).unwrap();
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if ws_sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read frames from the client.
    let registry_recv = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                    Ok(frame) => {
                        registry_recv
                            .frame(channel_id, match_id, session_id, frame)
                            .await;
                    }
                    Err(e) => {
                        // Malformed payloads are dropped, never broadcast.
                        warn!(
                            "{} bad chat frame on {}: {} -- raw: {}",
                            participant_id,
                            channel_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.disconnect(channel_id, match_id, session_id).await;
    info!("{} disconnected from chat channel {}", participant_id, channel_id);
}
