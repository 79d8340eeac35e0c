use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use scrawl_types::events::ClientEvent;

use crate::auth::{self, AuthError};
use crate::dispatcher::{Dispatcher, Disposition};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How much of a rejected payload makes it into the log.
const MAX_LOGGED_EVENT_BYTES: usize = 200;

/// Truncate to at most `MAX_LOGGED_EVENT_BYTES`, backing off to the
/// nearest char boundary so a multibyte character straddling the cut
/// cannot panic the recv task.
fn truncate_for_log(text: &str) -> &str {
    let mut cut = text.len().min(MAX_LOGGED_EVENT_BYTES);
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

/// Handle a freshly upgraded WebSocket. The bearer token travels in the
/// `token` cookie of the upgrade request; an absent or invalid token
/// closes the channel with a policy code before anything is registered.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    cookie_header: Option<String>,
    jwt_secret: String,
) {
    let token = cookie_header.as_deref().and_then(auth::token_from_cookies);

    let user_id = match token {
        None => {
            warn!("handshake rejected: {}", AuthError::MissingToken);
            reject(socket, "Unauthorized: No token provided").await;
            return;
        }
        Some(token) => match auth::validate_token(&token, &jwt_secret) {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!("handshake rejected: {e}");
                reject(socket, "Unauthorized: Invalid token").await;
                return;
            }
        },
    };

    info!("user {user_id} connected");
    run_connection_loop(socket, dispatcher, user_id).await;
}

async fn reject(mut socket: WebSocket, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: reason.into(),
        })))
        .await;
}

async fn run_connection_loop(socket: WebSocket, dispatcher: Dispatcher, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Register with an empty room set; the send task drains the outbound
    // channel into the socket.
    let (conn_id, mut outbound_rx) = dispatcher.registry().register(user_id.clone()).await;

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = outbound_rx.recv() => {
                    let Some(outbound) = result else { break };
                    let text = match serde_json::to_string(&outbound) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("failed to serialize outbound event: {e}");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {missed_heartbeats} pongs), dropping connection");
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let dispatcher_recv = dispatcher.clone();
    let user_id_recv = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let disposition =
                                dispatcher_recv.dispatch(conn_id, &user_id_recv, event).await;
                            if disposition == Disposition::Close {
                                // Protocol violation; drop the socket with
                                // no error payload.
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed events are dropped, the connection
                            // stays open.
                            warn!(
                                "{} bad event: {} -- raw: {}",
                                user_id_recv,
                                e,
                                truncate_for_log(&text)
                            );
                        }
                    }
                }
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

    // Deregistration only; durable room membership is deliberately left
    // untouched on disconnect (explicit leave_room is the only durable
    // leave).
    dispatcher.registry().deregister(conn_id).await;
    info!("user {user_id} disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payloads_are_logged_whole() {
        assert_eq!(truncate_for_log("tiny"), "tiny");
        assert_eq!(truncate_for_log(""), "");
    }

    #[test]
    fn truncation_backs_off_to_a_char_boundary() {
        // 'é' is 2 bytes and straddles the 200-byte cut
        let payload = format!("{}é and more garbage", "x".repeat(199));
        let logged = truncate_for_log(&payload);
        assert_eq!(logged.len(), 199);
        assert!(logged.chars().all(|c| c == 'x'));
    }

    #[test]
    fn truncation_keeps_a_character_ending_on_the_cut() {
        // 197 ascii bytes + '語' (3 bytes) ends exactly at byte 200
        let payload = format!("{}語tail", "x".repeat(197));
        let logged = truncate_for_log(&payload);
        assert_eq!(logged.len(), 200);
        assert!(logged.ends_with('語'));
    }
}
