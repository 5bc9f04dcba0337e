/* Sessione WebSocket: adattatore push del gateway più gli eventi di room.
    Una connessione si autentica una volta (query ?token= oppure primo frame
    "authenticate"), poi può iscriversi alle room e spingere messaggi.
    Su questo canale non esiste risposta di errore per un evento fallito:
    si logga e si scarta, la room continua per tutti gli altri.
*/
use axum::extract::ws::{Message as WsFrame, WebSocket};
use axum::extract::{Extension, Query, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use ateneo_core::error::Error;
use ateneo_core::models::User;
use ateneo_core::protocol::ws::WsMessage;
use ateneo_core::utils::new_id;

use crate::{auth, gateway, membership, AppState};

/// Handler per GET /ws
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let token = params.get("token").cloned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, token_q: Option<String>) {
    // Try authenticate via query param first
    let mut user_opt: Option<User> = None;

    if let Some(token) = token_q {
        match auth::verify_token(&state.pool, &token).await {
            Ok(user) => user_opt = Some(user),
            Err(e) => {
                tracing::debug!("ws query token rejected: {}", e);
            }
        }
    }

    // If not authenticated via query, wait for the first Authenticate frame
    if user_opt.is_none() {
        match socket.next().await {
            Some(Ok(WsFrame::Text(txt))) => match serde_json::from_str::<WsMessage>(&txt) {
                Ok(WsMessage::Authenticate(a)) => match auth::verify_token(&state.pool, &a.token).await {
                    Ok(user) => user_opt = Some(user),
                    Err(e) => {
                        tracing::debug!("ws authenticate frame rejected: {}", e);
                    }
                },
                _ => {
                    let err = WsMessage::Error(Error::new("authRequired", "expected authenticate message"));
                    let _ = socket
                        .send(WsFrame::Text(serde_json::to_string(&err).unwrap()))
                        .await;
                    return;
                }
            },
            Some(Ok(_)) => {
                let err = WsMessage::Error(Error::new("authRequired", "expected text authenticate message"));
                let _ = socket
                    .send(WsFrame::Text(serde_json::to_string(&err).unwrap()))
                    .await;
                return;
            }
            // connessione chiusa o errore di trasporto
            _ => return,
        }
    }

    let user = match user_opt {
        Some(u) => u,
        None => {
            let err = WsMessage::Error(Error::new("unauthenticated", "invalid token"));
            let _ = socket
                .send(WsFrame::Text(serde_json::to_string(&err).unwrap()))
                .await;
            return;
        }
    };

    // Ogni sessione ha il suo conn_id: un utente può avere più tab aperte
    // e ogni connessione vive e muore per conto suo.
    let conn_id = new_id();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    // Send AuthOk
    let auth_ok = WsMessage::AuthOk(user.clone());
    let _ = socket
        .send(WsFrame::Text(serde_json::to_string(&auth_ok).unwrap()))
        .await;

    // Split socket into sink/stream
    let (mut sender, mut receiver) = socket.split();

    // Task: forward messages from rx -> websocket
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(WsFrame::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!("ws session {} opened for user {}", conn_id, user.user_id);

    // Read loop: dispatch degli eventi del client
    while let Some(Ok(frame)) = receiver.next().await {
        match frame {
            WsFrame::Text(txt) => {
                let parsed = match serde_json::from_str::<WsMessage>(&txt) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!("ws session {}: unparsable frame dropped: {}", conn_id, e);
                        continue;
                    }
                };
                match parsed {
                    WsMessage::JoinGroup(j) => {
                        // la join alla room presuppone la membership persistita
                        match membership::is_member(&state.pool, &j.group_id, &user.user_id).await {
                            Ok(true) => {
                                state.rooms.join(&j.group_id, &conn_id, tx.clone());
                                tracing::info!(
                                    "conn {} joined room {} as user {}",
                                    conn_id, j.group_id, user.user_id
                                );
                            }
                            Ok(false) => {
                                tracing::warn!(
                                    "conn {}: join to {} refused, user {} is not a member",
                                    conn_id, j.group_id, user.user_id
                                );
                            }
                            Err(e) => {
                                tracing::warn!("conn {}: join to {} dropped: {}", conn_id, j.group_id, e);
                            }
                        }
                    }
                    WsMessage::LeaveGroup(l) => {
                        state.rooms.leave(&l.group_id, &conn_id);
                    }
                    WsMessage::SendMessage(sm) => {
                        // identità dell'evento: il token portato dall'evento
                        // stesso, verificato ad ogni invio
                        let sender_user = match auth::verify_token(&state.pool, &sm.token).await {
                            Ok(u) => u,
                            Err(e) => {
                                tracing::warn!("conn {}: sendMessage dropped, bad token: {}", conn_id, e);
                                continue;
                            }
                        };
                        if let Err(e) =
                            gateway::accept_message(&state, &sm.group_id, &sender_user, &sm.content).await
                        {
                            // nessun canale di risposta sul push: si scarta e si logga
                            tracing::warn!(
                                "conn {}: sendMessage to {} dropped: {}",
                                conn_id, sm.group_id, e
                            );
                        }
                    }
                    // frame server->client o authenticate ripetuto: ignorati
                    _ => {}
                }
            }
            WsFrame::Close(_) => break,
            _ => {}
        }
    }

    // cleanup: la disconnessione toglie la connessione da ogni room
    state.rooms.on_disconnect(&conn_id);
    drop(tx);
    let _ = forward_task.await;
    tracing::info!("ws session {} closed", conn_id);
}
