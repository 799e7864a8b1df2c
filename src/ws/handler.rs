//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameHandle;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.game))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, game: GameHandle) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New UI connection");

    // Subscribe before the first snapshot so no event is missed in between
    let updates = game.subscribe();
    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send welcome");
        return;
    }
    if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::Snapshot(game.snapshot())).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send initial snapshot");
        return;
    }

    run_session(conn_id, game, ws_sink, ws_stream, updates).await;

    info!(conn_id = %conn_id, "UI connection closed");
}

/// Forward game updates and answer client requests until either side closes
async fn run_session(
    conn_id: Uuid,
    game: GameHandle,
    ws_sink: WsSink,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut updates: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Replies from the reader share the single sink with the broadcast writer
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<ServerMsg>(16);

    let writer_handle = tokio::spawn(async move {
        let mut ws_sink = ws_sink;
        loop {
            let msg = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
                update = updates.recv() => match update {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, lagged_count = n, "UI lagged, skipping {} updates", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "Update channel closed");
                        break;
                    }
                },
            };
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(conn_id = %conn_id, "Rate limited UI message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(&game, msg),
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        ServerMsg::Error {
                            code: "bad_message".to_string(),
                            message: e.to_string(),
                        }
                    }
                };
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

fn handle_client_msg(game: &GameHandle, msg: ClientMsg) -> ServerMsg {
    match msg {
        ClientMsg::RequestSnapshot => ServerMsg::Snapshot(game.snapshot()),
        ClientMsg::Ping { t } => ServerMsg::Pong { t },
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SharedFrameSource;
    use crate::game::RoundConfig;
    use crate::tracking::PositionTracker;
    use std::sync::Arc;

    fn game() -> GameHandle {
        GameHandle::new(
            RoundConfig::default(),
            Arc::new(PositionTracker::default()),
            Arc::new(SharedFrameSource::new(32, 32)),
        )
    }

    #[test]
    fn ping_echoes_client_time() {
        match handle_client_msg(&game(), ClientMsg::Ping { t: 42 }) {
            ServerMsg::Pong { t } => assert_eq!(t, 42),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn snapshot_request_returns_current_state() {
        let game = game();
        game.add_player(Uuid::new_v4(), "a".into(), crate::vision::Rgb::new(200, 20, 20))
            .unwrap();
        match handle_client_msg(&game, ClientMsg::RequestSnapshot) {
            ServerMsg::Snapshot(s) => assert_eq!(s.players.len(), 1),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn client_messages_parse_from_json() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping","t":7}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ping { t: 7 }));
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"request_snapshot"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::RequestSnapshot));
    }
}
