//! WebSocket-лента схемы зала.
//!
//! `GET /api/ws/movies/{id}/seats`. После подключения клиент получает `seat_map`,
//! затем свежий `seat_map` после каждого события по этому фильму. Клиент может
//! сам запросить снимок сообщением `{"type":"refresh"}`.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval_at, Duration, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::AppError, services::movies::SeatMap, AppState};

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

const MAX_CONNECTIONS: usize = 1000;
const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws/movies/{id}/seats", get(seat_feed))
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    SeatMap(SeatMap),
    Error { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Refresh,
}

async fn seat_feed(
    ws: WebSocketUpgrade,
    Path(movie_id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let current = ACTIVE_CONNECTIONS.load(Ordering::Relaxed);
    if current >= MAX_CONNECTIONS {
        warn!("WebSocket connection limit reached ({} connections)", current);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent connections",
        )
            .into_response();
    }

    match state.movies.find_by_id(movie_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return AppError::MovieNotFound.into_response(),
        Err(e) => return e.into_response(),
    }

    ws.on_upgrade(move |socket| handle_socket(socket, movie_id, state))
}

async fn handle_socket(socket: WebSocket, movie_id: Uuid, state: Arc<AppState>) {
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
    info!("Seat feed opened for movie {} ({} connections)", movie_id, count);

    // Подписка до первого снимка, чтобы не потерять событие между ними
    let mut events = state.events.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);

    if send_seat_map(&mut sender, &state, movie_id).await.is_ok() {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) if event.movie_id() == movie_id => {
                        debug!("Seat feed for movie {} got {}", movie_id, event.name());
                        if send_seat_map(&mut sender, &state, movie_id).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Seat feed for movie {} skipped {} events", movie_id, skipped);
                        if send_seat_map(&mut sender, &state, movie_id).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                message = receiver.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(ClientMessage::Refresh) => {
                                if send_seat_map(&mut sender, &state, movie_id).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => debug!("Ignoring unknown seat feed message: {}", text.as_str()),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Seat feed socket error: {:?}", e);
                        break;
                    }
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let remaining = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed) - 1;
    info!("Seat feed closed for movie {} ({} connections)", movie_id, remaining);
}

/// Отправляет снимок зала. Ошибка сервиса уходит клиенту как `error`.
async fn send_seat_map(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
    movie_id: Uuid,
) -> Result<(), axum::Error> {
    let message = match state.movies.seat_map(movie_id).await {
        Ok(map) => ServerMessage::SeatMap(map),
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    };
    let json = match serde_json::to_string(&message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize seat map for movie {}: {:?}", movie_id, e);
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::SeatPosition;

    #[test]
    fn seat_map_message_is_tagged() {
        let movie_id = Uuid::nil();
        let message = ServerMessage::SeatMap(SeatMap {
            movie_id,
            total_rows: 2,
            seats_per_row: 3,
            taken: 5,
            available: vec![SeatPosition::new('A', 2)],
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "seat_map");
        assert_eq!(json["movieId"], movie_id.to_string());
        assert_eq!(json["seatsPerRow"], 3);
        assert_eq!(json["available"][0]["rowLetter"], "A");
    }

    #[test]
    fn refresh_is_the_only_client_message() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"refresh"}"#),
            Ok(ClientMessage::Refresh)
        ));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
