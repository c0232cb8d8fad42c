//! events
//!
//! События жизненного цикла бронирований.
//!
//! Локально события раздаются через `tokio::sync::broadcast` (на них подписаны
//! WebSocket-клиенты). Если включены распределенные события, публикация идет в
//! канал Redis, а фоновый подписчик на каждом инстансе принимает сообщения,
//! сбрасывает кеш мест и раздает событие своим локальным подписчикам.

use futures::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{allocation::SeatPosition, cache::CacheService, redis_client::RedisClient};

const LOCAL_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BookingEvent {
    #[serde(rename = "booking.created", rename_all = "camelCase")]
    Created {
        booking_id: Uuid,
        movie_id: Uuid,
        seats: Vec<SeatPosition>,
    },
    #[serde(rename = "booking.updated", rename_all = "camelCase")]
    Updated {
        booking_id: Uuid,
        movie_id: Uuid,
        seats: Vec<SeatPosition>,
    },
    #[serde(rename = "booking.deleted", rename_all = "camelCase")]
    Deleted { booking_id: Uuid, movie_id: Uuid },
    #[serde(rename = "seats.changed", rename_all = "camelCase")]
    SeatsChanged { movie_id: Uuid },
}

impl BookingEvent {
    pub fn movie_id(&self) -> Uuid {
        match self {
            BookingEvent::Created { movie_id, .. }
            | BookingEvent::Updated { movie_id, .. }
            | BookingEvent::Deleted { movie_id, .. }
            | BookingEvent::SeatsChanged { movie_id } => *movie_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "booking.created",
            BookingEvent::Updated { .. } => "booking.updated",
            BookingEvent::Deleted { .. } => "booking.deleted",
            BookingEvent::SeatsChanged { .. } => "seats.changed",
        }
    }
}

#[derive(Clone)]
struct RemoteChannel {
    redis: RedisClient,
    channel: String,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BookingEvent>,
    remote: Option<RemoteChannel>,
}

impl EventBus {
    /// Только внутри процесса.
    pub fn local() -> Self {
        let (sender, _) = broadcast::channel(LOCAL_CAPACITY);
        Self { sender, remote: None }
    }

    /// Через Redis pub/sub. Доставку локальным подписчикам делает `run_subscriber`.
    pub fn distributed(redis: RedisClient, channel: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(LOCAL_CAPACITY);
        Self {
            sender,
            remote: Some(RemoteChannel {
                redis,
                channel: channel.into(),
            }),
        }
    }

    pub fn is_distributed(&self) -> bool {
        self.remote.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }

    pub async fn publish(&self, event: BookingEvent) {
        debug!("Publishing {} for movie {}", event.name(), event.movie_id());

        let Some(remote) = &self.remote else {
            self.deliver(event);
            return;
        };

        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {}: {:?}", event.name(), e);
                self.deliver(event);
                return;
            }
        };

        let mut conn = remote.redis.conn.clone();
        let published: Result<i64, _> = conn.publish(&remote.channel, payload).await;
        if let Err(e) = published {
            // Redis недоступен: хотя бы свои клиенты увидят изменение
            warn!("Failed to publish {} to Redis: {:?}", event.name(), e);
            self.deliver(event);
        }
    }

    /// Раздать событие локальным подписчикам. Отсутствие подписчиков не ошибка.
    pub fn deliver(&self, event: BookingEvent) {
        let _ = self.sender.send(event);
    }
}

/// Фоновый подписчик на канал Redis. Переподключается при обрыве.
pub async fn run_subscriber(bus: EventBus, cache: CacheService) {
    let Some(remote) = bus.remote.clone() else {
        return;
    };

    loop {
        match subscribe_once(&bus, &cache, &remote).await {
            Ok(()) => warn!("Redis subscription on '{}' ended, reconnecting", remote.channel),
            Err(e) => error!("Redis subscription on '{}' failed: {:?}", remote.channel, e),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn subscribe_once(
    bus: &EventBus,
    cache: &CacheService,
    remote: &RemoteChannel,
) -> redis::RedisResult<()> {
    let mut pubsub = remote.redis.pubsub().await?;
    pubsub.subscribe(&remote.channel).await?;
    info!("Subscribed to booking events on '{}'", remote.channel);

    let mut messages = pubsub.on_message();
    while let Some(message) = messages.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Skipping unreadable event payload: {:?}", e);
                continue;
            }
        };
        match serde_json::from_str::<BookingEvent>(&payload) {
            Ok(event) => {
                cache.invalidate_seats(event.movie_id()).await;
                bus.deliver(event);
            }
            Err(e) => warn!("Skipping malformed event '{}': {:?}", payload, e),
        }
    }
    Ok(())
}
