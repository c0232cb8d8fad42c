use redis::{aio::MultiplexedConnection, Client};

#[derive(Clone)]
pub struct RedisClient {
    pub client: Client,
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisClient { client, conn })
    }

    /// Отдельное соединение под подписку: multiplexed-соединение pub/sub не умеет.
    pub async fn pubsub(&self) -> redis::RedisResult<redis::aio::PubSub> {
        self.client.get_async_pubsub().await
    }
}
