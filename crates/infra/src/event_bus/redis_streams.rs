//! Redis Streams-backed event bus (durable, at-least-once delivery).
//!
//! ## Architecture
//!
//! - **Stream Key**: `dynprice:<topic>` (one stream per topic)
//! - **Entry fields**: `key` (partition key, the product id for price updates)
//!   and `payload` (the JSON envelope bytes)
//! - **Consumer Groups**: one per worker (`<group_id>-catalog`,
//!   `<group_id>-orders`), created on subscribe
//! - **Consumers**: one stable name per process (`PRICING_CONSUMER_NAME`)
//!
//! A new group starts from the beginning of the stream. An entry is
//! acknowledged (`XACK`) only after the subscriber acks it, i.e. once its
//! handler has returned. At most [`READ_COUNT`] entries are in flight per
//! subscription. On start the reader first replays entries still pending for
//! its consumer name, then switches to new entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use dynprice_events::{BusMessage, EventBus, Subscription};

use crate::config::TopicConfig;

const STREAM_PREFIX: &str = "dynprice";

/// Upper bound on entries handed out but not yet acknowledged.
const READ_COUNT: usize = 16;

/// How long `XREADGROUP` blocks waiting for new entries.
const READ_BLOCK_MS: usize = 1_000;

/// Pause after a failed read before retrying.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Malformed stream entry {id}: {reason}")]
    MalformedEntry { id: String, reason: String },
}

#[derive(Clone)]
pub struct RedisStreamsEventBus {
    client: Arc<redis::Client>,
    /// Shared connection for `XADD`. Readers get their own connection since
    /// `XREADGROUP ... BLOCK` would stall everything multiplexed behind it.
    publisher: MultiplexedConnection,
    topics: TopicConfig,
}

impl std::fmt::Debug for RedisStreamsEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsEventBus")
            .field("group_id", &self.topics.group_id)
            .field("consumer", &self.topics.consumer_name)
            .finish_non_exhaustive()
    }
}

impl RedisStreamsEventBus {
    /// Connect to Redis.
    ///
    /// `topics` decides the consumer group and consumer name used by
    /// [`EventBus::subscribe`].
    pub async fn connect(redis_url: impl AsRef<str>, topics: TopicConfig) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            publisher,
            topics,
        })
    }
}

#[async_trait]
impl EventBus for RedisStreamsEventBus {
    type Error = RedisStreamsError;

    #[instrument(skip(self, message), fields(topic = %topic, key = %message.key()), err)]
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), Self::Error> {
        let mut conn = self.publisher.clone();
        let _: String = conn
            .xadd(
                stream_key(topic),
                "*",
                &[("key", message.key().as_bytes()), ("payload", message.payload())],
            )
            .await
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {e}")))?;

        Ok(())
    }

    /// Spawns a reader task on the current tokio runtime; it stops once the
    /// returned subscription is dropped.
    fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let reader = StreamReader {
            client: self.client.clone(),
            stream_key: stream_key(topic),
            group_name: self.topics.group_for(topic),
            consumer_name: self.topics.consumer_name.clone(),
        };

        tokio::spawn(reader.run(tx, ack_rx));

        Subscription::with_acks(rx, ack_tx)
    }
}

/// Background reader feeding one [`Subscription`].
struct StreamReader {
    client: Arc<redis::Client>,
    stream_key: String,
    group_name: String,
    consumer_name: String,
}

impl StreamReader {
    async fn run(self, tx: mpsc::UnboundedSender<BusMessage>, mut acks: mpsc::UnboundedReceiver<String>) {
        let mut conn: Option<MultiplexedConnection> = None;
        let mut in_flight = 0usize;
        // Cursor into this consumer's pending entries; `None` once replayed.
        let mut backlog: Option<String> = Some("0".to_string());

        while !tx.is_closed() {
            if conn.is_none() {
                match self.open().await {
                    Ok(c) => conn = Some(c),
                    Err(e) => {
                        warn!(stream = %self.stream_key, error = %e, "redis reader cannot connect");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                        continue;
                    }
                }
            }
            let Some(c) = conn.as_mut() else { continue };

            let mut handled = Vec::new();
            while let Ok(id) = acks.try_recv() {
                handled.push(id);
            }
            if handled.is_empty() && in_flight >= READ_COUNT {
                tokio::select! {
                    id = acks.recv() => match id {
                        Some(id) => handled.push(id),
                        None => break,
                    },
                    _ = tx.closed() => break,
                }
                while let Ok(id) = acks.try_recv() {
                    handled.push(id);
                }
            }
            if !handled.is_empty() {
                in_flight = in_flight.saturating_sub(handled.len());
                self.ack(c, &handled).await;
            }

            let start = backlog.as_deref().unwrap_or(">");
            match self.read_batch(c, start, READ_COUNT - in_flight).await {
                Ok(entries) => {
                    if backlog.is_some() {
                        backlog = entries.last().map(|e| e.id.clone());
                        if backlog.is_none() {
                            debug!(stream = %self.stream_key, consumer = %self.consumer_name, "pending entries replayed");
                        }
                    }
                    match self.deliver(c, entries, &tx).await {
                        Some(delivered) => in_flight += delivered,
                        None => break,
                    }
                }
                Err(e) => {
                    warn!(stream = %self.stream_key, error = %e, "redis read failed, reconnecting");
                    conn = None;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }

        debug!(stream = %self.stream_key, consumer = %self.consumer_name, in_flight, "redis reader stopped");
    }

    async fn open(&self) -> Result<MultiplexedConnection, RedisStreamsError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        self.ensure_consumer_group(&mut conn).await?;
        Ok(conn)
    }

    /// `XGROUP CREATE ... MKSTREAM`; an existing group is fine.
    async fn ensure_consumer_group(&self, conn: &mut MultiplexedConnection) -> Result<(), RedisStreamsError> {
        let created: redis::RedisResult<String> = conn
            .xgroup_create_mkstream(&self.stream_key, &self.group_name, "0")
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(RedisStreamsError::Command(format!("XGROUP CREATE failed: {e}"))),
        }
    }

    /// `XREADGROUP` from `start`: `>` for new entries, an id to page through
    /// this consumer's pending entries.
    async fn read_batch(
        &self,
        conn: &mut MultiplexedConnection,
        start: &str,
        count: usize,
    ) -> Result<Vec<StreamId>, RedisStreamsError> {
        let opts = StreamReadOptions::default()
            .group(&self.group_name, &self.consumer_name)
            .count(count)
            .block(READ_BLOCK_MS);

        // A BLOCK timeout replies with nil.
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[start], &opts)
            .await
            .map_err(|e| RedisStreamsError::Command(format!("XREADGROUP failed: {e}")))?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default())
    }

    /// Hand entries to the subscriber. Returns how many are now awaiting an
    /// ack, or `None` once the subscriber has gone away.
    async fn deliver(
        &self,
        conn: &mut MultiplexedConnection,
        entries: Vec<StreamId>,
        tx: &mpsc::UnboundedSender<BusMessage>,
    ) -> Option<usize> {
        let mut delivered = 0;
        let mut malformed = Vec::new();
        for entry in &entries {
            match entry_to_message(entry) {
                Ok(message) => {
                    tx.send(message).ok()?;
                    delivered += 1;
                }
                // Acknowledged right away; redelivery would not fix them.
                Err(e) => {
                    warn!(stream = %self.stream_key, error = %e, "skipping malformed stream entry");
                    malformed.push(entry.id.clone());
                }
            }
        }

        if !malformed.is_empty() {
            self.ack(conn, &malformed).await;
        }
        Some(delivered)
    }

    async fn ack(&self, conn: &mut MultiplexedConnection, ids: &[String]) {
        let acked: redis::RedisResult<u64> = conn.xack(&self.stream_key, &self.group_name, ids).await;
        if let Err(e) = acked {
            // Left pending; replayed on the next start.
            warn!(stream = %self.stream_key, error = %e, count = ids.len(), "XACK failed");
        }
    }
}

fn stream_key(topic: &str) -> String {
    format!("{STREAM_PREFIX}:{topic}")
}

fn entry_to_message(entry: &StreamId) -> Result<BusMessage, RedisStreamsError> {
    let malformed = |reason: &str| RedisStreamsError::MalformedEntry {
        id: entry.id.clone(),
        reason: reason.to_string(),
    };

    let payload: Vec<u8> = entry.get("payload").ok_or_else(|| malformed("missing payload field"))?;
    let key: String = entry.get("key").unwrap_or_default();

    Ok(BusMessage::new(key, payload).with_delivery_id(entry.id.clone()))
}
