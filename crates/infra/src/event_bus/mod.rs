//! Infrastructure event bus implementations.
//!
//! The `EventBus` port and the in-memory bus live in `dynprice-events`.
//! This module provides infrastructure-backed implementations (Redis).

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsError, RedisStreamsEventBus};
