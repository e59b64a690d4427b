//! # relay-queue
//!
//! Durable delivery queue (Section 4.9, C9). Decouples "publish to
//! same-instance subscribers" (the channel hub's job) from "deliver to a
//! recipient connected on some other instance" (this crate's job).
//!
//! [`MemoryQueue`] is an in-process stand-in suitable for a single-instance
//! deployment and for tests; [`RedisQueue`] (behind the `redis-backend`
//! feature) is the production broker described in Section 6's
//! `REDIS_HOST`/`REDIS_PORT`/`REDIS_URI` configuration.

pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_types::{FrameKind, Hex};

pub use memory::MemoryQueue;
#[cfg(feature = "redis-backend")]
pub use redis_queue::RedisQueue;

/// The retry policy every job is enqueued with (Section 4.9).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    pub remove_on_complete: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { attempts: 3, backoff: Duration::from_millis(1000), remove_on_complete: true }
    }
}

/// The payload a delivery job carries: the frame kind and its already-
/// serialized message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    pub kind: FrameKind,
    pub message: serde_json::Value,
}

/// A unit of delivery work addressed to one or more recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub to: Vec<Hex>,
    pub conversation: Hex,
    pub data: JobData,
    #[serde(default)]
    pub attempt: u32,
}

impl Job {
    pub fn new(to: Vec<Hex>, conversation: Hex, data: JobData) -> Self {
        Job { to, conversation, data, attempt: 0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("broker error: {0}")]
    Broker(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Producer/consumer surface every queue backend implements.
///
/// The consumer side (`dequeue`) suspends until a job is available — callers
/// run one long-lived worker task per queue (Section 4.9, "Scheduling").
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    /// Pops the next job, or `None` once the queue has been closed.
    async fn dequeue(&self) -> Option<Job>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_matches_the_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(1000));
        assert!(policy.remove_on_complete);
    }
}
