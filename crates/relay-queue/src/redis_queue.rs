//! Redis-backed queue backend (Section 6, `REDIS_HOST`/`REDIS_PORT`/`REDIS_URI`).
//!
//! Jobs are JSON-encoded and pushed onto a single Redis list; the worker
//! blocks on `BRPOP` so idle instances don't poll.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::{Job, JobQueue, QueueError};

const DEFAULT_LIST_KEY: &str = "relay:jobs";
const BLOCK_TIMEOUT_SECS: f64 = 5.0;
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

pub struct RedisQueue {
    manager: Mutex<ConnectionManager>,
    list_key: String,
}

impl RedisQueue {
    pub async fn connect(uri: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(uri).map_err(|e| QueueError::Broker(e.to_string()))?;
        let manager = client.get_connection_manager().await.map_err(|e| QueueError::Broker(e.to_string()))?;
        Ok(RedisQueue { manager: Mutex::new(manager), list_key: DEFAULT_LIST_KEY.to_string() })
    }

    pub fn with_list_key(mut self, key: impl Into<String>) -> Self {
        self.list_key = key.into();
        self
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&job).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let mut conn = self.manager.lock().await;
        conn.lpush::<_, _, ()>(&self.list_key, payload).await.map_err(|e| QueueError::Broker(e.to_string()))
    }

    async fn dequeue(&self) -> Option<Job> {
        loop {
            let attempt: redis::RedisResult<Option<(String, String)>> = {
                let mut conn = self.manager.lock().await;
                conn.brpop(&self.list_key, BLOCK_TIMEOUT_SECS).await
            };
            let result = match attempt {
                Ok(result) => result,
                Err(e) => {
                    // `ConnectionManager` reconnects on its own; a single
                    // broker error here is transient, not a closed queue.
                    tracing::warn!(error = %e, "redis brpop failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            let Some((_, payload)) = result else {
                continue;
            };
            match serde_json::from_str(&payload) {
                Ok(job) => return Some(job),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed job payload");
                    continue;
                }
            }
        }
    }
}
