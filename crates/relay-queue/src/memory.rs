//! In-process queue backend, used for single-instance deployments and tests.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::{Job, JobQueue, QueueError};

/// An unbounded `tokio::mpsc`-backed queue. One instance is shared by every
/// producer; `dequeue` is meant to be called from a single worker task.
pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<mpsc::UnboundedReceiver<Job>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        MemoryQueue { sender, receiver: Mutex::new(receiver) }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobData;
    use relay_types::FrameKind;

    fn job(to: &str) -> Job {
        Job::new(vec![to.to_string()], "h1".to_string(), JobData { kind: FrameKind::New, message: serde_json::json!({}) })
    }

    #[tokio::test]
    async fn enqueued_jobs_are_dequeued_in_order() {
        let queue = MemoryQueue::new();
        queue.enqueue(job("u1")).await.expect("enqueue");
        queue.enqueue(job("u2")).await.expect("enqueue");

        let first = queue.dequeue().await.expect("dequeue");
        assert_eq!(first.to, vec!["u1".to_string()]);
        let second = queue.dequeue().await.expect("dequeue");
        assert_eq!(second.to, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn job_carries_an_initial_attempt_of_zero() {
        let j = job("u1");
        assert_eq!(j.attempt, 0);
    }
}
