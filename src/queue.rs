//! In-process job queue feeding the worker pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// How long a worker waits for a job before checking for shutdown again.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error returned when the queue no longer accepts jobs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job queue is closed, job {0} was not enqueued")]
pub struct QueueClosed(pub String);

/// FIFO queue of job ids shared by all workers.
///
/// Only ids travel through the queue; the job record itself stays in the
/// `JobStore`, which remains the single source of truth for state.
pub struct JobQueue {
    sender: mpsc::UnboundedSender<String>,
    receiver: Mutex<mpsc::UnboundedReceiver<String>>,
    length: AtomicUsize,
}

impl JobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            length: AtomicUsize::new(0),
        }
    }

    /// Enqueues a job id for processing.
    pub fn enqueue(&self, job_id: String) -> Result<(), QueueClosed> {
        self.length.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job_id).map_err(|e| {
            self.length.fetch_sub(1, Ordering::SeqCst);
            QueueClosed(e.0)
        })?;
        Ok(())
    }

    /// Dequeues the next job id, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout.
    pub async fn dequeue(&self, timeout: Duration) -> Option<String> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(job_id)) => {
                self.length.fetch_sub(1, Ordering::SeqCst);
                debug!("Dequeued job: job_id={}", job_id);
                Some(job_id)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Returns the current queue length.
    pub fn queue_length(&self) -> usize {
        self.length.load(Ordering::SeqCst)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_dequeue_fifo() {
        let queue = JobQueue::new();
        queue.enqueue("a".to_string()).unwrap();
        queue.enqueue("b".to_string()).unwrap();
        assert_eq!(queue.queue_length(), 2);

        assert_eq!(queue.dequeue(DEQUEUE_TIMEOUT).await.as_deref(), Some("a"));
        assert_eq!(queue.dequeue(DEQUEUE_TIMEOUT).await.as_deref(), Some("b"));
        assert_eq!(queue.queue_length(), 0);
    }

    #[tokio::test]
    async fn test_dequeue_times_out() {
        let queue = JobQueue::new();
        assert_eq!(queue.dequeue(Duration::from_millis(10)).await, None);
    }
}
