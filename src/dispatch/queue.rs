//! Bounded delivery queue.
//!
//! A fixed pool of tokio tasks drains one bounded channel. `submit` never
//! waits: a full queue is reported to the caller as `QueueFull`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::{DispatchError, OutboundMessage, Transport};
use crate::config::DispatchConfig;

struct Job {
    message: OutboundMessage,
    done: oneshot::Sender<Result<(), DispatchError>>,
}

/// Completion signal for one submitted message.
#[derive(Debug)]
pub struct DeliveryTicket {
    rx: oneshot::Receiver<Result<(), DispatchError>>,
}

impl DeliveryTicket {
    /// Waits for the single delivery attempt to finish.
    pub async fn outcome(self) -> Result<(), DispatchError> {
        self.rx.await.unwrap_or(Err(DispatchError::Canceled))
    }
}

/// Worker pool in front of a [`Transport`].
pub struct Dispatcher {
    tx: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the workers on the current tokio runtime.
    pub fn start<T: Transport>(transport: T, config: &DispatchConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let transport = Arc::new(transport);

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let transport = Arc::clone(&transport);
                tokio::spawn(async move { worker(id, rx, transport).await })
            })
            .collect();

        log::info!(
            "Dispatcher started: {} worker(s), queue capacity {}",
            config.workers.max(1),
            config.queue_capacity.max(1)
        );
        Self { tx: Some(tx), workers }
    }

    /// Queues `message` for a single delivery attempt.
    ///
    /// # Errors
    /// * `QueueFull` when the queue is at capacity.
    /// * `Closed` after shutdown.
    pub fn submit(&self, message: OutboundMessage) -> Result<DeliveryTicket, DispatchError> {
        let tx = self.tx.as_ref().ok_or(DispatchError::Closed)?;
        let (done, rx) = oneshot::channel();
        tx.try_send(Job { message, done }).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => {
                log::warn!("Delivery queue full, rejecting message to {}", job.message.to);
                DispatchError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })?;
        Ok(DeliveryTicket { rx })
    }

    /// Stops accepting work, lets queued jobs finish and waits for the workers.
    pub async fn shutdown(mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                log::error!("Delivery worker ended abnormally: {}", e);
            }
        }
        log::info!("Dispatcher stopped");
    }
}

async fn worker<T: Transport>(id: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>, transport: Arc<T>) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else { break };

        let result = transport.deliver(&job.message).await;
        match &result {
            Ok(()) => log::info!("Worker {} delivered message to {}", id, job.message.to),
            Err(e) => log::warn!("Worker {} failed to deliver message to {}: {}", id, job.message.to, e),
        }
        // The submitter may have dropped its ticket.
        let _ = job.done.send(result);
    }
}
