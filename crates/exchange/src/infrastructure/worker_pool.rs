//! Queue-backed match workers.
//!
//! Order ids go into a bounded channel; a fixed set of tokio tasks pulls them off and
//! runs a [`MatchTrigger`] for each. Workers share one receiver, so any idle worker
//! takes the next job and different symbols progress in parallel.

use async_trait::async_trait;
use bourse_core::OrderId;
use bourse_ports::{DispatchError, LedgerStore, MatchDispatcher};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;

use crate::application::{MatchTrigger, TriggerOutcome};

/// Count of dispatched jobs that have not finished yet
#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one job finished when dropped, including when the handler panics
struct PendingJob(Arc<Pending>);

impl Drop for PendingJob {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Sending half of the match queue
#[derive(Clone)]
pub struct MatchQueue {
    tx: mpsc::Sender<OrderId>,
    pending: Arc<Pending>,
}

#[async_trait]
impl MatchDispatcher for MatchQueue {
    async fn dispatch(&self, order_id: OrderId) -> Result<(), DispatchError> {
        self.pending.increment();
        if self.tx.send(order_id).await.is_err() {
            self.pending.decrement();
            return Err(DispatchError::Closed);
        }
        debug!("Queued match attempt for order {}", order_id);
        Ok(())
    }
}

pub struct MatchWorkerPool {
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl MatchWorkerPool {
    /// Spawn `workers` tasks draining a queue of `capacity` jobs
    pub fn start<S: LedgerStore>(
        trigger: Arc<MatchTrigger<S>>,
        workers: usize,
        capacity: usize,
    ) -> (Self, MatchQueue) {
        let (tx, rx) = mpsc::channel::<OrderId>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(Pending::default());

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = rx.clone();
                let trigger = trigger.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    Self::run_worker(worker_id, rx, trigger, pending).await;
                })
            })
            .collect::<Vec<_>>();

        info!("Started {} match workers (queue capacity {})", handles.len(), capacity);

        (
            Self {
                workers: handles,
                pending: pending.clone(),
            },
            MatchQueue { tx, pending },
        )
    }

    async fn run_worker<S: LedgerStore>(
        worker_id: usize,
        rx: Arc<Mutex<mpsc::Receiver<OrderId>>>,
        trigger: Arc<MatchTrigger<S>>,
        pending: Arc<Pending>,
    ) {
        loop {
            let next = { rx.lock().await.recv().await };
            let Some(order_id) = next else {
                debug!("Match worker {} stopping, queue closed", worker_id);
                break;
            };

            let _job = PendingJob(pending.clone());
            match trigger.handle(order_id).await {
                Ok(TriggerOutcome::Attempted(outcome)) => {
                    debug!("Worker {} order {}: {:?}", worker_id, order_id, outcome.kind());
                }
                Ok(skipped) => {
                    debug!("Worker {} order {} skipped: {:?}", worker_id, order_id, skipped);
                }
                Err(e) if e.is_transient() => {
                    warn!("Match attempt for order {} dropped: {}", order_id, e);
                }
                Err(e) => {
                    error!("Match attempt for order {} failed: {}", order_id, e);
                }
            }
        }
    }

    /// Wait until every dispatched job has been handled
    pub async fn drain(&self) {
        self.pending.wait_idle().await;
    }

    /// Finish queued work, then stop the workers
    pub async fn shutdown(self) {
        self.drain().await;
        for worker in &self.workers {
            worker.abort();
        }
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("Match workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_idle_when_empty() {
        let pending = Pending::default();
        pending.wait_idle().await;

        pending.increment();
        pending.decrement();
        pending.wait_idle().await;
        assert_eq!(pending.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_last_decrement() {
        let pending = Arc::new(Pending::default());
        pending.increment();
        pending.increment();

        let waiter = {
            let pending = pending.clone();
            tokio::spawn(async move { pending.wait_idle().await })
        };

        pending.decrement();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        pending.decrement();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_still_counts_as_done() {
        let pending = Arc::new(Pending::default());
        pending.increment();

        let job = {
            let pending = pending.clone();
            tokio::spawn(async move {
                let _job = PendingJob(pending);
                panic!("match handler blew up");
            })
        };
        assert!(job.await.unwrap_err().is_panic());

        tokio::time::timeout(std::time::Duration::from_secs(1), pending.wait_idle())
            .await
            .unwrap();
        assert_eq!(pending.count.load(Ordering::SeqCst), 0);
    }
}
