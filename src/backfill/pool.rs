//! Bounded worker pool
//!
//! `min(concurrency, items)` workers claim items from a shared queue until it
//! drains. Results flow over an mpsc channel to a single collector, which is
//! the only place shared state is accumulated. The pool returns only after
//! every worker has terminated, so callers observe a real join barrier.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Outcome of a pool run: completion-ordered results plus a flag set when a
/// cancellation signal stopped the queue from draining.
pub struct PoolOutcome<R> {
    pub results: Vec<R>,
    pub cancelled: bool,
}

/// Run `task` over every item with bounded concurrency.
///
/// A cancellation signal on `shutdown` stops workers from claiming further
/// items; in-flight tasks run to completion and their results are still
/// collected. No item is ever claimed twice.
pub async fn run<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    shutdown: &broadcast::Sender<()>,
    task: F,
) -> PoolOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = R> + Send,
{
    let total = items.len();
    let workers = concurrency.max(1).min(total);
    if total == 0 {
        return PoolOutcome {
            results: Vec::new(),
            cancelled: false,
        };
    }

    let queue: Arc<Mutex<VecDeque<T>>> = Arc::new(Mutex::new(items.into_iter().collect()));
    let (tx, mut rx) = mpsc::unbounded_channel::<R>();

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = queue.clone();
        let tx = tx.clone();
        let task = task.clone();
        let mut shutdown_rx = shutdown.subscribe();

        handles.push(tokio::spawn(async move {
            loop {
                // A pending signal means: stop claiming, let siblings finish.
                match shutdown_rx.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => {
                        debug!("worker {} stopping on shutdown signal", worker_id);
                        break;
                    }
                }

                // Claim before awaiting; the lock is never held across await.
                let item = queue.lock().pop_front();
                let Some(item) = item else { break };

                let result = task(item).await;
                if tx.send(result).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    // Single serialization point for result accumulation.
    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }

    // The channel only closes once every sender is dropped, but join anyway
    // so panicked workers are surfaced instead of silently swallowed.
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("worker task join error: {}", e);
        }
    }

    let cancelled = !queue.lock().is_empty();
    PoolOutcome { results, cancelled }
}
