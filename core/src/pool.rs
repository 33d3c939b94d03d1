//! Bounded fan-out of independent work items.
//!
//! Every phase runs its items through a [`WorkerPool`]: at most `size` items are
//! in flight, each item runs on its own tokio task, and results are handed back
//! in input order regardless of completion order.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::CancelHandle;

pub struct WorkerPool {
    size: usize,
    cancel: CancelHandle,
}

impl WorkerPool {
    pub fn new(size: usize, cancel: CancelHandle) -> Self {
        Self { size: size.max(1), cancel }
    }

    /// Runs `work` over `items` and waits for every submitted item.
    ///
    /// The returned vector is aligned with `items`: `None` marks an item that was
    /// never submitted because the scan was cancelled first. A task that panics
    /// is replaced by `fallback(item)`.
    pub async fn run<T, R, F, Fut, D>(&self, items: Vec<T>, work: F, fallback: D) -> Vec<Option<R>>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        D: Fn(T) -> R,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.size));
        let work = Arc::new(work);
        let collected: Arc<Mutex<Vec<(usize, R)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut handles = Vec::with_capacity(total);

        for (idx, item) in items.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(submitted = idx, total, "cancelled, not submitting remaining items");
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            // Waiting for a permit can take up to a full probe timeout.
            if self.cancel.is_cancelled() {
                debug!(submitted = idx, total, "cancelled, not submitting remaining items");
                break;
            }

            let work = Arc::clone(&work);
            let collected = Arc::clone(&collected);
            let retained = item.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = work(item).await;
                collected.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push((idx, outcome));
            });
            handles.push((idx, retained, handle));
        }

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (idx, item, handle) in handles {
            if let Err(e) = handle.await {
                warn!("worker for item {idx} failed: {e}");
                slots[idx] = Some(fallback(item));
            }
        }

        let mut collected = collected.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (idx, outcome) in collected.drain(..) {
            slots[idx] = Some(outcome);
        }
        slots
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_follow_input_order() {
        let pool = WorkerPool::new(4, CancelHandle::new());
        let items: Vec<u64> = (0..20).collect();

        // Later items finish first.
        let out = pool
            .run(
                items,
                |n| async move {
                    tokio::time::sleep(Duration::from_millis(40 - 2 * n)).await;
                    n * 10
                },
                |_| 0,
            )
            .await;

        let expected: Vec<Option<u64>> = (0..20).map(|n| Some(n * 10)).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn never_exceeds_pool_size() {
        let pool = WorkerPool::new(3, CancelHandle::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        pool.run(
            (0..15).collect::<Vec<u32>>(),
            move |_| {
                let (f, p) = (Arc::clone(&f), Arc::clone(&p));
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                }
            },
            |_| (),
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_submits_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let pool = WorkerPool::new(2, cancel);

        let out = pool.run(vec![1, 2, 3], |n| async move { n }, |n| n).await;
        assert_eq!(out, vec![None, None, None]);
    }

    #[tokio::test]
    async fn cancellation_lets_in_flight_items_finish() {
        let cancel = CancelHandle::new();
        let pool = WorkerPool::new(1, cancel.clone());

        let trigger = cancel.clone();
        let out = pool
            .run(
                vec![1, 2, 3, 4],
                move |n| {
                    let trigger = trigger.clone();
                    async move {
                        if n == 2 {
                            trigger.cancel();
                        }
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        n
                    }
                },
                |n| n,
            )
            .await;

        assert_eq!(out[0], Some(1));
        assert_eq!(out[1], Some(2));
        assert_eq!(out[2..], [None, None]);
    }

    #[tokio::test]
    async fn panicking_item_uses_fallback() {
        let pool = WorkerPool::new(2, CancelHandle::new());
        let out = pool
            .run(
                vec![1, 2, 3],
                |n: i32| async move {
                    if n == 2 {
                        panic!("boom");
                    }
                    n
                },
                |n| -n,
            )
            .await;
        assert_eq!(out, vec![Some(1), Some(-2), Some(3)]);
    }
}
