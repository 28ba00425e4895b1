//! FIFO async mutual exclusion
//!
//! A `WaitQueue` serializes asynchronous critical sections: at most one
//! holder is inside at a time, and waiters are admitted strictly in the order
//! they called [`WaitQueue::lock`]. There is no timeout; a holder that never
//! releases stalls every waiter behind it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct QueueState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// FIFO-ordered async lock with explicit unlock
#[derive(Debug, Default)]
pub struct WaitQueue {
    state: Mutex<QueueState>,
}

impl WaitQueue {
    /// Create an unlocked queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the caller may enter.
    ///
    /// Resolves immediately when nobody holds the lock, otherwise after every
    /// earlier caller has entered and released.
    pub async fn lock(&self) -> WaitGuard<'_> {
        loop {
            let rx = {
                let mut state = self.state.lock();
                if !state.locked {
                    state.locked = true;
                    return WaitGuard { queue: self };
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                rx
            };

            let mut pending = Pending {
                queue: self,
                rx,
                granted: false,
            };

            if (&mut pending.rx).await.is_ok() {
                pending.granted = true;
                return WaitGuard { queue: self };
            }
        }
    }

    /// Whether a holder is currently inside
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of callers still waiting to enter
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Hand the lock to the next live waiter, or mark the queue free.
    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(tx) = state.waiters.pop_front() {
            if tx.send(()).is_ok() {
                return;
            }
        }
        state.locked = false;
    }
}

/// A queued `lock()` that has not been admitted yet
struct Pending<'a> {
    queue: &'a WaitQueue,
    rx: oneshot::Receiver<()>,
    granted: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        // Admitted between the last poll and the drop: pass the turn on.
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.queue.release();
        }
    }
}

/// Proof of holding a [`WaitQueue`]; releases on [`WaitGuard::unlock`] or drop
#[must_use = "dropping the guard unlocks the queue immediately"]
#[derive(Debug)]
pub struct WaitGuard<'a> {
    queue: &'a WaitQueue,
}

impl WaitGuard<'_> {
    /// Release the lock, admitting the next queued caller
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_when_free() {
        let queue = WaitQueue::new();
        assert!(!queue.is_locked());

        let guard = queue.lock().await;
        assert!(queue.is_locked());
        assert_eq!(queue.waiting(), 0);

        guard.unlock();
        assert!(!queue.is_locked());
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = Arc::new(WaitQueue::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let holder = queue.lock().await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let task_queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let guard = task_queue.lock().await;
                order.lock().push(i);
                tokio::task::yield_now().await;
                guard.unlock();
            }));

            // Make sure each task is queued before spawning the next one
            while queue.waiting() < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        assert!(order.lock().is_empty());
        holder.unlock();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(!queue.is_locked());
        assert_eq!(queue.waiting(), 0);
    }

    #[tokio::test]
    async fn test_one_holder_at_a_time() {
        let queue = Arc::new(WaitQueue::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = queue.lock().await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(!queue.is_locked());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_skipped() {
        let queue = WaitQueue::new();
        let holder = queue.lock().await;

        let timed_out = tokio::time::timeout(Duration::from_millis(10), queue.lock()).await;
        assert!(timed_out.is_err());
        assert_eq!(queue.waiting(), 0);

        holder.unlock();
        assert!(!queue.is_locked());

        let _guard = queue.lock().await;
        assert!(queue.is_locked());
    }
}
