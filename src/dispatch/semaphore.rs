//! # DynamicSemaphore: a concurrency budget whose limit moves at runtime.
//!
//! Thin layer over [`tokio::sync::Semaphore`] (which wakes waiters in FIFO
//! order) that supports [`set_limit`](DynamicSemaphore::set_limit):
//!
//! - raising the limit adds permits immediately — queued waiters wake up
//!   to the new bound;
//! - lowering the limit never revokes permits already held. The reduction
//!   is recorded as *debt* and swallower tasks retire permits as they
//!   come back, so the bound tightens as in-flight work completes.
//!
//! A later raise repays outstanding debt before adding fresh permits, so
//! interleaved raises and cuts converge on the last limit set.

use std::sync::{Arc, Mutex};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

struct Inner {
    /// The limit callers asked for.
    limit: usize,
    /// Permits still to be retired after limit cuts.
    debt: usize,
}

/// Concurrency budget with a runtime-adjustable limit.
pub struct DynamicSemaphore {
    sem: Arc<Semaphore>,
    inner: Arc<Mutex<Inner>>,
}

impl DynamicSemaphore {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            sem: Arc::new(Semaphore::new(limit)),
            inner: Arc::new(Mutex::new(Inner { limit, debt: 0 })),
        })
    }

    /// Waits for a permit. The permit returns to the budget on drop.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.sem).acquire_owned().await
    }

    /// The current target limit.
    pub fn limit(&self) -> usize {
        self.inner.lock().unwrap().limit
    }

    /// Moves the limit to `n`.
    pub fn set_limit(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        let current = inner.limit;

        if n > current {
            let mut grow = n - current;
            let repaid = grow.min(inner.debt);
            inner.debt -= repaid;
            grow -= repaid;
            if grow > 0 {
                self.sem.add_permits(grow);
            }
        } else if n < current {
            let shrink = current - n;
            inner.debt += shrink;
            for _ in 0..shrink {
                let sem = Arc::clone(&self.sem);
                let shared = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let Ok(permit) = sem.acquire_owned().await else {
                        return;
                    };
                    let mut inner = shared.lock().unwrap();
                    if inner.debt > 0 {
                        inner.debt -= 1;
                        permit.forget();
                    }
                    // Debt already repaid by a raise: the permit just
                    // returns to the pool on drop.
                });
            }
        }
        inner.limit = n;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn limit_bounds_concurrent_holders() {
        let sem = DynamicSemaphore::new(2);
        let p1 = sem.acquire().await.unwrap();
        let _p2 = sem.acquire().await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), sem.acquire()).await;
        assert!(blocked.is_err());

        drop(p1);
        let p3 = tokio::time::timeout(Duration::from_millis(200), sem.acquire())
            .await
            .expect("freed permit should be acquirable")
            .unwrap();
        drop(p3);
    }

    #[tokio::test]
    async fn raising_the_limit_wakes_waiters() {
        let sem = DynamicSemaphore::new(1);
        let _held = sem.acquire().await.unwrap();

        let waiter = {
            let sem = Arc::clone(&sem);
            tokio::spawn(async move { sem.acquire().await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        sem.set_limit(2);
        let permit = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after raise")
            .unwrap();
        drop(permit);
        assert_eq!(sem.limit(), 2);
    }

    #[tokio::test]
    async fn lowering_never_revokes_held_permits() {
        let sem = DynamicSemaphore::new(4);
        let held: Vec<_> = [
            sem.acquire().await.unwrap(),
            sem.acquire().await.unwrap(),
            sem.acquire().await.unwrap(),
            sem.acquire().await.unwrap(),
        ]
        .into();

        sem.set_limit(1);
        assert_eq!(sem.limit(), 1);

        // All four already-held permits stay valid; new acquires wait
        // until enough return to pay the debt.
        drop(held);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let p = tokio::time::timeout(Duration::from_secs(1), sem.acquire())
            .await
            .expect("one permit must remain after shrink")
            .unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), sem.acquire()).await;
        assert!(blocked.is_err());
        drop(p);
    }

    #[tokio::test]
    async fn raise_after_cut_repays_debt_first() {
        let sem = DynamicSemaphore::new(4);
        sem.set_limit(1);
        sem.set_limit(4);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Net limit is 4 again: all four permits acquirable.
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(
                tokio::time::timeout(Duration::from_secs(1), sem.acquire())
                    .await
                    .expect("limit should be back to 4")
                    .unwrap(),
            );
        }
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), sem.acquire()).await;
        assert!(blocked.is_err());
    }
}
