// MIT License
//
// Copyright (c) 2022 Ankur Srivastava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Deduplication of concurrent registry round-trips.

use crate::errors::RegistryError;
use async_lock::{Mutex, OnceCell};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// At most one initializer runs per key at a time; concurrent callers for
/// the same key wait for its result. Failures are not remembered, the next
/// waiter runs its own initializer.
pub(crate) struct InFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn run<F, Fut>(&self, key: K, init: F) -> Result<V, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RegistryError>>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            Arc::clone(
                cells
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = cell.get_or_try_init(init).await.cloned();

        // A settled cell is never handed to a new caller, they must re-check
        // the cache. An unsettled one goes with its last holder.
        let mut cells = self.cells.lock().await;
        let stale = cells.get(&key).is_some_and(|current| {
            Arc::ptr_eq(current, &cell)
                && (cell.is_initialized() || Arc::strong_count(&cell) == 2)
        });
        if stale {
            cells.remove(&key);
        }
        drop(cell);
        drop(cells);
        result
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.cells.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_run() {
        let inflight = Arc::new(InFlight::<u32, u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let inflight = Arc::clone(&inflight);
            let calls = Arc::clone(&calls);
            tasks.spawn(async move {
                inflight
                    .run(1, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(42)
                    })
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(inflight.len().await, 0);
    }

    #[tokio::test]
    async fn test_settled_values_are_not_reused() {
        let inflight = InFlight::<u32, u32>::new();
        assert_eq!(inflight.run(1, || async { Ok(1) }).await.unwrap(), 1);
        assert_eq!(inflight.len().await, 0);
        assert_eq!(inflight.run(1, || async { Ok(2) }).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_table_is_empty_after_waiters_finish_together() {
        let inflight = Arc::new(InFlight::<u32, u32>::new());
        for round in 0..20 {
            let mut tasks = tokio::task::JoinSet::new();
            for _ in 0..8 {
                let inflight = Arc::clone(&inflight);
                tasks.spawn(async move {
                    inflight
                        .run(round, || async {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            Ok(round)
                        })
                        .await
                });
            }
            while let Some(result) = tasks.join_next().await {
                assert_eq!(result.unwrap().unwrap(), round);
            }
            assert_eq!(inflight.len().await, 0);
        }
    }

    #[tokio::test]
    async fn test_failures_are_not_remembered() {
        let inflight = InFlight::<&str, u32>::new();
        let failed = inflight
            .run("k", || async { Err(RegistryError::Http { status_code: 100 }) })
            .await;
        assert!(failed.is_err());

        let ok = inflight.run("k", || async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);
        assert_eq!(inflight.len().await, 0);
    }
}
