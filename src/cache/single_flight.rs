// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Collapse concurrent identical work into one execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Calls<T> = Arc<Mutex<HashMap<String, Arc<OnceCell<T>>>>>;

/// Result of [`SingleFlight::run`].
#[derive(Debug, Clone)]
pub struct Flight<T> {
    pub value: T,
    /// `true` when this caller ran the work itself.
    pub leader: bool,
}

/// Keyed in-flight deduplication.
///
/// The first caller for a key runs the work; callers arriving while it runs
/// wait and receive a clone of the same value. If the running caller is
/// cancelled or fails, one of the waiters runs its own work instead. Once
/// the work completes the key is released, so later callers start afresh.
pub struct SingleFlight<T> {
    calls: Calls<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with work in progress.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub async fn run<F, Fut, E>(&self, key: &str, work: F) -> Result<Flight<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                calls
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };
        let _release = Release {
            calls: &self.calls,
            key,
            cell: &cell,
        };

        let mut leader = false;
        let value = cell
            .get_or_try_init(|| {
                leader = true;
                work()
            })
            .await?
            .clone();

        Ok(Flight { value, leader })
    }
}

/// Releases the key when a caller leaves, unless other callers are still
/// waiting on unfinished work.
struct Release<'a, T> {
    calls: &'a Calls<T>,
    key: &'a str,
    cell: &'a Arc<OnceCell<T>>,
}

impl<T> Drop for Release<'_, T> {
    fn drop(&mut self) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let Some(current) = calls.get(self.key) else {
            return;
        };
        if !Arc::ptr_eq(current, self.cell) {
            return;
        }
        // One reference held by the map and one by this caller.
        let waiters = Arc::strong_count(self.cell) > 2;
        if self.cell.initialized() || !waiters {
            calls.remove(self.key);
        }
    }
}
