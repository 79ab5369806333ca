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

//! Background removal of expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::store::CacheStore;

/// Shortest period accepted by [`CacheStore::spawn_maintenance`].
pub const MIN_MAINTENANCE_PERIOD: Duration = Duration::from_millis(10);

impl CacheStore {
    /// Purge expired entries every `period` until the last clone of the
    /// store is dropped. The task holds no strong reference to the store.
    pub fn spawn_maintenance(&self, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_MAINTENANCE_PERIOD);
        let inner = Arc::downgrade(&self.inner);
        let op_timeout = self.op_timeout;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = Weak::upgrade(&inner) else {
                    debug!("Cache dropped, stopping maintenance");
                    break;
                };
                let store = CacheStore { inner, op_timeout };
                if let Err(e) = store.purge_expired().await {
                    warn!("Cache maintenance failed: {}", e);
                }
            }
        })
    }
}
