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

//! Concurrent multi-device query execution.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregate::{aggregate, normalize_output, DeviceOutcome};
use super::request::{QueryRequest, QueryTarget, QueryType, RawQueryRequest};
use super::response::{CachedResponse, PlainQueryResponse};
use crate::cache::{CacheStore, SingleFlight};
use crate::commands::build_command;
use crate::inventory::{DeviceDescriptor, Inventory};
use crate::shared::error::{DeviceError, QueryError};
use crate::transport::{Connector, DeviceTarget, ProxyTarget};

/// Runs queries against devices, consulting and filling the response cache.
pub struct QueryDispatcher {
    inventory: Arc<dyn Inventory>,
    connector: Arc<dyn Connector>,
    cache: Option<CacheStore>,
    in_flight: SingleFlight<PlainQueryResponse>,
}

impl QueryDispatcher {
    /// `cache` is optional; without one every query executes.
    pub fn new(
        inventory: Arc<dyn Inventory>,
        connector: Arc<dyn Connector>,
        cache: Option<CacheStore>,
    ) -> Self {
        Self {
            inventory,
            connector,
            cache,
            in_flight: SingleFlight::new(),
        }
    }

    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// Validate a wire-form request, then run it.
    pub async fn run_raw_query(
        &self,
        raw: RawQueryRequest,
    ) -> Result<PlainQueryResponse, QueryError> {
        let request = QueryRequest::try_from(raw)?;
        self.run_query(&request).await
    }

    pub async fn run_query(
        &self,
        request: &QueryRequest,
    ) -> Result<PlainQueryResponse, QueryError> {
        self.run_query_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run a query until it completes or `cancel` fires. Cancelling aborts
    /// every device task, closing their sessions.
    pub async fn run_query_with_cancel(
        &self,
        request: &QueryRequest,
        cancel: CancellationToken,
    ) -> Result<PlainQueryResponse, QueryError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Query {} cancelled", request.fingerprint());
                Err(QueryError::Cancelled)
            }
            result = self.execute(request) => result,
        }
    }

    async fn execute(&self, request: &QueryRequest) -> Result<PlainQueryResponse, QueryError> {
        let fingerprint = request.fingerprint();
        let key = fingerprint.cache_key();

        if let Some(hit) = self.lookup(&key).await {
            debug!("Serving query {} from cache", fingerprint);
            return Ok(PlainQueryResponse::from_cache(hit));
        }

        // A flight that finished between the lookup above and joining has
        // already filled the cache, so look again before dispatching.
        let (cache_key, fingerprint_ref) = (key.as_str(), &fingerprint);
        let flight = self
            .in_flight
            .run(cache_key, || async move {
                if let Some(hit) = self.lookup(cache_key).await {
                    debug!("Query {} completed by another request", fingerprint_ref);
                    return Ok(PlainQueryResponse::from_cache(hit));
                }
                self.dispatch(request, cache_key).await
            })
            .await?;

        let mut response = flight.value;
        if !flight.leader {
            debug!("Query {} joined an in-flight execution", fingerprint);
            response.random = Uuid::new_v4();
        }
        Ok(response)
    }

    async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get::<CachedResponse>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache lookup failed, continuing uncached: {}", e);
                None
            }
        }
    }

    async fn dispatch(
        &self,
        request: &QueryRequest,
        key: &str,
    ) -> Result<PlainQueryResponse, QueryError> {
        let started = Instant::now();
        let settings = self.inventory.settings();
        let timeout = settings.request_timeout;

        let resolved = self
            .inventory
            .resolve_devices(request.devices())
            .await
            .map_err(|e| internal(format!("failed to resolve devices: {e}")))?;
        let mut resolved: HashMap<String, DeviceDescriptor> = resolved
            .into_iter()
            .map(|device| (device.id.clone(), device))
            .collect();

        let mut outcomes: Vec<Option<DeviceOutcome>> =
            Vec::with_capacity(request.devices().len());
        let mut tasks = Vec::new();
        for (position, id) in request.devices().iter().enumerate() {
            let Some(device) = resolved.remove(id) else {
                debug!("Device '{}' is not in the inventory", id);
                outcomes.push(Some(DeviceOutcome::new(
                    id.as_str(),
                    id.as_str(),
                    Err(DeviceError::NotFound { id: id.clone() }),
                )));
                continue;
            };
            outcomes.push(None);

            let name = device.name.clone();
            let handle = tokio::spawn(query_device(
                Arc::clone(&self.inventory),
                Arc::clone(&self.connector),
                device,
                request.query_type(),
                *request.target(),
                timeout,
            ));
            tasks.push((position, id.clone(), name, handle));
        }

        let _abort = AbortOnDrop(tasks.iter().map(|(.., h)| h.abort_handle()).collect());
        let finished = join_all(
            tasks
                .into_iter()
                .map(|(position, id, name, handle)| async move {
                    (position, id, name, handle.await)
                }),
        )
        .await;

        for (position, id, name, joined) in finished {
            let result =
                joined.map_err(|e| internal(format!("task for device '{id}' failed: {e}")))?;
            outcomes[position] = Some(DeviceOutcome::new(id, name, result));
        }
        let outcomes: Vec<DeviceOutcome> = outcomes.into_iter().flatten().collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let output = aggregate(request.format(), &outcomes, &settings.messages);
        let response = PlainQueryResponse::new(request.format(), output, started.elapsed());

        info!(
            "Query {} finished in {:.3}s ({} devices, {} failed)",
            request.fingerprint(),
            response.runtime,
            outcomes.len(),
            failed
        );

        if failed == 0 {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.set(key, &response.to_cached()).await {
                    warn!("Failed to cache query response: {}", e);
                }
            }
        }

        Ok(response)
    }
}

fn internal(detail: String) -> QueryError {
    error!("{}", detail);
    QueryError::Internal(detail)
}

/// Resolve, connect and execute for one device, bounded by `timeout`.
async fn query_device(
    inventory: Arc<dyn Inventory>,
    connector: Arc<dyn Connector>,
    device: DeviceDescriptor,
    query_type: QueryType,
    target: QueryTarget,
    timeout: Duration,
) -> Result<String, DeviceError> {
    let device_id = device.id.clone();
    let run = async {
        let credential = inventory.resolve_credential(&device.credential).await?;
        let proxy = match &device.proxy {
            Some(reference) => {
                let descriptor = inventory.resolve_proxy(reference).await?;
                let credential = inventory.resolve_credential(&descriptor.credential).await?;
                Some(ProxyTarget {
                    descriptor,
                    credential,
                })
            }
            None => None,
        };

        let command = build_command(&device, query_type, &target);
        debug!("Running '{}' on {}", command, device.id);

        let target = DeviceTarget {
            device,
            credential,
            proxy,
        };
        let connection = connector.connect(&target, timeout).await?;
        let raw = connection.execute(&command).await?;
        normalize_output(&raw)
    };

    let result = match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout(timeout)),
    };
    if let Err(e) = &result {
        debug!("Device {} failed: {}", device_id, e);
    }
    result
}

struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
