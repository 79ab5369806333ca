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

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lookglass::cache::CacheStore;
use lookglass::config::{Settings, StaticInventory};
use lookglass::inventory::{CredentialMaterial, DeviceDescriptor, Platform, ProxyDescriptor};
use lookglass::query::{
    QueryDispatcher, QueryRequest, QueryType, RawQueryRequest, ResponseFormat,
};
use lookglass::shared::error::{ConnectionErrorKind, DeviceError, QueryError};
use lookglass::transport::{Connection, Connector, DeviceTarget};

#[derive(Clone)]
enum Behaviour {
    Output(&'static str),
    Refuse,
    Hang,
}

/// Connector that scripts each device's behaviour and records what ran.
#[derive(Clone, Default)]
struct MockConnector {
    behaviours: HashMap<String, (Duration, Behaviour)>,
    log: Arc<MockLog>,
}

#[derive(Default)]
struct MockLog {
    executions: Mutex<Vec<(String, String)>>,
    proxies: Mutex<Vec<String>>,
}

impl MockConnector {
    fn device(mut self, id: &str, delay: Duration, behaviour: Behaviour) -> Self {
        self.behaviours.insert(id.to_string(), (delay, behaviour));
        self
    }

    fn executions_for(&self, id: &str) -> usize {
        self.log
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|(device, _)| device == id)
            .count()
    }

    fn commands(&self) -> Vec<(String, String)> {
        self.log.executions.lock().unwrap().clone()
    }

    fn proxies(&self) -> Vec<String> {
        self.log.proxies.lock().unwrap().clone()
    }
}

struct MockConnection {
    device: String,
    delay: Duration,
    behaviour: Behaviour,
    log: Arc<MockLog>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &DeviceTarget,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, DeviceError> {
        if let Some(proxy) = &target.proxy {
            self.log
                .proxies
                .lock()
                .unwrap()
                .push(proxy.descriptor.id.clone());
        }
        let (delay, behaviour) = self
            .behaviours
            .get(&target.device.id)
            .cloned()
            .unwrap_or((Duration::ZERO, Behaviour::Output("ok")));
        if let Behaviour::Refuse = behaviour {
            return Err(DeviceError::connection(
                ConnectionErrorKind::Refused,
                target.device.socket_address(),
            ));
        }
        Ok(Box::new(MockConnection {
            device: target.device.id.clone(),
            delay,
            behaviour,
            log: Arc::clone(&self.log),
        }))
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(self: Box<Self>, command: &str) -> Result<Vec<u8>, DeviceError> {
        self.log
            .executions
            .lock()
            .unwrap()
            .push((self.device.clone(), command.to_string()));
        match self.behaviour {
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            Behaviour::Output(text) => {
                tokio::time::sleep(self.delay).await;
                Ok(text.as_bytes().to_vec())
            }
            Behaviour::Refuse => unreachable!(),
        }
    }
}

fn inventory(timeout: Duration) -> StaticInventory {
    let mut ams = DeviceDescriptor::new("ams1", "ams1.example.net", Platform::CiscoXr, "lg");
    ams.name = "Amsterdam".to_string();
    ams.proxy = Some("bastion".to_string());

    StaticInventory::new(Settings::default().with_request_timeout(timeout))
        .with_credential("lg", CredentialMaterial::password("lg", "secret"))
        .with_credential("jump", CredentialMaterial::password("jump", "secret"))
        .with_proxy(ProxyDescriptor {
            id: "bastion".to_string(),
            address: "bastion.example.net".to_string(),
            port: 22,
            credential: "jump".to_string(),
        })
        .with_device(DeviceDescriptor::new("fra1", "192.0.2.1", Platform::Juniper, "lg"))
        .with_device(ams)
        .with_device(DeviceDescriptor::new("lon1", "192.0.2.3", Platform::AristaEos, "lg"))
}

fn dispatcher(connector: &MockConnector, timeout: Duration) -> QueryDispatcher {
    let cache = CacheStore::new(Duration::from_secs(60)).unwrap();
    dispatcher_with_cache(connector, cache)
}

fn dispatcher_with_cache(connector: &MockConnector, cache: CacheStore) -> QueryDispatcher {
    QueryDispatcher::new(
        Arc::new(inventory(Duration::from_secs(5))),
        Arc::new(connector.clone()),
        Some(cache),
    )
}

#[tokio::test]
async fn test_repeat_query_is_served_from_cache() {
    let connector = MockConnector::default().device(
        "fra1",
        Duration::ZERO,
        Behaviour::Output("192.0.2.0/24 via 198.51.100.1\r\n"),
    );
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));
    let request = QueryRequest::new(["fra1"], "192.0.2.0/24", QueryType::BgpRoute).unwrap();

    let first = dispatcher.run_query(&request).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.format, ResponseFormat::PlainText);
    assert_eq!(first.output, "192.0.2.0/24 via 198.51.100.1");

    let second = dispatcher.run_query(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.runtime, 0.0);
    assert_eq!(second.output, first.output);
    assert_eq!(second.timestamp, first.timestamp);
    assert_ne!(second.random, first.random);

    assert_eq!(connector.executions_for("fra1"), 1);
    let (_, command) = &connector.commands()[0];
    assert!(command.contains("192.0.2.0/24"));
}

#[tokio::test]
async fn test_device_order_shares_cache_entry() {
    let connector = MockConnector::default();
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));

    let forward = QueryRequest::new(["fra1", "lon1"], "192.0.2.9", QueryType::Ping).unwrap();
    let reverse = QueryRequest::new(["lon1", "fra1"], "192.0.2.9", QueryType::Ping).unwrap();
    assert_eq!(forward.fingerprint(), reverse.fingerprint());

    assert!(!dispatcher.run_query(&forward).await.unwrap().cached);
    assert!(dispatcher.run_query(&reverse).await.unwrap().cached);
    assert_eq!(connector.commands().len(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_queries_execute_once() {
    let connector = MockConnector::default()
        .device("fra1", Duration::from_millis(200), Behaviour::Output("one"))
        .device("lon1", Duration::from_millis(200), Behaviour::Output("two"));
    let dispatcher = Arc::new(dispatcher(&connector, Duration::from_secs(5)));
    let request = QueryRequest::new(["fra1", "lon1"], "192.0.2.1", QueryType::Traceroute).unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let dispatcher = Arc::clone(&dispatcher);
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.run_query(&request).await
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().unwrap().output);
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(connector.executions_for("fra1"), 1);
    assert_eq!(connector.executions_for("lon1"), 1);
}

#[tokio::test]
async fn test_timeout_is_isolated_per_device() {
    let connector = MockConnector::default()
        .device("fra1", Duration::from_millis(10), Behaviour::Output("fast"))
        .device("lon1", Duration::ZERO, Behaviour::Hang);
    let dispatcher = dispatcher(&connector, Duration::from_millis(300));
    let request = QueryRequest::new(["fra1", "lon1"], "192.0.2.1", QueryType::Ping)
        .unwrap()
        .with_format(ResponseFormat::Json);

    let started = std::time::Instant::now();
    let response = dispatcher.run_query(&request).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!response.cached);

    let body: serde_json::Value = serde_json::from_str(&response.output).unwrap();
    assert_eq!(body["fra1"]["output"], "fast");
    assert_eq!(body["lon1"]["error"], "Request timed out.");

    // Partial failures are not cached.
    let again = dispatcher.run_query(&request).await.unwrap();
    assert!(!again.cached);
}

#[tokio::test]
async fn test_unreachable_device_reports_connection_error() {
    let connector = MockConnector::default()
        .device("fra1", Duration::ZERO, Behaviour::Output("route"))
        .device("ams1", Duration::ZERO, Behaviour::Refuse);
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));
    let request = QueryRequest::new(["ams1", "fra1"], "192.0.2.0/24", QueryType::BgpRoute).unwrap();

    let response = dispatcher.run_query(&request).await.unwrap();
    assert!(!response.cached);
    assert!(response.output.starts_with("=== Amsterdam ===\nError connecting to Amsterdam"));
    assert!(response.output.contains("=== fra1 ===\nroute"));
    assert_eq!(connector.proxies(), ["bastion"]);
    assert_eq!(dispatcher.cache().unwrap().stats().writes, 0);
}

#[tokio::test]
async fn test_unknown_device_is_reported_not_fatal() {
    let connector = MockConnector::default();
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));
    let request = QueryRequest::new(["ghost", "fra1"], "192.0.2.1", QueryType::Ping)
        .unwrap()
        .with_format(ResponseFormat::Json);

    let response = dispatcher.run_query(&request).await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&response.output).unwrap();
    assert_eq!(body["ghost"]["error"], "ghost is not a known device.");
    assert_eq!(body["fra1"]["output"], "ok");
}

#[tokio::test]
async fn test_empty_output_uses_empty_response_message() {
    let connector =
        MockConnector::default().device("fra1", Duration::ZERO, Behaviour::Output(" \n"));
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));
    let request = QueryRequest::new(["fra1"], "192.0.2.1", QueryType::Ping).unwrap();

    let response = dispatcher.run_query(&request).await.unwrap();
    assert_eq!(response.output, "The query completed, but no results were found.");
}

#[tokio::test]
async fn test_cancel_aborts_query() {
    let connector = MockConnector::default().device("fra1", Duration::ZERO, Behaviour::Hang);
    let dispatcher = dispatcher(&connector, Duration::from_secs(60));
    let request = QueryRequest::new(["fra1"], "192.0.2.1", QueryType::Ping).unwrap();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.run_query_with_cancel(&request, cancel),
    )
    .await
    .unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
    assert_eq!(err.http_status(), 499);
}

#[tokio::test]
async fn test_raw_request_validation() {
    let connector = MockConnector::default();
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));

    let raw: RawQueryRequest = serde_json::from_str(
        r#"{"query_location": ["fra1"], "query_target": "not-an-ip", "query_type": "bgp-route"}"#,
    )
    .unwrap();
    let err = dispatcher.run_raw_query(raw).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn test_without_cache_every_query_executes() {
    let connector = MockConnector::default();
    let dispatcher = QueryDispatcher::new(
        Arc::new(inventory(Duration::from_secs(5))),
        Arc::new(connector.clone()),
        None,
    );
    let request = QueryRequest::new(["fra1"], "192.0.2.1", QueryType::Ping).unwrap();

    for _ in 0..2 {
        assert!(!dispatcher.run_query(&request).await.unwrap().cached);
    }
    assert_eq!(connector.executions_for("fra1"), 2);
}

#[tokio::test]
async fn test_query_arriving_as_flight_lands_executes_once() {
    // The second query starts around the moment the first one completes,
    // between its cache write and the release of its in-flight entry.
    let mut trials = 0;
    for offset_us in (15_000..=25_000).step_by(500) {
        let connector = MockConnector::default().device(
            "fra1",
            Duration::from_millis(20),
            Behaviour::Output("route"),
        );
        let dispatcher = Arc::new(dispatcher(&connector, Duration::from_secs(5)));
        let request = QueryRequest::new(["fra1"], "192.0.2.0/24", QueryType::BgpRoute).unwrap();

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            let request = request.clone();
            tokio::spawn(async move { dispatcher.run_query(&request).await })
        };
        tokio::time::sleep(Duration::from_micros(offset_us)).await;
        let second = dispatcher.run_query(&request).await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(first.output, "route");
        assert_eq!(second.output, "route");
        assert_eq!(
            connector.executions_for("fra1"),
            1,
            "duplicate execution with the second query {offset_us}us behind"
        );
        trials += 1;
    }
    assert_eq!(trials, 21);
}

#[tokio::test]
async fn test_unreadable_cache_entry_falls_back_to_execution() {
    let connector =
        MockConnector::default().device("fra1", Duration::ZERO, Behaviour::Output("route"));
    let dispatcher = dispatcher(&connector, Duration::from_secs(5));
    let request = QueryRequest::new(["fra1"], "192.0.2.0/24", QueryType::BgpRoute).unwrap();

    let key = request.fingerprint().cache_key();
    let cache = dispatcher.cache().unwrap();
    cache.set(&key, &"not a cached response").await.unwrap();

    let first = dispatcher.run_query(&request).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.output, "route");
    assert_eq!(connector.executions_for("fra1"), 1);

    // The fresh result replaced the unreadable entry.
    let second = dispatcher.run_query(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(connector.executions_for("fra1"), 1);
}

#[tokio::test]
async fn test_stalled_cache_does_not_fail_queries() {
    let connector =
        MockConnector::default().device("fra1", Duration::ZERO, Behaviour::Output("route"));
    let cache = CacheStore::new(Duration::from_secs(60))
        .unwrap()
        .with_operation_timeout(Duration::ZERO);
    let dispatcher = dispatcher_with_cache(&connector, cache);
    let request = QueryRequest::new(["fra1"], "192.0.2.1", QueryType::Ping).unwrap();

    let first = dispatcher.run_query(&request).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.output, "route");

    let second = dispatcher.run_query(&request).await.unwrap();
    assert_eq!(second.output, "route");
}

#[tokio::test]
async fn test_expired_response_is_executed_again() {
    let connector =
        MockConnector::default().device("fra1", Duration::ZERO, Behaviour::Output("route"));
    let cache = CacheStore::new(Duration::from_millis(150)).unwrap();
    let dispatcher = dispatcher_with_cache(&connector, cache);
    let request = QueryRequest::new(["fra1"], "192.0.2.0/24", QueryType::BgpRoute).unwrap();

    assert!(!dispatcher.run_query(&request).await.unwrap().cached);
    assert!(dispatcher.run_query(&request).await.unwrap().cached);
    assert_eq!(connector.executions_for("fra1"), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after = dispatcher.run_query(&request).await.unwrap();
    assert!(!after.cached);
    assert_eq!(after.output, "route");
    assert_eq!(connector.executions_for("fra1"), 2);
}
