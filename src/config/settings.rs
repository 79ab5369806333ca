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

//! Global engine settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::messages::Messages;
use crate::cache::DEFAULT_OPERATION_TIMEOUT;
use crate::ssh::known_hosts::HostKeyPolicy;

/// Default upper bound for one device's connect + execute, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
/// Default lifetime of a cached response, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 120;

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound for one device's connect + execute. Seconds in YAML,
    /// fractions allowed.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    /// Overrides `~/.ssh/known_hosts`.
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,

    #[serde(default)]
    pub http_agent: HttpAgentSettings,

    #[serde(default)]
    pub messages: Messages,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            cache: CacheSettings::default(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_file: None,
            http_agent: HttpAgentSettings::default(),
            messages: Messages::default(),
        }
    }
}

impl Settings {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound for one store read or write. Seconds in YAML.
    #[serde(default = "default_operation_timeout", with = "duration_secs")]
    pub operation_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            enabled: true,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// HTTP agent transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAgentSettings {
    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for HttpAgentSettings {
    fn default() -> Self {
        Self {
            use_tls: true,
            accept_invalid_certs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout, Duration::from_secs(90));
        assert_eq!(settings.cache.ttl(), Duration::from_secs(120));
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.operation_timeout, Duration::from_secs(5));
        assert_eq!(settings.host_key_policy, HostKeyPolicy::Strict);
        assert!(settings.http_agent.use_tls);
    }

    #[test]
    fn test_settings_from_partial_yaml() {
        let yaml = r#"
request_timeout: 15
cache:
  ttl_secs: 30
  operation_timeout: 1.5
host_key_policy: accept-new
known_hosts_file: /etc/lookglass/known_hosts
messages:
  request_timeout: "Device did not answer in time."
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.cache.ttl_secs, 30);
        assert_eq!(settings.cache.operation_timeout, Duration::from_millis(1500));
        assert!(settings.cache.enabled);
        assert_eq!(settings.host_key_policy, HostKeyPolicy::AcceptNew);
        assert_eq!(
            settings.known_hosts_file,
            Some(PathBuf::from("/etc/lookglass/known_hosts"))
        );
        assert_eq!(settings.messages.request_timeout, "Device did not answer in time.");
        assert_eq!(settings.messages.unknown_error, "Something went wrong.");
    }

    #[test]
    fn test_fractional_request_timeout() {
        let settings: Settings = serde_yaml::from_str("request_timeout: 0.25").unwrap();
        assert_eq!(settings.request_timeout, Duration::from_millis(250));
        assert!(serde_yaml::from_str::<Settings>("request_timeout: -1").is_err());
    }
}
