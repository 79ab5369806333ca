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

//! Response envelope returned to the boundary layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Wire format of the aggregated output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseFormat {
    #[default]
    #[serde(rename = "text/plain")]
    PlainText,
    #[serde(rename = "application/json")]
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::PlainText => "text/plain",
            ResponseFormat::Json => "application/json",
        }
    }
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainQueryResponse {
    /// Correlation id, unique per response even when served from cache.
    pub random: Uuid,
    pub cached: bool,
    /// Seconds spent executing; `0.0` for cache hits.
    pub runtime: f64,
    /// When the output was produced (RFC 3339, UTC).
    pub timestamp: DateTime<Utc>,
    pub format: ResponseFormat,
    pub output: String,
}

impl PlainQueryResponse {
    /// A freshly executed response.
    pub fn new(format: ResponseFormat, output: String, runtime: Duration) -> Self {
        Self {
            random: Uuid::new_v4(),
            cached: false,
            runtime: runtime.as_secs_f64(),
            timestamp: Utc::now(),
            format,
            output,
        }
    }

    /// Rebuild a response from a cache entry. Keeps the original timestamp.
    pub fn from_cache(entry: CachedResponse) -> Self {
        Self {
            random: Uuid::new_v4(),
            cached: true,
            runtime: 0.0,
            timestamp: entry.timestamp,
            format: entry.format,
            output: entry.output,
        }
    }

    /// The part of this response worth caching.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            output: self.output.clone(),
            format: self.format,
            timestamp: self.timestamp,
        }
    }
}

/// Value stored in the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub output: String,
    pub format: ResponseFormat,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResponseFormat::Json).unwrap(),
            "\"application/json\""
        );
        let fmt: ResponseFormat = serde_json::from_str("\"text/plain\"").unwrap();
        assert_eq!(fmt, ResponseFormat::PlainText);
        assert_eq!(ResponseFormat::default().as_str(), "text/plain");
    }

    #[test]
    fn test_cache_hit_keeps_timestamp_and_output() {
        let fresh = PlainQueryResponse::new(
            ResponseFormat::PlainText,
            "route 192.0.2.0/24".to_string(),
            Duration::from_millis(1500),
        );
        assert!(!fresh.cached);
        assert_eq!(fresh.runtime, 1.5);

        let hit = PlainQueryResponse::from_cache(fresh.to_cached());
        assert!(hit.cached);
        assert_eq!(hit.runtime, 0.0);
        assert_eq!(hit.output, fresh.output);
        assert_eq!(hit.timestamp, fresh.timestamp);
        assert_ne!(hit.random, fresh.random);
    }

    #[test]
    fn test_response_serializes_rfc3339() {
        let response =
            PlainQueryResponse::new(ResponseFormat::PlainText, "ok".to_string(), Duration::ZERO);
        let value = serde_json::to_value(&response).unwrap();
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert_eq!(value["format"], "text/plain");
        assert_eq!(value["cached"], false);
    }
}
