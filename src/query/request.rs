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

//! Validated query requests and their cache fingerprints.

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::response::ResponseFormat;
use crate::shared::error::ValidationError;
use crate::shared::validation::validate_identifier;

/// Prefix of every cache key derived from a fingerprint.
pub const CACHE_KEY_PREFIX: &str = "lookglass.query.";

/// Kind of lookup a device performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[serde(alias = "bgp-route")]
    BgpRoute,
    Ping,
    Traceroute,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::BgpRoute => "bgp_route",
            QueryType::Ping => "ping",
            QueryType::Traceroute => "traceroute",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bgp_route" | "bgp-route" => Ok(QueryType::BgpRoute),
            "ping" => Ok(QueryType::Ping),
            "traceroute" => Ok(QueryType::Traceroute),
            other => Err(ValidationError::new(
                "query_type",
                format!("'{other}' is not a supported query type"),
            )),
        }
    }
}

/// An IP address or CIDR block a query is run against.
///
/// A bare address is a host network (`/32` or `/128`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryTarget(IpNetwork);

impl QueryTarget {
    pub fn network(&self) -> IpNetwork {
        self.0
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }

    pub fn is_host(&self) -> bool {
        let max = if self.0.is_ipv4() { 32 } else { 128 };
        self.0.prefix() == max
    }

    /// Bare address for host networks, `addr/prefix` otherwise.
    pub fn normalized(&self) -> String {
        if self.is_host() {
            self.0.ip().to_string()
        } else {
            format!("{}/{}", self.0.ip(), self.0.prefix())
        }
    }
}

impl FromStr for QueryTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::empty("target"));
        }
        s.parse::<IpNetwork>().map(QueryTarget).map_err(|_| {
            ValidationError::new("target", format!("'{s}' is not an IP address or CIDR block"))
        })
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl Serialize for QueryTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

/// Wire form of a request before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQueryRequest {
    #[serde(alias = "query_location")]
    pub devices: Vec<String>,
    #[serde(alias = "query_target")]
    pub target: String,
    pub query_type: QueryType,
    #[serde(default)]
    pub format: ResponseFormat,
}

/// A validated query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryRequest")]
pub struct QueryRequest {
    devices: Vec<String>,
    target: QueryTarget,
    query_type: QueryType,
    format: ResponseFormat,
}

impl QueryRequest {
    /// Validate and build a request.
    ///
    /// Device ids are de-duplicated, keeping the first occurrence so the
    /// aggregated output follows request order.
    pub fn new<I, S>(
        devices: I,
        target: &str,
        query_type: QueryType,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = Vec::new();
        for device in devices {
            let id = validate_identifier("devices", device.as_ref())?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(ValidationError::empty("devices"));
        }

        let target: QueryTarget = target.parse()?;
        if matches!(query_type, QueryType::Ping | QueryType::Traceroute) && !target.is_host() {
            return Err(ValidationError::new(
                "target",
                format!("{query_type} requires a single host address"),
            ));
        }

        Ok(Self {
            devices: ids,
            target,
            query_type,
            format: ResponseFormat::default(),
        })
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn target(&self) -> &QueryTarget {
        &self.target
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Content address of this request, independent of device order.
    pub fn fingerprint(&self) -> QueryFingerprint {
        let mut devices: Vec<&str> = self.devices.iter().map(String::as_str).collect();
        devices.sort_unstable();
        devices.dedup();

        let mut hasher = Sha256::new();
        hasher.update(b"devices=");
        hasher.update(devices.join(",").as_bytes());
        hasher.update(b";target=");
        hasher.update(self.target.normalized().as_bytes());
        hasher.update(b";type=");
        hasher.update(self.query_type.as_str().as_bytes());
        hasher.update(b";format=");
        hasher.update(self.format.as_str().as_bytes());

        QueryFingerprint(format!("{:x}", hasher.finalize()))
    }
}

impl TryFrom<RawQueryRequest> for QueryRequest {
    type Error = ValidationError;

    fn try_from(raw: RawQueryRequest) -> Result<Self, Self::Error> {
        Ok(QueryRequest::new(&raw.devices, &raw.target, raw.query_type)?.with_format(raw.format))
    }
}

/// SHA-256 hex digest identifying a logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the response is stored in the cache.
    pub fn cache_key(&self) -> String {
        format!("{CACHE_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_normalization() {
        let host: QueryTarget = "192.0.2.1".parse().unwrap();
        assert!(host.is_host());
        assert_eq!(host.normalized(), "192.0.2.1");

        let host32: QueryTarget = "192.0.2.1/32".parse().unwrap();
        assert_eq!(host32.normalized(), "192.0.2.1");

        let net: QueryTarget = "192.0.2.1/24".parse().unwrap();
        assert_eq!(net.normalized(), "192.0.2.1/24");

        let v6: QueryTarget = " 2001:db8::/48 ".parse().unwrap();
        assert!(!v6.is_ipv4());
        assert_eq!(v6.normalized(), "2001:db8::/48");
    }

    #[test]
    fn test_target_rejects_garbage() {
        assert!("".parse::<QueryTarget>().is_err());
        assert!("example.com".parse::<QueryTarget>().is_err());
        assert!("192.0.2.1/33".parse::<QueryTarget>().is_err());
    }

    #[test]
    fn test_request_validation() {
        let empty: Vec<&str> = Vec::new();
        let err = QueryRequest::new(empty, "192.0.2.1", QueryType::Ping).unwrap_err();
        assert_eq!(err.field, "devices");

        let err = QueryRequest::new(["r1"], "not-an-ip", QueryType::BgpRoute).unwrap_err();
        assert_eq!(err.field, "target");

        let err = QueryRequest::new(["r1"], "192.0.2.0/24", QueryType::Ping).unwrap_err();
        assert!(err.message.contains("single host"));

        assert!(QueryRequest::new(["r1"], "192.0.2.0/24", QueryType::BgpRoute).is_ok());
    }

    #[test]
    fn test_request_dedups_in_order() {
        let req = QueryRequest::new(["r2", "r1", "r2"], "192.0.2.1", QueryType::Ping).unwrap();
        assert_eq!(req.devices(), ["r2".to_string(), "r1".to_string()]);
    }

    #[test]
    fn test_fingerprint_ignores_device_order() {
        let a = QueryRequest::new(["r1", "r2"], "192.0.2.1", QueryType::Ping).unwrap();
        let b = QueryRequest::new(["r2", "r1", "r1"], "192.0.2.1/32", QueryType::Ping).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 64);
        assert!(a.fingerprint().cache_key().starts_with(CACHE_KEY_PREFIX));
    }

    #[test]
    fn test_fingerprint_distinguishes_queries() {
        let base = QueryRequest::new(["r1"], "192.0.2.1", QueryType::Ping).unwrap();
        let other_type = QueryRequest::new(["r1"], "192.0.2.1", QueryType::Traceroute).unwrap();
        let other_target = QueryRequest::new(["r1"], "192.0.2.2", QueryType::Ping).unwrap();
        let other_format = base.clone().with_format(ResponseFormat::Json);

        assert_ne!(base.fingerprint(), other_type.fingerprint());
        assert_ne!(base.fingerprint(), other_target.fingerprint());
        assert_ne!(base.fingerprint(), other_format.fingerprint());
    }

    #[test]
    fn test_request_deserialize() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"devices": ["r1"], "target": "2001:db8::/32", "query_type": "bgp-route"}"#,
        )
        .unwrap();
        assert_eq!(req.query_type(), QueryType::BgpRoute);
        assert_eq!(req.format(), ResponseFormat::PlainText);

        let bad = serde_json::from_str::<QueryRequest>(
            r#"{"devices": [], "target": "192.0.2.1", "query_type": "ping"}"#,
        );
        assert!(bad.is_err());
    }
}
