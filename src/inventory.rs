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

//! Device inventory model consumed by the query engine.
//!
//! The engine never stores inventory itself. It receives resolved
//! [`DeviceDescriptor`]s, [`CredentialMaterial`] and [`ProxyDescriptor`]s
//! through the [`Inventory`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::shared::error::{AuthConfigError, InventoryError};

/// Network operating system running on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    CiscoIos,
    CiscoXr,
    Juniper,
    AristaEos,
    Huawei,
    Frr,
    Bird,
}

/// Management channel used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Ssh,
    HttpAgent,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::CiscoIos,
        Platform::CiscoXr,
        Platform::Juniper,
        Platform::AristaEos,
        Platform::Huawei,
        Platform::Frr,
        Platform::Bird,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::CiscoIos => "cisco_ios",
            Platform::CiscoXr => "cisco_xr",
            Platform::Juniper => "juniper",
            Platform::AristaEos => "arista_eos",
            Platform::Huawei => "huawei",
            Platform::Frr => "frr",
            Platform::Bird => "bird",
        }
    }

    /// Routing daemons on Linux hosts are reached through the HTTP agent.
    pub fn transport(&self) -> TransportKind {
        match self {
            Platform::Frr | Platform::Bird => TransportKind::HttpAgent,
            _ => TransportKind::Ssh,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self.transport() {
            TransportKind::Ssh => 22,
            TransportKind::HttpAgent => 8080,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unsupported platform '{s}'"))
    }
}

/// A device the engine can query. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: String,
    /// Display name used as the section heading in aggregated output.
    pub name: String,
    pub address: String,
    pub port: u16,
    pub platform: Platform,
    pub credential: String,
    pub proxy: Option<String>,
    pub source_v4: Option<Ipv4Addr>,
    pub source_v6: Option<Ipv6Addr>,
}

impl DeviceDescriptor {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        platform: Platform,
        credential: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            address: address.into(),
            port: platform.default_port(),
            platform,
            credential: credential.into(),
            proxy: None,
            source_v4: None,
            source_v6: None,
        }
    }

    /// `address:port`, with IPv6 literals bracketed.
    pub fn socket_address(&self) -> String {
        format_socket_address(&self.address, self.port)
    }

    /// Source address matching the family of `target`, if configured.
    pub fn source_for(&self, target: &IpAddr) -> Option<IpAddr> {
        match target {
            IpAddr::V4(_) => self.source_v4.map(IpAddr::V4),
            IpAddr::V6(_) => self.source_v6.map(IpAddr::V6),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.socket_address())
    }
}

/// SSH bastion a device session is tunnelled through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub credential: String,
}

impl ProxyDescriptor {
    pub fn socket_address(&self) -> String {
        format_socket_address(&self.address, self.port)
    }
}

pub(crate) fn format_socket_address(address: &str, port: u16) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}

/// How a credential authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    Password,
    Key,
}

impl FromStr for CredentialMode {
    type Err = AuthConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" => Ok(CredentialMode::Password),
            "key" | "unencrypted_key" | "encrypted_key" => Ok(CredentialMode::Key),
            other => Err(AuthConfigError::UnsupportedMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Resolved secret material for one credential.
///
/// Secrets are zeroed when the last `Arc` holding them is dropped.
#[derive(Clone)]
pub struct CredentialMaterial {
    pub mode: CredentialMode,
    pub username: String,
    pub password: Option<Zeroizing<String>>,
    pub private_key: Option<Zeroizing<String>>,
    pub key_passphrase: Option<Zeroizing<String>>,
}

impl CredentialMaterial {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mode: CredentialMode::Password,
            username: username.into(),
            password: Some(Zeroizing::new(password.into())),
            private_key: None,
            key_passphrase: None,
        }
    }

    pub fn key(
        username: impl Into<String>,
        private_key: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            mode: CredentialMode::Key,
            username: username.into(),
            password: None,
            private_key: Some(Zeroizing::new(private_key.into())),
            key_passphrase: passphrase.map(Zeroizing::new),
        }
    }
}

impl fmt::Debug for CredentialMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialMaterial")
            .field("mode", &self.mode)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Source of devices, credentials, proxies and global settings.
///
/// Implemented by [`crate::config::StaticInventory`] for YAML configuration;
/// a boundary layer backed by a database implements it the same way.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Resolve the given ids. Unknown ids are omitted from the result.
    async fn resolve_devices(&self, ids: &[String])
        -> Result<Vec<DeviceDescriptor>, InventoryError>;

    async fn resolve_credential(
        &self,
        reference: &str,
    ) -> Result<Arc<CredentialMaterial>, InventoryError>;

    async fn resolve_proxy(&self, reference: &str) -> Result<ProxyDescriptor, InventoryError>;

    fn settings(&self) -> &Settings;
}
