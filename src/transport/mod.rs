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

//! Device connections.
//!
//! A [`Connector`] opens one [`Connection`] per device per query. Running a
//! command consumes the connection, so a session can never be reused or
//! leaked past the command it was opened for.

pub mod http;
pub mod ssh;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::inventory::{CredentialMaterial, DeviceDescriptor, ProxyDescriptor, TransportKind};
use crate::shared::error::{ConnectionErrorKind, DeviceError};

pub use http::HttpAgentConnector;
pub use ssh::SshConnector;

/// A proxy and the credential used to log in to it.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub descriptor: ProxyDescriptor,
    pub credential: Arc<CredentialMaterial>,
}

/// Everything needed to open a session to one device.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    pub device: DeviceDescriptor,
    pub credential: Arc<CredentialMaterial>,
    pub proxy: Option<ProxyTarget>,
}

/// Opens sessions to devices.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and authenticate a session, bounded by `timeout`.
    async fn connect(
        &self,
        target: &DeviceTarget,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, DeviceError>;
}

/// One open session to a device.
#[async_trait]
pub trait Connection: Send {
    /// Run `command` and return its raw output. The session is closed before
    /// this returns, whatever the outcome.
    async fn execute(self: Box<Self>, command: &str) -> Result<Vec<u8>, DeviceError>;
}

/// Routes each device to the SSH or HTTP agent connector by platform.
#[derive(Debug, Clone)]
pub struct PlatformConnector {
    ssh: SshConnector,
    http: HttpAgentConnector,
}

impl PlatformConnector {
    pub fn new(ssh: SshConnector, http: HttpAgentConnector) -> Self {
        Self { ssh, http }
    }

    /// Build both connectors from global settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, DeviceError> {
        Ok(Self {
            ssh: SshConnector::from_settings(settings),
            http: HttpAgentConnector::from_settings(settings)?,
        })
    }
}

#[async_trait]
impl Connector for PlatformConnector {
    async fn connect(
        &self,
        target: &DeviceTarget,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, DeviceError> {
        match target.device.platform.transport() {
            TransportKind::Ssh => self.ssh.connect(target, timeout).await,
            TransportKind::HttpAgent => self.http.connect(target, timeout).await,
        }
    }
}

/// Run `future` under `timeout`, reporting expiry as a connection timeout.
pub(crate) async fn with_connect_timeout<T, F>(
    timeout: Duration,
    what: &str,
    future: F,
) -> Result<T, DeviceError>
where
    F: std::future::Future<Output = Result<T, DeviceError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::connection(
            ConnectionErrorKind::Timeout,
            format!("{what} after {}s", timeout.as_secs_f64()),
        )),
    }
}
