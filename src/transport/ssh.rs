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

//! SSH transport for network operating systems.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{with_connect_timeout, Connection, Connector, DeviceTarget};
use crate::config::Settings;
use crate::shared::error::DeviceError;
use crate::ssh::auth::auth_strategy_for;
use crate::ssh::known_hosts::{get_check_method, HostKeyPolicy};
use crate::ssh::proxy::{connect_via_proxy, Hop, ProxiedClient};
use crate::ssh::tokio_client::{self, Client, CommandExecutedResult, ServerCheckMethod};

/// Opens SSH sessions, directly or through a proxy.
#[derive(Debug, Clone)]
pub struct SshConnector {
    server_check: ServerCheckMethod,
}

impl SshConnector {
    pub fn new(server_check: ServerCheckMethod) -> Self {
        Self { server_check }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        if settings.host_key_policy == HostKeyPolicy::InsecureAcceptAny {
            warn!("Host key verification is disabled (host_key_policy = insecure-accept-any)");
        }
        Self::new(get_check_method(
            settings.host_key_policy,
            settings.known_hosts_file.as_deref(),
        ))
    }

    async fn open(&self, target: &DeviceTarget) -> Result<SshSession, DeviceError> {
        let device = &target.device;
        let strategy = auth_strategy_for(target.credential.clone());
        let auth = strategy.backend()?;

        let session = match &target.proxy {
            None => {
                debug!("Connecting to {} as {}", device, strategy.username());
                let client = Client::connect(
                    (device.address.as_str(), device.port),
                    strategy.username(),
                    auth,
                    self.server_check.clone(),
                )
                .await
                .map_err(connection_error)?;
                SshSession::Direct(client)
            }
            Some(proxy) => {
                let proxy_strategy = auth_strategy_for(proxy.credential.clone());
                let proxy_auth = proxy_strategy.backend()?;
                debug!(
                    "Connecting to {} as {} via proxy {}",
                    device,
                    strategy.username(),
                    proxy.descriptor.id
                );
                let client = connect_via_proxy(
                    Hop {
                        host: &proxy.descriptor.address,
                        port: proxy.descriptor.port,
                        username: proxy_strategy.username(),
                        auth: proxy_auth,
                    },
                    Hop {
                        host: &device.address,
                        port: device.port,
                        username: strategy.username(),
                        auth,
                    },
                    self.server_check.clone(),
                )
                .await
                .map_err(connection_error)?;
                SshSession::Proxied(client)
            }
        };

        Ok(session)
    }
}

fn connection_error(e: tokio_client::Error) -> DeviceError {
    DeviceError::connection(e.kind(), e.to_string())
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        target: &DeviceTarget,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, DeviceError> {
        let what = format!("SSH connection to {}", target.device.socket_address());
        let session = with_connect_timeout(timeout, &what, self.open(target)).await?;
        Ok(Box::new(SshConnection {
            device_id: target.device.id.clone(),
            session,
        }))
    }
}

#[derive(Debug)]
enum SshSession {
    Direct(Client),
    Proxied(ProxiedClient),
}

impl SshSession {
    fn client(&self) -> &Client {
        match self {
            SshSession::Direct(client) => client,
            SshSession::Proxied(proxied) => &proxied.device,
        }
    }

    async fn disconnect(&self) -> Result<(), tokio_client::Error> {
        match self {
            SshSession::Direct(client) => client.disconnect().await,
            SshSession::Proxied(proxied) => proxied.disconnect().await,
        }
    }
}

/// An authenticated SSH session to one device.
#[derive(Debug)]
pub struct SshConnection {
    device_id: String,
    session: SshSession,
}

#[async_trait]
impl Connection for SshConnection {
    async fn execute(self: Box<Self>, command: &str) -> Result<Vec<u8>, DeviceError> {
        debug!("Executing on {}: {}", self.device_id, command);
        let result = self.session.client().execute(command).await;

        if let Err(e) = self.session.disconnect().await {
            debug!("Disconnect from {} failed: {}", self.device_id, e);
        }

        let result = result.map_err(|e| DeviceError::Execution(e.to_string()))?;
        command_output(result)
    }
}

/// A non-zero exit with no stdout surfaces stderr as the failure.
fn command_output(result: CommandExecutedResult) -> Result<Vec<u8>, DeviceError> {
    if result.exit_status != 0 && result.stdout.is_empty() {
        let stderr = result.stderr_lossy();
        let detail = if stderr.trim().is_empty() {
            format!("command exited with status {}", result.exit_status)
        } else {
            stderr.trim().to_string()
        };
        return Err(DeviceError::Execution(detail));
    }
    Ok(result.stdout)
}
