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

//! SSH sessions tunnelled through a bastion host.

use tracing::debug;

use super::tokio_client::{AuthMethod, Client, Config, Error, ServerCheckMethod};

/// Address and login for one SSH hop.
#[derive(Debug, Clone)]
pub struct Hop<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: &'a str,
    pub auth: AuthMethod,
}

/// A device session and the proxy session carrying it.
///
/// The proxy must outlive the device session, so both are owned together
/// and torn down together.
#[derive(Debug)]
pub struct ProxiedClient {
    pub device: Client,
    pub proxy: Client,
}

impl ProxiedClient {
    /// Disconnect the device session, then the proxy.
    pub async fn disconnect(&self) -> Result<(), Error> {
        let device_result = self.device.disconnect().await;
        let proxy_result = self.proxy.disconnect().await;
        device_result.and(proxy_result)
    }
}

/// Connect to `proxy`, open a `direct-tcpip` channel to `device` and run the
/// device's SSH handshake over it.
pub async fn connect_via_proxy(
    proxy: Hop<'_>,
    device: Hop<'_>,
    server_check: ServerCheckMethod,
) -> Result<ProxiedClient, Error> {
    debug!(
        "Connecting to proxy {}:{} as {}",
        proxy.host, proxy.port, proxy.username
    );
    let proxy_client = Client::connect(
        (proxy.host, proxy.port),
        proxy.username,
        proxy.auth,
        server_check.clone(),
    )
    .await?;

    debug!(
        "Opening tunnel to {}:{} through {}",
        device.host,
        device.port,
        proxy_client.get_connection_address()
    );
    let device_client = match open_tunnel(&proxy_client, device, server_check).await {
        Ok(client) => client,
        Err(e) => {
            if let Err(disconnect_err) = proxy_client.disconnect().await {
                debug!("Proxy disconnect after tunnel failure: {}", disconnect_err);
            }
            return Err(e);
        }
    };

    Ok(ProxiedClient {
        device: device_client,
        proxy: proxy_client,
    })
}

async fn open_tunnel(
    proxy_client: &Client,
    device: Hop<'_>,
    server_check: ServerCheckMethod,
) -> Result<Client, Error> {
    let channel = proxy_client
        .open_direct_tcpip_channel(device.host, device.port)
        .await?;

    Client::connect_stream(
        channel.into_stream(),
        (device.host, device.port),
        device.username,
        device.auth,
        server_check,
        Config::default(),
    )
    .await
}
