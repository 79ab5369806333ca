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

//! SSH connection management and establishment.
//!
//! This module handles the low-level SSH connection establishment,
//! including address resolution, connection attempts, and initial handshake.

use russh::client::{Config, Handle, Handler};
use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use super::authentication::{AuthMethod, ServerCheckMethod};

/// A ssh connection to a remote device.
///
/// After creating a `Client` by [`connect`]ing to a remote host,
/// use [`execute`] to send a command and receive its result.
///
/// [`connect`]: Client::connect
/// [`execute`]: Client::execute
///
/// # Examples
///
/// ```no_run
/// use lookglass::ssh::tokio_client::{AuthMethod, Client, ServerCheckMethod};
/// #[tokio::main]
/// async fn main() -> Result<(), lookglass::ssh::tokio_client::Error> {
///     let client = Client::connect(
///         ("192.0.2.10", 22),
///         "lg",
///         AuthMethod::with_password("secret"),
///         ServerCheckMethod::DefaultKnownHostsFile,
///     ).await?;
///
///     let result = client.execute("show version").await?;
///     assert_eq!(result.exit_status, 0);
///     client.disconnect().await?;
///
///     Ok(())
/// }
/// ```
pub struct Client {
    pub(super) connection_handle: Arc<Handle<ClientHandler>>,
    pub(super) username: String,
    pub(super) address: String,
}

impl Client {
    /// Open a ssh connection to a remote host.
    ///
    /// If `addr` resolves to multiple addresses, `connect` is attempted with
    /// each of them until one succeeds. Authentification is tried on the first
    /// successful connection and the whole process aborted if this fails.
    pub async fn connect(
        addr: (&str, u16),
        username: &str,
        auth: AuthMethod,
        server_check: ServerCheckMethod,
    ) -> Result<Self, super::Error> {
        Self::connect_with_config(addr, username, auth, server_check, Config::default()).await
    }

    /// Same as `connect`, but with the option to specify a non default
    /// [`russh::client::Config`].
    pub async fn connect_with_config(
        addr: (&str, u16),
        username: &str,
        auth: AuthMethod,
        server_check: ServerCheckMethod,
        config: Config,
    ) -> Result<Self, super::Error> {
        let config = Arc::new(config);
        let (hostname, port) = addr;

        let socket_addrs = tokio::net::lookup_host((hostname, port))
            .await
            .map_err(super::Error::AddressInvalid)?;
        let mut connect_res = Err(super::Error::AddressInvalid(io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any addresses",
        )));
        for socket_addr in socket_addrs {
            let handler = ClientHandler::new(hostname.to_string(), port, server_check.clone());
            match russh::client::connect(config.clone(), socket_addr, handler).await {
                Ok(h) => {
                    connect_res = Ok(h);
                    break;
                }
                Err(e) => connect_res = Err(e),
            }
        }
        let mut handle = connect_res?;

        super::authentication::authenticate(&mut handle, username, auth).await?;

        Ok(Self {
            connection_handle: Arc::new(handle),
            username: username.to_string(),
            address: format!("{hostname}:{port}"),
        })
    }

    /// Run the SSH handshake over an already established byte stream.
    ///
    /// Used to reach a device through a `direct-tcpip` channel opened on a
    /// proxy. `hostname` and `port` identify the device for host key checks.
    pub async fn connect_stream<S>(
        stream: S,
        addr: (&str, u16),
        username: &str,
        auth: AuthMethod,
        server_check: ServerCheckMethod,
        config: Config,
    ) -> Result<Self, super::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (hostname, port) = addr;
        let handler = ClientHandler::new(hostname.to_string(), port, server_check);
        let mut handle = russh::client::connect_stream(Arc::new(config), stream, handler).await?;

        super::authentication::authenticate(&mut handle, username, auth).await?;

        Ok(Self {
            connection_handle: Arc::new(handle),
            username: username.to_string(),
            address: format!("{hostname}:{port}"),
        })
    }

    /// A debugging function to get the address this client is connected to.
    pub fn get_connection_address(&self) -> &str {
        &self.address
    }

    /// Disconnect from the remote host.
    pub async fn disconnect(&self) -> Result<(), super::Error> {
        self.connection_handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(super::Error::SshError)
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("username", &self.username)
            .field("address", &self.address)
            .field("connection_handle", &"Handle<ClientHandler>")
            .finish()
    }
}

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    server_check: ServerCheckMethod,
}

impl ClientHandler {
    /// Create a new client handler.
    pub fn new(hostname: String, port: u16, server_check: ServerCheckMethod) -> Self {
        Self {
            hostname,
            port,
            server_check,
        }
    }

    fn accept_new(
        &self,
        server_public_key: &russh::keys::PublicKey,
        path: Option<&std::path::Path>,
    ) -> Result<bool, super::Error> {
        let known = match path {
            Some(path) => russh::keys::check_known_hosts_path(
                &self.hostname,
                self.port,
                server_public_key,
                path,
            ),
            None => russh::keys::check_known_hosts(&self.hostname, self.port, server_public_key),
        }
        .map_err(|_| super::Error::ServerCheckFailed)?;

        if known {
            return Ok(true);
        }

        tracing::warn!(
            host = %self.hostname,
            port = self.port,
            "Recording previously unknown host key"
        );
        match path {
            Some(path) => russh::keys::known_hosts::learn_known_hosts_path(
                &self.hostname,
                self.port,
                server_public_key,
                path,
            ),
            None => russh::keys::known_hosts::learn_known_hosts(
                &self.hostname,
                self.port,
                server_public_key,
            ),
        }
        .map_err(|_| super::Error::ServerCheckFailed)?;

        Ok(true)
    }
}

impl Handler for ClientHandler {
    type Error = super::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.server_check {
            ServerCheckMethod::NoCheck => Ok(true),
            ServerCheckMethod::KnownHostsFile(known_hosts_path) => {
                let result = russh::keys::check_known_hosts_path(
                    &self.hostname,
                    self.port,
                    server_public_key,
                    known_hosts_path,
                )
                .map_err(|_| super::Error::ServerCheckFailed)?;

                Ok(result)
            }
            ServerCheckMethod::DefaultKnownHostsFile => {
                let result =
                    russh::keys::check_known_hosts(&self.hostname, self.port, server_public_key)
                        .map_err(|_| super::Error::ServerCheckFailed)?;

                Ok(result)
            }
            ServerCheckMethod::AcceptNew(path) => {
                let path = path.clone();
                self.accept_new(server_public_key, path.as_deref())
            }
        }
    }
}
