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

//! SSH channel operations: command execution and `direct-tcpip` tunnels.

use russh::client::Msg;
use russh::Channel;

use super::connection::Client;

/// Buffer size for command stdout. Route and traceroute output routinely
/// spans several kilobytes.
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Buffer size for stderr, which is usually a short diagnostic.
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandExecutedResult {
    /// Raw stdout bytes of the command.
    pub stdout: Vec<u8>,
    /// Raw stderr bytes of the command.
    pub stderr: Vec<u8>,
    /// The exit status reported by the device.
    pub exit_status: u32,
}

impl CommandExecutedResult {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Client {
    /// Open a `direct-tcpip` channel to `host:port` through this session.
    pub async fn open_direct_tcpip_channel(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Channel<Msg>, super::Error> {
        self.connection_handle
            .channel_open_direct_tcpip(host, port.into(), "127.0.0.1", 0)
            .await
            .map_err(super::Error::SshError)
    }

    /// Execute a remote command via the ssh connection.
    ///
    /// Returns stdout, stderr and the exit code of the command. Network
    /// operating systems frequently close the channel without an explicit
    /// exit status; in that case the status is reported as 0 as long as some
    /// output was received.
    pub async fn execute(&self, command: &str) -> Result<CommandExecutedResult, super::Error> {
        let mut stdout_buffer = Vec::with_capacity(SSH_CMD_BUFFER_SIZE);
        let mut stderr_buffer = Vec::with_capacity(SSH_RESPONSE_BUFFER_SIZE);
        let mut channel = self.connection_handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut result: Option<u32> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                russh::ChannelMsg::Data { ref data } => stdout_buffer.extend_from_slice(data),
                russh::ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr_buffer.extend_from_slice(data)
                    }
                }

                // The exit status may arrive before the last Data message, so
                // keep draining until the channel closes.
                russh::ChannelMsg::ExitStatus { exit_status } => result = Some(exit_status),
                _ => {}
            }
        }

        match result {
            Some(exit_status) => Ok(CommandExecutedResult {
                stdout: stdout_buffer,
                stderr: stderr_buffer,
                exit_status,
            }),
            None if !stdout_buffer.is_empty() => Ok(CommandExecutedResult {
                stdout: stdout_buffer,
                stderr: stderr_buffer,
                exit_status: 0,
            }),
            None => Err(super::Error::CommandDidntExit),
        }
    }
}
