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

use std::io;

use crate::shared::error::ConnectionErrorKind;

/// Low-level SSH client error.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Key authentication failed")]
    KeyAuthFailed,
    #[error("Unable to load key, bad format or passphrase: {0}")]
    KeyInvalid(russh::keys::Error),
    #[error("Password authentication failed")]
    PasswordWrong,
    #[error("Invalid address was provided: {0}")]
    AddressInvalid(io::Error),
    #[error("The executed command didn't send an exit code")]
    CommandDidntExit,
    #[error("Server check failed")]
    ServerCheckFailed,
    #[error("Ssh error occured: {0}")]
    SshError(#[from] russh::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    /// Classify this error for per-device reporting.
    pub fn kind(&self) -> ConnectionErrorKind {
        match self {
            Error::KeyAuthFailed | Error::PasswordWrong | Error::KeyInvalid(_) => {
                ConnectionErrorKind::AuthFailed
            }
            Error::ServerCheckFailed => ConnectionErrorKind::HostKey,
            Error::IoError(e) | Error::AddressInvalid(e) => io_kind(e),
            Error::SshError(russh::Error::UnknownKey) => ConnectionErrorKind::HostKey,
            Error::SshError(russh::Error::ConnectionTimeout) => ConnectionErrorKind::Timeout,
            Error::SshError(russh::Error::IO(e)) => io_kind(e),
            Error::SshError(_) | Error::CommandDidntExit => ConnectionErrorKind::Unknown,
        }
    }
}

fn io_kind(e: &io::Error) -> ConnectionErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ConnectionErrorKind::Refused,
        io::ErrorKind::TimedOut => ConnectionErrorKind::Timeout,
        _ => ConnectionErrorKind::Unknown,
    }
}
