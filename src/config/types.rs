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

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use super::settings::Settings;
use crate::inventory::Platform;

/// Main configuration structure.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,

    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// A login credential.
///
/// `password`, `key` and `key_passphrase` accept `${VAR}` references that
/// are expanded from the environment at load time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CredentialConfig {
    pub id: String,
    pub username: String,

    /// `password`, `key`, `unencrypted_key` or `encrypted_key`. Inferred
    /// from the other fields when absent.
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Inline private key.
    #[serde(default)]
    pub key: Option<String>,

    /// Path to a private key file.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    #[serde(default)]
    pub key_passphrase: Option<String>,
}

/// An SSH bastion.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProxyConfig {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub credential: String,
}

/// A queryable device.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeviceConfig {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    /// Defaults to 22 for SSH platforms and 8080 for HTTP agent platforms.
    #[serde(default)]
    pub port: Option<u16>,
    pub platform: Platform,
    pub credential: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub source_v4: Option<Ipv4Addr>,
    #[serde(default)]
    pub source_v6: Option<Ipv6Addr>,
}
