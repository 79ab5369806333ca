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

//! Configuration loading, priority management and validation.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::Config;
use super::utils::expand_tilde;
use crate::inventory::{CredentialMode, TransportKind};
use crate::shared::validation::{validate_hostname, validate_identifier, validate_username};

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "lookglass.yaml";

impl Config {
    /// Load and validate configuration from a file.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read configuration file at {}. Please check file permissions and ensure the file is accessible.", expanded_path.display()))?;

        Self::from_yaml(&content).with_context(|| {
            format!(
                "Invalid configuration file at {}",
                expanded_path.display()
            )
        })
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content).context(
            "Failed to parse YAML configuration. Please check the YAML syntax is valid.\nCommon issues:\n  - Incorrect indentation (use spaces, not tabs)\n  - Missing colons after keys\n  - Unknown platform or host_key_policy values",
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Default per-user configuration path (`~/.config/lookglass/config.yaml`
    /// on Linux).
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lookglass").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Load configuration with priority order:
    /// 1. Explicit --config path
    /// 2. `./lookglass.yaml`
    /// 3. Per-user config directory
    pub async fn load_with_priority(cli_config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_config_path {
            tracing::debug!("Using explicitly specified config file: {:?}", path);
            return Self::load(path).await;
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            tracing::debug!("Found {} in current directory", LOCAL_CONFIG_FILE);
            return Self::load(&local).await;
        }

        if let Some(user_config) = Self::default_config_path() {
            tracing::debug!("Checking user config path: {:?}", user_config);
            if user_config.exists() {
                return Self::load(&user_config).await;
            }
        }

        anyhow::bail!(
            "No configuration file found. Pass --config or create ./{LOCAL_CONFIG_FILE}"
        )
    }

    /// Check identifiers, references and settings for consistency, storing
    /// addresses in their normalized form.
    pub fn validate(&mut self) -> Result<()> {
        if self.settings.request_timeout.is_zero() {
            anyhow::bail!("settings.request_timeout must be greater than zero");
        }
        if self.settings.cache.operation_timeout.is_zero() {
            anyhow::bail!("settings.cache.operation_timeout must be greater than zero");
        }

        let mut credential_ids = HashSet::new();
        for credential in &self.credentials {
            let id = validate_identifier("credential id", &credential.id)?;
            if !credential_ids.insert(id.clone()) {
                anyhow::bail!("Duplicate credential id '{id}'");
            }
            validate_username(&credential.username)
                .with_context(|| format!("Invalid username for credential '{id}'"))?;
            if let Some(mode) = &credential.mode {
                mode.parse::<CredentialMode>()
                    .with_context(|| format!("Invalid mode for credential '{id}'"))?;
            }
            if credential.key.is_some() && credential.key_file.is_some() {
                anyhow::bail!("Credential '{id}' sets both key and key_file");
            }
        }

        let mut proxy_ids = HashSet::new();
        for proxy in &mut self.proxies {
            let id = validate_identifier("proxy id", &proxy.id)?;
            if !proxy_ids.insert(id.clone()) {
                anyhow::bail!("Duplicate proxy id '{id}'");
            }
            proxy.address = validate_hostname(&proxy.address)
                .with_context(|| format!("Invalid address for proxy '{id}'"))?;
            if !credential_ids.contains(proxy.credential.trim()) {
                anyhow::bail!(
                    "Proxy '{id}' references unknown credential '{}'",
                    proxy.credential
                );
            }
        }

        let mut device_ids = HashSet::new();
        for device in &mut self.devices {
            let id = validate_identifier("device id", &device.id)?;
            if !device_ids.insert(id.clone()) {
                anyhow::bail!("Duplicate device id '{id}'");
            }
            device.address = validate_hostname(&device.address)
                .with_context(|| format!("Invalid address for device '{id}'"))?;
            if !credential_ids.contains(device.credential.trim()) {
                anyhow::bail!(
                    "Device '{id}' references unknown credential '{}'",
                    device.credential
                );
            }
            if let Some(proxy) = &device.proxy {
                if !proxy_ids.contains(proxy.trim()) {
                    anyhow::bail!("Device '{id}' references unknown proxy '{proxy}'");
                }
                if device.platform.transport() == TransportKind::HttpAgent {
                    anyhow::bail!(
                        "Device '{id}' uses the {} HTTP agent, which cannot be reached through proxy '{proxy}'",
                        device.platform
                    );
                }
            }
        }

        Ok(())
    }
}
