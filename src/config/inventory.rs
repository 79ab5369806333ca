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

//! In-memory [`Inventory`] built from configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::Zeroizing;

use super::settings::Settings;
use super::types::{Config, CredentialConfig};
use super::utils::{expand_env_vars, expand_tilde};
use crate::inventory::{
    CredentialMaterial, CredentialMode, DeviceDescriptor, Inventory, ProxyDescriptor,
};
use crate::shared::error::InventoryError;

/// Devices, credentials and proxies held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    settings: Settings,
    devices: HashMap<String, DeviceDescriptor>,
    credentials: HashMap<String, Arc<CredentialMaterial>>,
    proxies: HashMap<String, ProxyDescriptor>,
}

impl StaticInventory {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceDescriptor) -> Self {
        self.devices.insert(device.id.clone(), device);
        self
    }

    pub fn with_credential(
        mut self,
        id: impl Into<String>,
        credential: CredentialMaterial,
    ) -> Self {
        self.credentials.insert(id.into(), Arc::new(credential));
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyDescriptor) -> Self {
        self.proxies.insert(proxy.id.clone(), proxy);
        self
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// All devices, ordered by id.
    pub fn devices(&self) -> Vec<&DeviceDescriptor> {
        let mut devices: Vec<_> = self.devices.values().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Build an inventory from validated configuration, expanding `${VAR}`
    /// secrets and reading key files.
    pub async fn from_config(config: Config) -> Result<Self> {
        let mut inventory = Self::new(config.settings);

        for credential in config.credentials {
            let id = credential.id.trim().to_string();
            let material = load_credential(credential)
                .await
                .with_context(|| format!("Failed to load credential '{id}'"))?;
            inventory = inventory.with_credential(id, material);
        }

        for proxy in config.proxies {
            inventory = inventory.with_proxy(ProxyDescriptor {
                id: proxy.id.trim().to_string(),
                address: proxy.address,
                port: proxy.port.unwrap_or(22),
                credential: proxy.credential.trim().to_string(),
            });
        }

        for device in config.devices {
            let id = device.id.trim().to_string();
            inventory = inventory.with_device(DeviceDescriptor {
                name: device.name.unwrap_or_else(|| id.clone()),
                port: device.port.unwrap_or_else(|| device.platform.default_port()),
                address: device.address,
                platform: device.platform,
                credential: device.credential.trim().to_string(),
                proxy: device.proxy.map(|p| p.trim().to_string()),
                source_v4: device.source_v4,
                source_v6: device.source_v6,
                id,
            });
        }

        Ok(inventory)
    }
}

async fn load_credential(credential: CredentialConfig) -> Result<CredentialMaterial> {
    let has_key = credential.key.is_some() || credential.key_file.is_some();
    let mode = match &credential.mode {
        Some(mode) => mode.parse::<CredentialMode>()?,
        None if has_key => CredentialMode::Key,
        None => CredentialMode::Password,
    };

    let secret = |value: Option<String>| -> Result<Option<Zeroizing<String>>> {
        value
            .map(|v| expand_env_vars(&v).map(Zeroizing::new))
            .transpose()
    };

    let private_key = match (credential.key, credential.key_file) {
        (Some(key), _) => secret(Some(key))?,
        (None, Some(path)) => {
            let path = expand_tilde(&path);
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read SSH key file: {path:?}"))?;
            Some(Zeroizing::new(contents))
        }
        (None, None) => None,
    };

    Ok(CredentialMaterial {
        mode,
        username: credential.username,
        password: secret(credential.password)?,
        private_key,
        key_passphrase: secret(credential.key_passphrase)?,
    })
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn resolve_devices(
        &self,
        ids: &[String],
    ) -> Result<Vec<DeviceDescriptor>, InventoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.devices.get(id).cloned())
            .collect())
    }

    async fn resolve_credential(
        &self,
        reference: &str,
    ) -> Result<Arc<CredentialMaterial>, InventoryError> {
        self.credentials
            .get(reference)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownCredential {
                reference: reference.to_string(),
            })
    }

    async fn resolve_proxy(&self, reference: &str) -> Result<ProxyDescriptor, InventoryError> {
        self.proxies
            .get(reference)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownProxy {
                reference: reference.to_string(),
            })
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }
}
