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

use super::tokio_client::ServerCheckMethod;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Get the default known_hosts file path
pub fn get_default_known_hosts_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// How device host keys are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// The key must already be present in known_hosts.
    #[default]
    Strict,
    /// Unknown hosts are recorded on first contact; changed keys are rejected.
    AcceptNew,
    /// Any key is accepted.
    InsecureAcceptAny,
}

impl HostKeyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostKeyPolicy::Strict => "strict",
            HostKeyPolicy::AcceptNew => "accept-new",
            HostKeyPolicy::InsecureAcceptAny => "insecure-accept-any",
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a ServerCheckMethod for `policy`.
///
/// `known_hosts_file` overrides the default `~/.ssh/known_hosts` location.
pub fn get_check_method(
    policy: HostKeyPolicy,
    known_hosts_file: Option<&Path>,
) -> ServerCheckMethod {
    match policy {
        HostKeyPolicy::Strict => match known_hosts_file {
            Some(path) => {
                if !path.exists() {
                    tracing::warn!(
                        "Known hosts file not found at {:?}; every host key will be rejected",
                        path
                    );
                }
                ServerCheckMethod::KnownHostsFile(path.to_path_buf())
            }
            None => {
                tracing::debug!("Using default known_hosts file (strict mode)");
                ServerCheckMethod::DefaultKnownHostsFile
            }
        },
        HostKeyPolicy::AcceptNew => {
            let path = known_hosts_file
                .map(Path::to_path_buf)
                .or_else(get_default_known_hosts_path);
            if let Some(dir) = path.as_deref().and_then(Path::parent) {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::warn!("Failed to create known_hosts directory {:?}: {}", dir, e);
                }
            }
            ServerCheckMethod::AcceptNew(path)
        }
        HostKeyPolicy::InsecureAcceptAny => ServerCheckMethod::NoCheck,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_policy_default_is_strict() {
        assert_eq!(HostKeyPolicy::default(), HostKeyPolicy::Strict);
    }

    #[test]
    fn test_host_key_policy_serde() {
        let policy: HostKeyPolicy = serde_yaml::from_str("insecure-accept-any").unwrap();
        assert_eq!(policy, HostKeyPolicy::InsecureAcceptAny);
        assert_eq!(
            serde_yaml::to_string(&HostKeyPolicy::AcceptNew).unwrap().trim(),
            "accept-new"
        );
        assert!(serde_yaml::from_str::<HostKeyPolicy>("maybe").is_err());
    }

    #[test]
    fn test_get_default_known_hosts_path() {
        let path = get_default_known_hosts_path();
        assert!(path.is_some());
        if let Some(p) = path {
            assert!(p.to_str().unwrap().contains(".ssh/known_hosts"));
        }
    }

    #[test]
    fn test_get_check_method() {
        let method = get_check_method(HostKeyPolicy::InsecureAcceptAny, None);
        assert!(matches!(method, ServerCheckMethod::NoCheck));

        let method = get_check_method(HostKeyPolicy::Strict, None);
        assert!(matches!(method, ServerCheckMethod::DefaultKnownHostsFile));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssh").join("known_hosts");

        let method = get_check_method(HostKeyPolicy::Strict, Some(&path));
        assert_eq!(method, ServerCheckMethod::KnownHostsFile(path.clone()));

        let method = get_check_method(HostKeyPolicy::AcceptNew, Some(&path));
        assert_eq!(method, ServerCheckMethod::AcceptNew(Some(path.clone())));
        assert!(path.parent().unwrap().exists());
    }
}
