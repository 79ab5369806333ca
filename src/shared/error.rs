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

//! Error types shared by the query engine.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed request, fatal to the request
//! - [`AuthConfigError`]: credential material cannot produce an auth backend
//! - [`DeviceError`]: per-device failure, recorded in the aggregate output
//! - [`InventoryError`]: a collaborator could not resolve a reference
//! - [`QueryError`]: request-level failure returned by the dispatcher

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type for input validation failures.
///
/// # Examples
///
/// ```
/// use lookglass::shared::error::ValidationError;
///
/// let err = ValidationError::new("target", "not an IP address or CIDR block");
/// assert!(err.to_string().contains("target"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field or input that failed validation
    pub field: String,
    /// Description of why validation failed
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an error for an empty field.
    pub fn empty(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} must be specified"),
            field,
        }
    }

    /// Create an error for a field that is too long.
    pub fn too_long(field: impl Into<String>, max_length: usize) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} exceeds maximum length of {max_length}"),
            field,
        }
    }

    /// Create an error for invalid characters.
    pub fn invalid_characters(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} contains invalid characters"),
            field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Credential material could not be turned into an authentication backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("unsupported credential mode '{mode}'")]
    UnsupportedMode { mode: String },

    #[error("credential for '{username}' has no password")]
    MissingPassword { username: String },

    #[error("credential for '{username}' has no private key")]
    MissingKey { username: String },

    #[error("malformed password for '{username}': {reason}")]
    MalformedPassword { username: String, reason: String },

    #[error("malformed private key for '{username}': {reason}")]
    MalformedKey { username: String, reason: String },
}

/// Classification of a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    Timeout,
    Refused,
    AuthFailed,
    HostKey,
    Unknown,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionErrorKind::Timeout => "connection timed out",
            ConnectionErrorKind::Refused => "connection refused",
            ConnectionErrorKind::AuthFailed => "authentication failed",
            ConnectionErrorKind::HostKey => "host key verification failed",
            ConnectionErrorKind::Unknown => "connection failed",
        };
        f.write_str(label)
    }
}

/// A collaborator could not resolve a reference held by a device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("unknown credential '{reference}'")]
    UnknownCredential { reference: String },

    #[error("unknown proxy '{reference}'")]
    UnknownProxy { reference: String },

    #[error("inventory backend error: {0}")]
    Backend(String),
}

/// Per-device failure. Never fatal to the query as a whole.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("device '{id}' not found")]
    NotFound { id: String },

    #[error(transparent)]
    AuthConfig(#[from] AuthConfigError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("{kind}: {detail}")]
    Connection {
        kind: ConnectionErrorKind,
        detail: String,
    },

    #[error("command execution failed: {0}")]
    Execution(String),

    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("command completed without output")]
    EmptyResponse,
}

impl DeviceError {
    pub fn connection(kind: ConnectionErrorKind, detail: impl Into<String>) -> Self {
        Self::Connection {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DeviceError::Timeout(_)
                | DeviceError::Connection {
                    kind: ConnectionErrorKind::Timeout,
                    ..
                }
        )
    }
}

/// Request-level failure returned from the dispatcher.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// HTTP status the boundary layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            QueryError::Validation(_) => 400,
            QueryError::Cancelled => 499,
            QueryError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = ValidationError::new("devices", "contains spaces");
        assert_eq!(err.field, "devices");
        assert!(err.to_string().contains("Validation error"));

        let empty_err = ValidationError::empty("target");
        assert!(empty_err.message.contains("must be specified"));

        let long_err = ValidationError::too_long("target", 64);
        assert!(long_err.message.contains("64"));
    }

    #[test]
    fn test_auth_config_error_display() {
        let err = AuthConfigError::MissingKey {
            username: "lg".to_string(),
        };
        assert!(err.to_string().contains("no private key"));

        let mode_err = AuthConfigError::UnsupportedMode {
            mode: "kerberos".to_string(),
        };
        assert!(mode_err.to_string().contains("kerberos"));
    }

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::connection(ConnectionErrorKind::Refused, "192.0.2.1:22");
        assert_eq!(err.to_string(), "connection refused: 192.0.2.1:22");

        let timeout = DeviceError::Timeout(Duration::from_millis(1500));
        assert!(timeout.to_string().contains("1.5s"));
        assert!(timeout.is_timeout());
        assert!(!DeviceError::EmptyResponse.is_timeout());
    }

    #[test]
    fn test_query_error_status() {
        let err = QueryError::from(ValidationError::empty("devices"));
        assert_eq!(err.http_status(), 400);
        assert_eq!(QueryError::Cancelled.http_status(), 499);
        assert_eq!(QueryError::Internal("boom".into()).http_status(), 500);
    }
}
