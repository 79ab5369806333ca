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

//! User-facing message templates.
//!
//! Templates may reference `{.Value}`, `{.Error}` and `{.Type}`. Each template
//! can be overridden from the `settings.messages` section of the YAML config.

use serde::{Deserialize, Serialize};

use crate::shared::error::{ConnectionErrorKind, DeviceError, QueryError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Messages {
    pub missing_field: String,
    pub target_not_allowed: String,
    pub feature_not_enabled: String,
    pub invalid_input: String,
    pub invalid_field: String,
    pub unknown_error: String,
    pub request_timeout: String,
    pub connection_error: String,
    pub authentication_error: String,
    pub response_parsing_failure: String,
    pub empty_response: String,
    pub device_not_found: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            missing_field: "{.Value} must be specified.".to_string(),
            target_not_allowed: "{.Value} is not allowed.".to_string(),
            feature_not_enabled: "{.Value} is not enabled.".to_string(),
            invalid_input: "{.Value} is invalid.".to_string(),
            invalid_field: "{.Value} is an invalid {.Type}".to_string(),
            unknown_error: "Something went wrong.".to_string(),
            request_timeout: "Request timed out.".to_string(),
            connection_error: "Error connecting to {.Value}: {.Error}".to_string(),
            authentication_error: "Error authenticating to {.Value}: {.Error}".to_string(),
            response_parsing_failure: "Error reading response.".to_string(),
            empty_response: "The query completed, but no results were found.".to_string(),
            device_not_found: "{.Value} is not a known device.".to_string(),
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageArgs<'a> {
    pub value: &'a str,
    pub error: &'a str,
    pub kind: &'a str,
}

/// Substitute `{.Value}`, `{.Error}` and `{.Type}` in `template`.
///
/// # Examples
///
/// ```
/// use lookglass::config::messages::{render, MessageArgs};
///
/// let text = render(
///     "Error connecting to {.Value}: {.Error}",
///     MessageArgs { value: "edge1", error: "refused", ..Default::default() },
/// );
/// assert_eq!(text, "Error connecting to edge1: refused");
/// ```
pub fn render(template: &str, args: MessageArgs<'_>) -> String {
    template
        .replace("{.Value}", args.value)
        .replace("{.Error}", args.error)
        .replace("{.Type}", args.kind)
}

impl Messages {
    /// Render a per-device failure for `device` (its display name).
    pub fn device_error(&self, device: &str, error: &DeviceError) -> String {
        let detail = error.to_string();
        let args = MessageArgs {
            value: device,
            error: &detail,
            kind: "",
        };

        match error {
            DeviceError::NotFound { .. } => render(&self.device_not_found, args),
            DeviceError::Timeout(_) => render(&self.request_timeout, args),
            DeviceError::EmptyResponse => render(&self.empty_response, args),
            DeviceError::AuthConfig(_) => render(&self.authentication_error, args),
            DeviceError::Connection { kind, .. } => match kind {
                ConnectionErrorKind::Timeout => render(&self.request_timeout, args),
                ConnectionErrorKind::AuthFailed => render(&self.authentication_error, args),
                _ => render(&self.connection_error, args),
            },
            DeviceError::Inventory(_) | DeviceError::Execution(_) => {
                render(&self.connection_error, args)
            }
        }
    }

    /// Render a request-level failure. Internal detail is never shown.
    pub fn query_error(&self, error: &QueryError) -> String {
        match error {
            QueryError::Validation(e) => render(
                &self.invalid_input,
                MessageArgs {
                    value: &e.field,
                    error: &e.message,
                    ..Default::default()
                },
            ),
            QueryError::Cancelled => error.to_string(),
            QueryError::Internal(_) => self.unknown_error.clone(),
        }
    }
}
