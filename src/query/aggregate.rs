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

//! Combine per-device outcomes into one response body.

use serde_json::{Map, Value};

use super::response::ResponseFormat;
use crate::config::Messages;
use crate::shared::error::DeviceError;

/// Outcome of running the query on one device.
#[derive(Debug, Clone)]
pub struct DeviceOutcome {
    pub id: String,
    /// Display name used in section headers and error messages.
    pub name: String,
    pub result: Result<String, DeviceError>,
}

impl DeviceOutcome {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        result: Result<String, DeviceError>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Decode raw command output: lossy UTF-8, `\n` line endings, no trailing
/// whitespace. Blank output becomes [`DeviceError::EmptyResponse`].
pub fn normalize_output(raw: &[u8]) -> Result<String, DeviceError> {
    let text = String::from_utf8_lossy(raw).replace("\r\n", "\n");
    let text = text.trim_end();
    if text.trim().is_empty() {
        return Err(DeviceError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Render `outcomes` (already in request order) in `format`.
pub fn aggregate(
    format: ResponseFormat,
    outcomes: &[DeviceOutcome],
    messages: &Messages,
) -> String {
    match format {
        ResponseFormat::PlainText => aggregate_text(outcomes, messages),
        ResponseFormat::Json => aggregate_json(outcomes, messages),
    }
}

fn render_outcome(outcome: &DeviceOutcome, messages: &Messages) -> String {
    match &outcome.result {
        Ok(output) => output.clone(),
        Err(e) => messages.device_error(&outcome.name, e),
    }
}

fn aggregate_text(outcomes: &[DeviceOutcome], messages: &Messages) -> String {
    if let [single] = outcomes {
        return render_outcome(single, messages);
    }

    outcomes
        .iter()
        .map(|outcome| {
            format!(
                "=== {} ===\n{}",
                outcome.name,
                render_outcome(outcome, messages)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn aggregate_json(outcomes: &[DeviceOutcome], messages: &Messages) -> String {
    let mut body = Map::new();
    for outcome in outcomes {
        let mut entry = Map::new();
        match &outcome.result {
            Ok(output) => {
                entry.insert("output".to_string(), Value::String(output.clone()));
            }
            Err(e) => {
                entry.insert(
                    "error".to_string(),
                    Value::String(messages.device_error(&outcome.name, e)),
                );
            }
        }
        body.insert(outcome.id.clone(), Value::Object(entry));
    }
    Value::Object(body).to_string()
}
