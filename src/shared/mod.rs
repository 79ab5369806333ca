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

//! Types shared across the transport, cache and query layers.
//!
//! # Modules
//!
//! - [`error`]: error taxonomy for validation, devices and queries
//! - [`validation`]: identifier, hostname and username checks

pub mod error;
pub mod validation;

pub use error::{
    AuthConfigError, ConnectionErrorKind, DeviceError, InventoryError, QueryError,
    ValidationError,
};
pub use validation::{validate_hostname, validate_identifier, validate_username};
