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

//! Looking-glass query engine.
//!
//! A query names devices, a target prefix or address and a query type. The
//! [`query::QueryDispatcher`] runs the matching command on every device
//! concurrently over SSH or an HTTP agent, aggregates the outputs and keeps
//! the result in a short-lived cache keyed by the query's fingerprint.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod inventory;
pub mod query;
pub mod shared;
pub mod ssh;
pub mod transport;
pub mod utils;
