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

//! Response cache: an ephemeral redb store plus in-flight deduplication.

mod maintenance;
mod single_flight;
mod stats;
mod store;

pub use maintenance::MIN_MAINTENANCE_PERIOD;
pub use single_flight::{Flight, SingleFlight};
pub use stats::CacheStats;
pub use store::{CacheStore, DEFAULT_OPERATION_TIMEOUT};

use std::time::Duration;
use thiserror::Error;

/// Cache failures. Never fatal to a query.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redb::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

macro_rules! backend_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for CacheError {
                fn from(e: $source) -> Self {
                    CacheError::Backend(e.into())
                }
            }
        )*
    };
}

backend_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
