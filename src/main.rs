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

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lookglass::{
    cache::CacheStore,
    cli::{Cli, Commands},
    config::{Config, StaticInventory},
    inventory::Inventory,
    query::{QueryDispatcher, QueryRequest, QueryType, ResponseFormat},
    transport::PlatformConnector,
    utils::init_logging,
};

struct QueryOptions {
    devices: Vec<String>,
    target: String,
    query_type: String,
    json: bool,
    repeat: u32,
    timeout: Option<f64>,
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_with_priority(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Query {
            devices,
            target,
            query_type,
            json,
            repeat,
            timeout,
            no_cache,
        } => {
            let options = QueryOptions {
                devices,
                target,
                query_type,
                json,
                repeat,
                timeout,
                no_cache,
            };
            run_query(config, options).await
        }
        Commands::Devices => list_devices(config).await,
    }
}

async fn run_query(mut config: Config, options: QueryOptions) -> Result<()> {
    if let Some(secs) = options.timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|t| !t.is_zero())
            .with_context(|| format!("Invalid --timeout value: {secs}"))?;
        config.settings = config.settings.with_request_timeout(timeout);
    }

    let query_type: QueryType = options.query_type.parse()?;
    let format = if options.json {
        ResponseFormat::Json
    } else {
        ResponseFormat::PlainText
    };
    let request =
        QueryRequest::new(&options.devices, &options.target, query_type)?.with_format(format);

    let inventory = Arc::new(StaticInventory::from_config(config).await?);
    let settings = inventory.settings().clone();

    let connector = PlatformConnector::from_settings(&settings)
        .context("Failed to initialise device transports")?;

    let cache = if settings.cache.enabled && !options.no_cache {
        let cache = CacheStore::new(settings.cache.ttl())
            .context("Failed to create response cache")?
            .with_operation_timeout(settings.cache.operation_timeout);
        cache.spawn_maintenance(settings.cache.ttl());
        Some(cache)
    } else {
        tracing::debug!("Response cache disabled");
        None
    };

    let dispatcher = QueryDispatcher::new(inventory, Arc::new(connector), cache);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling query");
                cancel.cancel();
            }
        });
    }

    for _ in 0..options.repeat {
        match dispatcher
            .run_query_with_cancel(&request, cancel.clone())
            .await
        {
            Ok(response) => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Err(e) => {
                anyhow::bail!(
                    "{} (status {})",
                    settings.messages.query_error(&e),
                    e.http_status()
                );
            }
        }
    }

    if let Some(cache) = dispatcher.cache() {
        let stats = cache.stats();
        tracing::info!(
            "Cache: {} hits, {} misses, {} writes ({:.0}% hit rate)",
            stats.hits,
            stats.misses,
            stats.writes,
            stats.hit_rate() * 100.0
        );
    }

    Ok(())
}

async fn list_devices(config: Config) -> Result<()> {
    let inventory = StaticInventory::from_config(config).await?;
    if inventory.device_count() == 0 {
        println!("No devices configured");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<12} ADDRESS", "ID", "NAME", "PLATFORM");
    for device in inventory.devices() {
        let via = device
            .proxy
            .as_deref()
            .map(|proxy| format!(" (via {proxy})"))
            .unwrap_or_default();
        println!(
            "{:<16} {:<24} {:<12} {}{}",
            device.id,
            device.name,
            device.platform.as_str(),
            device.socket_address(),
            via
        );
    }
    Ok(())
}
