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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lookglass",
    version,
    about = "Looking-glass query engine - run BGP route, ping and traceroute lookups on network devices",
    long_about = "lookglass runs a looking-glass query on one or more network devices in parallel over SSH\nor a device HTTP agent, and prints the aggregated response as JSON.\nIdentical queries are answered from an in-process cache for the configured TTL.",
    after_help = "EXAMPLES:\n  BGP route on two devices:  lookglass query -d fra1,ams1 -t 192.0.2.0/24 -q bgp_route\n  Ping from one device:      lookglass query -d fra1 -t 2001:db8::1 -q ping\n  Per-device JSON output:    lookglass query -d fra1,ams1 -t 192.0.2.1 -q traceroute --json\n  List configured devices:   lookglass devices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        env = "LOOKGLASS_CONFIG",
        global = true,
        help = "Configuration file path\nConfig loading priority:\n  1. This flag (or LOOKGLASS_CONFIG)\n  2. Current directory (./lookglass.yaml)\n  3. User config (~/.config/lookglass/config.yaml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run a query on the given devices",
        long_about = "Runs the query on every named device concurrently and prints one JSON response.\nDevices that fail are reported inside the output; the other devices are unaffected."
    )]
    Query {
        #[arg(
            short = 'd',
            long = "device",
            required = true,
            value_delimiter = ',',
            help = "Device ids from the configuration (repeat or comma-separate)"
        )]
        devices: Vec<String>,

        #[arg(short = 't', long, help = "Target IP address or CIDR prefix")]
        target: String,

        #[arg(
            short = 'q',
            long = "type",
            default_value = "bgp_route",
            help = "Query type: bgp_route, ping or traceroute"
        )]
        query_type: String,

        #[arg(long, help = "Render per-device results as a JSON object")]
        json: bool,

        #[arg(
            long,
            default_value = "1",
            value_parser = clap::value_parser!(u32).range(1..),
            help = "Run the query N times (later runs show cache behaviour)"
        )]
        repeat: u32,

        #[arg(long, help = "Override settings.request_timeout, in seconds")]
        timeout: Option<f64>,

        #[arg(long, help = "Do not read or write the response cache")]
        no_cache: bool,
    },

    #[command(about = "List configured devices")]
    Devices,
}
