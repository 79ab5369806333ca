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

//! Device command construction.
//!
//! Each platform has one template per query type and address family.
//! `{target}` is replaced by the query target and `{source}` by the device's
//! source address for that family. A `[...]` segment is optional: it is kept
//! only when the device has a source address configured.

use std::net::IpAddr;

use crate::inventory::{DeviceDescriptor, Platform};
use crate::query::request::{QueryTarget, QueryType};

struct Templates {
    bgp_route: &'static str,
    ping: &'static str,
    traceroute: &'static str,
}

struct PlatformCommands {
    ipv4: Templates,
    ipv6: Templates,
}

const CISCO_IOS: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "show bgp ipv4 unicast {target} | exclude pathid:|Epoch",
        ping: "ping {target} repeat 5[ source {source}]",
        traceroute: "traceroute {target} timeout 1 probe 2[ source {source}]",
    },
    ipv6: Templates {
        bgp_route: "show bgp ipv6 unicast {target} | exclude pathid:|Epoch",
        ping: "ping ipv6 {target} repeat 5[ source {source}]",
        traceroute: "traceroute ipv6 {target} timeout 1 probe 2[ source {source}]",
    },
};

const CISCO_XR: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "show bgp ipv4 unicast {target}",
        ping: "ping ipv4 {target} count 5[ source {source}]",
        traceroute: "traceroute ipv4 {target} timeout 1 probe 2[ source {source}]",
    },
    ipv6: Templates {
        bgp_route: "show bgp ipv6 unicast {target}",
        ping: "ping ipv6 {target} count 5[ source {source}]",
        traceroute: "traceroute ipv6 {target} timeout 1 probe 2[ source {source}]",
    },
};

const JUNIPER: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "show route protocol bgp table inet.0 {target} detail | except Label | except \"Next hop type\" | except Task | except Address | except \"Session Id\" | except State | except \"Next-hop reference\" | except destinations | except \"Announcement bits\"",
        ping: "ping inet {target} count 5[ source {source}]",
        traceroute: "traceroute inet {target} wait 1[ source {source}]",
    },
    ipv6: Templates {
        bgp_route: "show route protocol bgp table inet6.0 {target} detail | except Label | except \"Next hop type\" | except Task | except Address | except \"Session Id\" | except State | except \"Next-hop reference\" | except destinations | except \"Announcement bits\"",
        ping: "ping inet6 {target} count 5[ source {source}]",
        traceroute: "traceroute inet6 {target} wait 2[ source {source}]",
    },
};

const ARISTA_EOS: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "show ip bgp {target}",
        ping: "ping ip {target}[ source {source}]",
        traceroute: "traceroute ip {target}[ source {source}]",
    },
    ipv6: Templates {
        bgp_route: "show ipv6 bgp {target}",
        ping: "ping ipv6 {target}[ source {source}]",
        traceroute: "traceroute ipv6 {target}[ source {source}]",
    },
};

const HUAWEI: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "display bgp routing-table {target}",
        ping: "ping -c 5[ -a {source}] {target}",
        traceroute: "tracert -q 2 -f 1[ -a {source}] {target}",
    },
    ipv6: Templates {
        bgp_route: "display bgp ipv6 routing-table {target}",
        ping: "ping ipv6 -c 5[ -a {source}] {target}",
        traceroute: "tracert ipv6 -q 2 -f 1[ -a {source}] {target}",
    },
};

const FRR: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "vtysh -c \"show bgp ipv4 unicast {target}\"",
        ping: "ping -4 -c 5[ -I {source}] {target}",
        traceroute: "traceroute -4 -w 1 -q 1[ -s {source}] {target}",
    },
    ipv6: Templates {
        bgp_route: "vtysh -c \"show bgp ipv6 unicast {target}\"",
        ping: "ping -6 -c 5[ -I {source}] {target}",
        traceroute: "traceroute -6 -w 1 -q 1[ -s {source}] {target}",
    },
};

const BIRD: PlatformCommands = PlatformCommands {
    ipv4: Templates {
        bgp_route: "birdc \"show route all where {target} ~ net\"",
        ping: "ping -4 -c 5[ -I {source}] {target}",
        traceroute: "traceroute -4 -w 1 -q 1[ -s {source}] {target}",
    },
    ipv6: Templates {
        bgp_route: "birdc \"show route all where {target} ~ net\"",
        ping: "ping -6 -c 5[ -I {source}] {target}",
        traceroute: "traceroute -6 -w 1 -q 1[ -s {source}] {target}",
    },
};

fn platform_commands(platform: Platform) -> &'static PlatformCommands {
    match platform {
        Platform::CiscoIos => &CISCO_IOS,
        Platform::CiscoXr => &CISCO_XR,
        Platform::Juniper => &JUNIPER,
        Platform::AristaEos => &ARISTA_EOS,
        Platform::Huawei => &HUAWEI,
        Platform::Frr => &FRR,
        Platform::Bird => &BIRD,
    }
}

/// Build the command line a device runs for `query_type` against `target`.
pub fn build_command(
    device: &DeviceDescriptor,
    query_type: QueryType,
    target: &QueryTarget,
) -> String {
    let commands = platform_commands(device.platform);
    let templates = if target.is_ipv4() {
        &commands.ipv4
    } else {
        &commands.ipv6
    };

    let template = match query_type {
        QueryType::BgpRoute => templates.bgp_route,
        QueryType::Ping => templates.ping,
        QueryType::Traceroute => templates.traceroute,
    };

    let target_text = match query_type {
        QueryType::BgpRoute => target.normalized(),
        QueryType::Ping | QueryType::Traceroute => target.ip().to_string(),
    };
    let source = device.source_for(&target.ip());

    render(template, &target_text, source)
}

fn render(template: &str, target: &str, source: Option<IpAddr>) -> String {
    let source = source.map(|s| s.to_string());
    let mut out = String::with_capacity(template.len() + 48);
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        if let Some(source) = source.as_deref() {
            out.push_str(&rest[open + 1..close].replace("{source}", source));
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);

    out.replace("{target}", target)
}
