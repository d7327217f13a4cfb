//! # Device Fact
//!
//! The per-host record threaded through the pipeline.
//!
//! A [`DeviceFact`] is created once by the liveness stage and is never mutated
//! afterwards. Every later stage consumes the value and hands back a new one via
//! the `with_*` methods, so two stages can never observe a half-updated host.

use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pnet::util::MacAddr;
use serde::Serialize;

use crate::models::banner::ServiceBanner;
use crate::network::mac;

/// A target plus the local interface address used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostAddress {
    pub ip: Ipv4Addr,
    pub iface: Ipv4Addr,
}

impl HostAddress {
    pub fn new(ip: Ipv4Addr, iface: Ipv4Addr) -> Self {
        Self { ip, iface }
    }

    /// A host whose sockets are left to the kernel's routing decision.
    pub fn unbound(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            iface: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.iface.is_unspecified()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliveSource {
    Icmp,
    Arp,
    None,
}

impl AliveSource {
    pub fn derive(icmp_ok: bool, arp_ok: bool) -> Self {
        match (icmp_ok, arp_ok) {
            (true, _) => AliveSource::Icmp,
            (false, true) => AliveSource::Arp,
            (false, false) => AliveSource::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AliveSource::Icmp => "icmp",
            AliveSource::Arp => "arp",
            AliveSource::None => "none",
        }
    }
}

/// Aggregate outcome of all echo attempts against one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IcmpObservation {
    pub ok: bool,
    /// Best (lowest) round-trip time across attempts.
    pub rtt_ms: Option<u32>,
    /// TTL of the last reply received.
    pub ttl: Option<u8>,
}

impl IcmpObservation {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn replied(rtt_ms: u32, ttl: Option<u8>) -> Self {
        Self {
            ok: true,
            rtt_ms: Some(rtt_ms),
            ttl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceFact {
    ts: DateTime<Utc>,
    iface: Ipv4Addr,
    ip: Ipv4Addr,
    icmp_ok: bool,
    rtt_ms: Option<u32>,
    ttl: Option<u8>,
    arp_ok: bool,
    #[serde(serialize_with = "mac::serialize_opt")]
    mac: Option<MacAddr>,
    vendor: Option<String>,
    alive_source: AliveSource,
    silent_host: bool,
    proxy_arp: bool,
    route_mismatch: bool,
    open_ports: Vec<u16>,
    banners: Vec<ServiceBanner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
}

impl DeviceFact {
    /// Builds the baseline fact from liveness observations.
    ///
    /// Returns `None` for a host that answered neither ICMP nor ARP; such hosts
    /// leave the pipeline here.
    pub fn from_liveness(
        host: HostAddress,
        icmp: IcmpObservation,
        mac: Option<MacAddr>,
    ) -> Option<Self> {
        let arp_ok = mac.is_some();
        let alive_source = AliveSource::derive(icmp.ok, arp_ok);
        if alive_source == AliveSource::None {
            return None;
        }

        Some(Self {
            ts: Utc::now(),
            iface: host.iface,
            ip: host.ip,
            icmp_ok: icmp.ok,
            rtt_ms: icmp.rtt_ms.filter(|_| icmp.ok),
            ttl: icmp.ttl.filter(|_| icmp.ok),
            arp_ok,
            mac,
            vendor: None,
            alive_source,
            silent_host: arp_ok && !icmp.ok,
            proxy_arp: false,
            route_mismatch: false,
            open_ports: Vec::new(),
            banners: Vec::new(),
            hostname: None,
        })
    }

    pub fn with_vendor(self, vendor: Option<String>) -> Self {
        Self { vendor, ..self }
    }

    pub fn with_link_flags(self, proxy_arp: bool, route_mismatch: bool) -> Self {
        Self {
            proxy_arp,
            route_mismatch,
            ..self
        }
    }

    /// Replaces the open port list. The stored list is always ascending and unique.
    pub fn with_open_ports(self, ports: impl IntoIterator<Item = u16>) -> Self {
        let mut open_ports: Vec<u16> = ports.into_iter().collect();
        open_ports.sort_unstable();
        open_ports.dedup();
        Self { open_ports, ..self }
    }

    /// Replaces the banner list, ordered by port.
    pub fn with_banners(self, mut banners: Vec<ServiceBanner>) -> Self {
        banners.sort_by_key(|b| b.port);
        Self { banners, ..self }
    }

    pub fn with_timestamp(self, ts: DateTime<Utc>) -> Self {
        Self { ts, ..self }
    }

    /// Adopts a hostname supplied by an auxiliary discovery source, unless one is
    /// already known.
    pub fn merge_hostname_hint(self, hint: Option<String>) -> Self {
        if self.hostname.is_some() {
            return self;
        }
        let hostname = hint
            .map(|h| h.trim().trim_end_matches('.').to_string())
            .filter(|h| !h.is_empty());
        Self { hostname, ..self }
    }

    pub fn host(&self) -> HostAddress {
        HostAddress::new(self.ip, self.iface)
    }

    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    pub fn iface(&self) -> Ipv4Addr {
        self.iface
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn icmp_ok(&self) -> bool {
        self.icmp_ok
    }

    pub fn rtt_ms(&self) -> Option<u32> {
        self.rtt_ms
    }

    pub fn ttl(&self) -> Option<u8> {
        self.ttl
    }

    pub fn arp_ok(&self) -> bool {
        self.arp_ok
    }

    pub fn mac(&self) -> Option<MacAddr> {
        self.mac
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn alive_source(&self) -> AliveSource {
        self.alive_source
    }

    pub fn silent_host(&self) -> bool {
        self.silent_host
    }

    pub fn proxy_arp(&self) -> bool {
        self.proxy_arp
    }

    pub fn route_mismatch(&self) -> bool {
        self.route_mismatch
    }

    pub fn open_ports(&self) -> &[u16] {
        &self.open_ports
    }

    pub fn banners(&self) -> &[ServiceBanner] {
        &self.banners
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

/// Outcome of a single TCP connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortProbeResult {
    pub port: u16,
    pub open: bool,
    #[serde(rename = "connect_ms", serialize_with = "serialize_millis")]
    pub latency: Duration,
}

impl PortProbeResult {
    pub fn open(port: u16, latency: Duration) -> Self {
        Self {
            port,
            open: true,
            latency,
        }
    }

    pub fn closed(port: u16, latency: Duration) -> Self {
        Self {
            port,
            open: false,
            latency,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
