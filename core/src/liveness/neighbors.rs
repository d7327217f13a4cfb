//! Kernel neighbour (ARP) table and default route.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use async_trait::async_trait;
use lanprobe_common::network::mac;
use pnet::util::MacAddr;
use tracing::{debug, warn};

const ATF_COM: u32 = 0x2;
const RTF_GATEWAY: u32 = 0x2;

/// One complete neighbour entry. `device` is `None` when the source did not say.
#[derive(Debug, Clone, PartialEq)]
struct Neighbor {
    mac: MacAddr,
    device: Option<String>,
}

impl Neighbor {
    fn seen_on(&self, device: Option<&str>) -> bool {
        match (device, self.device.as_deref()) {
            (Some(want), Some(have)) => want == have,
            _ => true,
        }
    }
}

/// A read-only snapshot of the neighbour table, plus the default gateway.
///
/// The same IP can be listed once per interface; lookups name the interface
/// the host is reached through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborTable {
    entries: HashMap<Ipv4Addr, Vec<Neighbor>>,
    gateway: Option<Ipv4Addr>,
    gateway_device: Option<String>,
}

impl NeighborTable {
    /// Entries not tied to any interface; they match every lookup.
    pub fn from_entries(entries: impl IntoIterator<Item = (Ipv4Addr, MacAddr)>) -> Self {
        Self::collect(entries.into_iter().map(|(ip, mac)| (ip, Neighbor { mac, device: None })))
    }

    fn collect(entries: impl Iterator<Item = (Ipv4Addr, Neighbor)>) -> Self {
        let mut table = Self::default();
        for (ip, neighbor) in entries {
            table.entries.entry(ip).or_default().push(neighbor);
        }
        table
    }

    pub fn with_gateway(self, gateway: Option<Ipv4Addr>) -> Self {
        Self { gateway, ..self }
    }

    pub fn with_gateway_device(self, device: Option<String>) -> Self {
        Self {
            gateway_device: device,
            ..self
        }
    }

    /// Parses `/proc/net/arp`. Incomplete entries, zero MACs and
    /// multicast or broadcast addresses are left out.
    pub fn parse_proc_arp(text: &str) -> Self {
        let entries = text.lines().skip(1).filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let ip: Ipv4Addr = cols[0].parse().ok()?;
            let flags = u32::from_str_radix(cols[2].trim_start_matches("0x"), 16).ok()?;
            let mac = mac::parse_mac(cols[3])?;
            let usable = flags & ATF_COM != 0
                && !mac::is_zero(mac)
                && !ip.is_multicast()
                && !ip.is_broadcast();
            let device = cols.get(5).map(|d| d.to_string());
            usable.then_some((ip, Neighbor { mac, device }))
        });
        Self::collect(entries)
    }

    /// MAC of `ip` as seen on `device`. With no device given, the first entry wins.
    pub fn mac_of(&self, ip: Ipv4Addr, device: Option<&str>) -> Option<MacAddr> {
        self.entries
            .get(&ip)?
            .iter()
            .find(|n| n.seen_on(device))
            .map(|n| n.mac)
    }

    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    /// Interface the default route leaves through, when known.
    pub fn gateway_device(&self) -> Option<&str> {
        self.gateway_device.as_deref()
    }

    pub fn gateway_mac(&self) -> Option<MacAddr> {
        self.gateway.and_then(|gw| self.mac_of(gw, self.gateway_device()))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Default IPv4 gateway from `/proc/net/route`, with the interface it is on.
///
/// Addresses there are hex in host byte order.
pub fn parse_proc_route(text: &str) -> Option<(Ipv4Addr, String)> {
    text.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 || cols[1] != "00000000" {
            return None;
        }
        let flags = u32::from_str_radix(cols[3], 16).ok()?;
        if flags & RTF_GATEWAY == 0 {
            return None;
        }
        let raw = u32::from_str_radix(cols[2], 16).ok()?;
        Some((Ipv4Addr::from(raw.to_ne_bytes()), cols[0].to_string()))
    })
}

/// Where the liveness stage gets its layer-2 view from.
#[async_trait]
pub trait NeighborSource: Send + Sync {
    /// Never fails: an unreadable table is an empty table.
    async fn snapshot(&self) -> NeighborTable;
}

/// Reads the Linux procfs tables.
#[derive(Debug, Clone)]
pub struct ProcNeighborSource {
    arp_path: PathBuf,
    route_path: PathBuf,
}

impl Default for ProcNeighborSource {
    fn default() -> Self {
        Self {
            arp_path: PathBuf::from("/proc/net/arp"),
            route_path: PathBuf::from("/proc/net/route"),
        }
    }
}

impl ProcNeighborSource {
    pub fn with_paths(arp_path: impl Into<PathBuf>, route_path: impl Into<PathBuf>) -> Self {
        Self {
            arp_path: arp_path.into(),
            route_path: route_path.into(),
        }
    }
}

#[async_trait]
impl NeighborSource for ProcNeighborSource {
    async fn snapshot(&self) -> NeighborTable {
        let table = match tokio::fs::read_to_string(&self.arp_path).await {
            Ok(text) => NeighborTable::parse_proc_arp(&text),
            Err(e) => {
                warn!("Neighbour table {} unreadable: {e}", self.arp_path.display());
                NeighborTable::default()
            }
        };
        let route = match tokio::fs::read_to_string(&self.route_path).await {
            Ok(text) => parse_proc_route(&text),
            Err(e) => {
                debug!("Route table {} unreadable: {e}", self.route_path.display());
                None
            }
        };
        debug!("Neighbour snapshot: {} entries, default route {route:?}", table.len());
        let (gateway, device) = route.unzip();
        table.with_gateway(gateway).with_gateway_device(device)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
