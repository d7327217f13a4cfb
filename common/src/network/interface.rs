//! Local interface selection.
//!
//! Every probe socket is bound to the address of the interface that routes to
//! the target, so a multi-homed machine never leaks probes out of the wrong
//! link. This module maps targets to [`HostAddress`] values carrying that
//! interface address.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use pnet::util::MacAddr;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::models::HostAddress;

/// An IPv4-configured local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub addr: Ipv4Addr,
    pub network: Ipv4Network,
    pub mac: Option<MacAddr>,
    pub loopback: bool,
}

impl LocalInterface {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.network.contains(ip)
    }
}

/// Why an interface cannot anchor a LAN sweep.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Rejection {
    /// The interface is operationally down.
    IsDown,
    IsLoopback,
    /// No hardware address, so neighbours cannot be resolved over ARP.
    NoMacAddress,
    NotBroadcast,
    /// Point-to-point links (VPNs, tunnels) have no neighbours to sweep.
    IsPointToPoint,
    /// No private IPv4 address to derive a LAN from.
    NoPrivateIpv4,
}

/// Every up interface with at least one IPv4 address, loopback included.
pub fn local_interfaces() -> Vec<LocalInterface> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up())
        .flat_map(|iface| to_local(&iface))
        .collect()
}

fn to_local(iface: &NetworkInterface) -> Vec<LocalInterface> {
    iface
        .ips
        .iter()
        .filter_map(|net| match net {
            IpNetwork::V4(v4) => Some(LocalInterface {
                name: iface.name.clone(),
                addr: v4.ip(),
                network: *v4,
                mac: iface.mac,
                loopback: iface.is_loopback(),
            }),
            IpNetwork::V6(_) => None,
        })
        .collect()
}

/// Binds each target to the local address that routes to it.
///
/// Targets no interface can reach are dropped with a warning. If none of the
/// targets is reachable the run cannot start and a [`ConfigError`] is returned.
pub fn bind_targets(targets: &[Ipv4Addr]) -> Result<Vec<HostAddress>, ConfigError> {
    let interfaces = local_interfaces();
    if interfaces.is_empty() {
        return Err(ConfigError::NoUsableInterface(
            "no interface with an IPv4 address is up".into(),
        ));
    }
    bind_with(&interfaces, targets, resolve_route_source)
}

/// Binding logic with an injectable route lookup.
pub fn bind_with<R>(
    interfaces: &[LocalInterface],
    targets: &[Ipv4Addr],
    route_source: R,
) -> Result<Vec<HostAddress>, ConfigError>
where
    R: Fn(Ipv4Addr) -> Option<Ipv4Addr> + Sync,
{
    let bound: Vec<HostAddress> = targets
        .par_iter()
        .filter_map(|&ip| {
            let iface = on_link_interface(interfaces, ip).map(|i| i.addr).or_else(|| {
                route_source(ip).filter(|src| interfaces.iter().any(|i| i.addr == *src))
            });
            match iface {
                Some(iface) => Some(HostAddress::new(ip, iface)),
                None => {
                    debug!("No local interface routes to {ip}");
                    None
                }
            }
        })
        .collect();

    if bound.is_empty() && !targets.is_empty() {
        return Err(ConfigError::NoUsableInterface(format!(
            "none of the {} targets is reachable from a local interface",
            targets.len()
        )));
    }
    if bound.len() < targets.len() {
        warn!("{} targets have no route and were skipped", targets.len() - bound.len());
    }
    Ok(bound)
}

/// Interface whose subnet contains `ip`, or which owns `ip` itself.
pub fn on_link_interface(interfaces: &[LocalInterface], ip: Ipv4Addr) -> Option<&LocalInterface> {
    interfaces
        .iter()
        .find(|iface| iface.addr == ip)
        .or_else(|| {
            interfaces
                .iter()
                .filter(|iface| iface.network.prefix() > 0)
                .find(|iface| iface.contains(ip))
        })
}

/// Asks the kernel which source address it would use to reach `target`.
/// A connected UDP socket sends nothing.
fn resolve_route_source(target: Ipv4Addr) -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((target, 53)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    }
}

/// Picks the private IPv4 network of the best LAN-facing interface.
pub fn lan_network() -> Result<Ipv4Network, ConfigError> {
    let candidates: Vec<NetworkInterface> = datalink::interfaces()
        .into_iter()
        .filter(|iface| check_lan_interface(iface).is_ok())
        .collect();

    let iface = prefer_wired(candidates).ok_or_else(|| {
        ConfigError::NoUsableInterface("no LAN-facing interface with a private IPv4 address".into())
    })?;

    iface
        .ips
        .iter()
        .find_map(|net| match net {
            IpNetwork::V4(v4) if v4.ip().is_private() => Some(*v4),
            _ => None,
        })
        .ok_or_else(|| ConfigError::NoUsableInterface(format!("{} lost its address", iface.name)))
}

fn check_lan_interface(iface: &NetworkInterface) -> Result<(), Rejection> {
    if !iface.is_up() {
        return Err(Rejection::IsDown);
    }
    if iface.is_loopback() {
        return Err(Rejection::IsLoopback);
    }
    if iface.mac.is_none_or(|mac| mac == MacAddr::zero()) {
        return Err(Rejection::NoMacAddress);
    }
    if !iface.is_broadcast() {
        return Err(Rejection::NotBroadcast);
    }
    if iface.is_point_to_point() {
        return Err(Rejection::IsPointToPoint);
    }
    let has_private = iface.ips.iter().any(|net| match net {
        IpNetwork::V4(v4) => v4.ip().is_private(),
        IpNetwork::V6(_) => false,
    });
    if !has_private {
        return Err(Rejection::NoPrivateIpv4);
    }
    Ok(())
}

/// Wired links first (`en*`, `eth*`), then whatever came first.
fn prefer_wired(mut candidates: Vec<NetworkInterface>) -> Option<NetworkInterface> {
    candidates.sort_by_key(|iface| !(iface.name.starts_with("en") || iface.name.starts_with("eth")));
    candidates.into_iter().next()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
