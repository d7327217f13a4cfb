//! # Scan Targets
//!
//! Parses the target expressions accepted on the command line:
//! * a single address (`192.168.1.5`)
//! * a range, with an abbreviated or full end (`192.168.1.1-50`, `10.0.0.1-10.0.1.20`)
//! * a CIDR block (`192.168.1.0/24`)
//! * the keyword `lan`, resolved to the best local private network
//! * any comma-separated mix of the above

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ConfigError;
use crate::network::interface;

/// Upper bound on the number of addresses a single run expands to (a /16).
pub const MAX_TARGETS: usize = 1 << 16;

/// Inclusive IPv4 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Range {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    /// Usable hosts of a network. Network and broadcast addresses are left out
    /// unless the prefix is /31 or /32, where every address is a host.
    pub fn hosts_of(network: Ipv4Network) -> Self {
        let first = u32::from(network.network());
        let last = u32::from(network.broadcast());
        if network.prefix() >= 31 {
            Self::new(first.into(), last.into())
        } else {
            Self::new((first + 1).into(), (last - 1).into())
        }
    }

    pub fn len(&self) -> usize {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if end < start { 0 } else { (end - start) as usize + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Lan,
    Host(Ipv4Addr),
    Range(Ipv4Range),
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("lan") {
            return Ok(Target::Lan);
        }
        if let Ok(ip) = s.parse::<Ipv4Addr>() {
            return Ok(Target::Host(ip));
        }
        if let Some((start, end)) = s.split_once('-') {
            let start: Ipv4Addr = start
                .trim()
                .parse()
                .map_err(|e| invalid(format!("bad range start in '{s}': {e}")))?;
            let end = parse_range_end(end.trim(), start)?;
            if u32::from(end) < u32::from(start) {
                return Err(invalid(format!("range '{s}' ends before it starts")));
            }
            return Ok(Target::Range(Ipv4Range::new(start, end)));
        }
        if s.contains('/') {
            let network: Ipv4Network = s
                .parse()
                .map_err(|e| invalid(format!("bad CIDR block '{s}': {e}")))?;
            return Ok(Target::Range(Ipv4Range::hosts_of(network)));
        }
        Err(invalid(format!("'{s}' is not an IPv4 address, range or CIDR block")))
    }
}

impl Target {
    fn expand(&self) -> Result<Ipv4Range, ConfigError> {
        match self {
            Target::Lan => Ok(Ipv4Range::hosts_of(interface::lan_network()?)),
            Target::Host(ip) => Ok(Ipv4Range::new(*ip, *ip)),
            Target::Range(range) => Ok(*range),
        }
    }
}

/// Expands a target expression into an ordered, duplicate-free address list.
pub fn parse_targets(spec: &str) -> Result<Vec<Ipv4Addr>, ConfigError> {
    let targets = spec
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Target::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if targets.is_empty() {
        return Err(invalid("no targets given".to_string()));
    }

    let mut seen = HashSet::new();
    let mut addrs = Vec::new();
    for target in &targets {
        let range = target.expand()?;
        if addrs.len() + range.len() > MAX_TARGETS {
            return Err(invalid(format!("more than {MAX_TARGETS} addresses requested")));
        }
        addrs.extend(range.iter().filter(|ip| seen.insert(*ip)));
    }
    Ok(addrs)
}

/// End of a range: a full address, or trailing octets that replace the
/// start's last octets (`192.168.1.10-2.66` ends at `192.168.2.66`).
fn parse_range_end(end: &str, start: Ipv4Addr) -> Result<Ipv4Addr, ConfigError> {
    if let Ok(full) = end.parse::<Ipv4Addr>() {
        return Ok(full);
    }
    let partial = end
        .split('.')
        .map(str::parse::<u8>)
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| invalid(format!("bad range end '{end}': {e}")))?;
    if partial.len() > 4 {
        return Err(invalid(format!("range end '{end}' has too many octets")));
    }
    let mut octets = start.octets();
    octets[4 - partial.len()..].copy_from_slice(&partial);
    Ok(Ipv4Addr::from(octets))
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: "targets",
        reason,
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
