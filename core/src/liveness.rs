//! # Liveness
//!
//! Decides which candidate hosts are worth scanning. A host stays in the run if
//! it answered an ICMP echo or shows up in the kernel neighbour table after the
//! ping sweep. Everything else is dropped without an error.

use std::sync::Arc;
use std::time::Duration;

use lanprobe_common::config::RunConfig;
use lanprobe_common::events::{EventCategory, EventSink};
use lanprobe_common::models::{DeviceFact, HostAddress, IcmpObservation};
use lanprobe_common::network::interface::LocalInterface;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::vendors::OuiVendorResolver;

pub mod icmp;
pub mod neighbors;

pub use icmp::{EchoProber, EchoReply, SurgeEchoProber};
pub use neighbors::{NeighborSource, NeighborTable, ProcNeighborSource};

/// Echo attempts for one host. Cloned into each spawned ping task.
#[derive(Clone)]
struct PingPlan {
    echo: Arc<dyn EchoProber>,
    attempts: u32,
    attempt_timeout: Duration,
    attempt_delay: Duration,
}

impl PingPlan {
    async fn run(&self, host: HostAddress, cancel: &CancellationToken) -> IcmpObservation {
        let mut observation = IcmpObservation::silent();

        for attempt in 0..self.attempts {
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                reply = self.echo.echo(host, attempt as u16, self.attempt_timeout) => reply,
            };

            if let Some(reply) = reply {
                let rtt_ms = reply.rtt.as_millis().min(u32::MAX as u128) as u32;
                observation.ok = true;
                observation.rtt_ms = Some(observation.rtt_ms.map_or(rtt_ms, |best| best.min(rtt_ms)));
                if reply.ttl.is_some() {
                    observation.ttl = reply.ttl;
                }
            }

            if attempt + 1 < self.attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.attempt_delay) => {}
                }
            }
        }
        observation
    }
}

pub struct LivenessProbe {
    plan: PingPlan,
    neighbors: Arc<dyn NeighborSource>,
    vendors: Arc<OuiVendorResolver>,
    events: EventSink,
    host_concurrency: usize,
    local_interfaces: Vec<LocalInterface>,
}

impl LivenessProbe {
    pub fn new(
        config: &RunConfig,
        echo: Arc<dyn EchoProber>,
        neighbors: Arc<dyn NeighborSource>,
        vendors: Arc<OuiVendorResolver>,
    ) -> Self {
        Self {
            plan: PingPlan {
                echo,
                attempts: config.ping_attempts,
                attempt_timeout: config.ping_timeout(),
                attempt_delay: config.ping_delay(),
            },
            neighbors,
            vendors,
            events: EventSink::disabled(),
            host_concurrency: config.host_concurrency,
            local_interfaces: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Local interfaces. They name the device a host's neighbour entry must be
    /// on, and tell on-link hosts apart from routed ones.
    pub fn with_local_interfaces(mut self, interfaces: Vec<LocalInterface>) -> Self {
        self.local_interfaces = interfaces;
        self
    }

    /// Sends the configured number of echo requests. RTT is the best reply,
    /// TTL the last one.
    pub async fn ping(&self, host: HostAddress, cancel: &CancellationToken) -> IcmpObservation {
        self.plan.run(host, cancel).await
    }

    /// Combines one host's ICMP result with the neighbour snapshot.
    pub fn assess(
        &self,
        host: HostAddress,
        icmp: IcmpObservation,
        table: &NeighborTable,
    ) -> Option<DeviceFact> {
        let iface = self.local_interfaces.iter().find(|i| i.addr == host.iface);
        let device = iface.map(|i| i.name.as_str());
        let mac = table.mac_of(host.ip, device);
        let fact = DeviceFact::from_liveness(host, icmp, mac)?;

        let (proxy_arp, route_mismatch) = match table.gateway_mac() {
            Some(gateway_mac) => {
                let is_gateway = table.gateway() == Some(host.ip);
                let same_link = match (device, table.gateway_device()) {
                    (Some(ours), Some(gateway)) => ours == gateway,
                    _ => true,
                };
                let proxy_arp = same_link && mac == Some(gateway_mac) && !is_gateway;
                let on_link = iface.is_some_and(|i| i.contains(host.ip));
                (proxy_arp, icmp.ok && mac.is_none() && on_link)
            }
            None => (false, false),
        };

        let vendor = mac.and_then(|m| self.vendors.vendor_of(m));
        Some(fact.with_vendor(vendor).with_link_flags(proxy_arp, route_mismatch))
    }

    /// Pings every host under the host limit, then reads the neighbour table
    /// once (the sweep itself populates it) and keeps the live hosts.
    pub async fn sweep(&self, hosts: &[HostAddress], cancel: &CancellationToken) -> Vec<DeviceFact> {
        info!("Sweeping {} hosts ({} echo attempts each)", hosts.len(), self.plan.attempts);

        let limiter = Arc::new(Semaphore::new(self.host_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for &host in hosts {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let plan = self.plan.clone();
            let cancel = cancel.child_token();
            tasks.spawn(async move {
                let observation = plan.run(host, &cancel).await;
                drop(permit);
                (host, observation)
            });
        }

        let mut observations = Vec::with_capacity(hosts.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => observations.push(pair),
                Err(e) => warn!("Ping task failed: {e}"),
            }
        }

        let table = self.neighbors.snapshot().await;
        debug!("Neighbour table holds {} entries", table.len());

        let mut facts = Vec::new();
        for (host, observation) in observations {
            match self.assess(host, observation, &table) {
                Some(fact) => {
                    self.events.emit(
                        host.ip,
                        EventCategory::Alive,
                        format!("alive via {}", fact.alive_source().as_str()),
                    );
                    facts.push(fact);
                }
                None => self.events.emit(host.ip, EventCategory::Unreachable, "no icmp or arp reply"),
            }
        }
        facts.sort_by_key(|f| f.ip());
        info!("{} of {} hosts alive", facts.len(), hosts.len());
        facts
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
