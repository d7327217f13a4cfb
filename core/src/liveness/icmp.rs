//! ICMP echo via `surge-ping`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lanprobe_common::models::HostAddress;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence};
use tracing::{trace, warn};

const PAYLOAD: [u8; 56] = [0; 56];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub rtt: Duration,
    pub ttl: Option<u8>,
}

/// One echo request/reply exchange. `None` covers timeouts and every error:
/// a single lost ping is not worth reporting.
#[async_trait]
pub trait EchoProber: Send + Sync {
    async fn echo(&self, host: HostAddress, seq: u16, timeout: Duration) -> Option<EchoReply>;
}

/// Echo prober holding one ICMP client per local interface address.
#[derive(Default)]
pub struct SurgeEchoProber {
    clients: Mutex<HashMap<Ipv4Addr, Option<Arc<Client>>>>,
    warned: AtomicBool,
}

impl SurgeEchoProber {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, iface: Ipv4Addr) -> Option<Arc<Client>> {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        clients
            .entry(iface)
            .or_insert_with(|| {
                let config = if iface.is_unspecified() {
                    Config::default()
                } else {
                    Config::builder()
                        .bind(SocketAddr::new(IpAddr::V4(iface), 0))
                        .build()
                };
                match Client::new(&config) {
                    Ok(client) => Some(Arc::new(client)),
                    Err(e) => {
                        if !self.warned.swap(true, Ordering::Relaxed) {
                            warn!("ICMP unavailable ({e}); liveness falls back to ARP only");
                        }
                        None
                    }
                }
            })
            .clone()
    }
}

#[async_trait]
impl EchoProber for SurgeEchoProber {
    async fn echo(&self, host: HostAddress, seq: u16, timeout: Duration) -> Option<EchoReply> {
        let client = self.client_for(host.iface)?;
        let mut pinger = client
            .pinger(IpAddr::V4(host.ip), PingIdentifier(rand::random()))
            .await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(seq), &PAYLOAD).await {
            Ok((packet, rtt)) => {
                let ttl = match packet {
                    IcmpPacket::V4(p) => p.get_ttl(),
                    IcmpPacket::V6(_) => None,
                };
                Some(EchoReply { rtt, ttl })
            }
            Err(e) => {
                trace!("echo {} seq {seq}: {e}", host.ip);
                None
            }
        }
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
