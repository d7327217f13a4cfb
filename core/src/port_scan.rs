//! TCP connect scanning of one host's candidate ports.

use std::sync::Arc;
use std::time::Duration;

use lanprobe_common::config::RunConfig;
use lanprobe_common::events::{EventCategory, EventSink};
use lanprobe_common::models::{HostAddress, PortProbeResult};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::network::tcp;

/// Connect scanner with its own per-host concurrency bound.
///
/// The bound is independent of the pipeline's host limit; with `H` hosts in
/// flight at most `H * concurrency` connects are pending.
#[derive(Debug, Clone)]
pub struct PortScanner {
    ports: Vec<u16>,
    connect_timeout: Duration,
    concurrency: usize,
    events: EventSink,
}

impl PortScanner {
    pub fn new(config: &RunConfig) -> Self {
        Self::with_ports(config.scan_ports(), config.connect_timeout(), config.port_concurrency)
    }

    /// The port list is sorted and deduplicated here.
    pub fn with_ports(mut ports: Vec<u16>, connect_timeout: Duration, concurrency: usize) -> Self {
        ports.sort_unstable();
        ports.dedup();
        Self {
            ports,
            connect_timeout,
            concurrency: concurrency.max(1),
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// One result per candidate port, sorted by port. Ports not attempted
    /// because the run was cancelled are absent.
    pub async fn scan(&self, host: HostAddress, cancel: &CancellationToken) -> Vec<PortProbeResult> {
        let limiter = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for &port in &self.ports {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let cancel = cancel.clone();
            let deadline = self.connect_timeout;
            tasks.spawn(async move {
                let (open, latency) = tcp::probe_open(host, port, deadline, &cancel).await;
                drop(permit);
                trace!("{}:{port} {}", host.ip, if open { "open" } else { "closed" });
                if open {
                    PortProbeResult::open(port, latency)
                } else {
                    PortProbeResult::closed(port, latency)
                }
            });
        }

        let mut results = Vec::with_capacity(self.ports.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("Port task for {} failed: {e}", host.ip),
            }
        }
        results.sort_by_key(|r| r.port);

        for result in results.iter().filter(|r| r.open) {
            self.events.emit(
                host.ip,
                EventCategory::PortOpen,
                format!("{}/tcp open ({} ms)", result.port, result.latency.as_millis()),
            );
        }
        debug!(
            "{}: {} of {} ports open",
            host.ip,
            results.iter().filter(|r| r.open).count(),
            results.len()
        );
        results
    }

    /// Open ports only, ascending.
    pub async fn open_ports(&self, host: HostAddress, cancel: &CancellationToken) -> Vec<u16> {
        self.scan(host, cancel)
            .await
            .into_iter()
            .filter(|r| r.open)
            .map(|r| r.port)
            .collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    fn loopback() -> HostAddress {
        HostAddress::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST)
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn reports_open_and_closed_ports_in_order() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_a = a.local_addr().unwrap().port();
        let open_b = b.local_addr().unwrap().port();
        let closed = closed_port().await;

        let scanner = PortScanner::with_ports(
            vec![open_b, closed, open_a, open_b],
            Duration::from_millis(500),
            2,
        );
        let results = scanner.scan(loopback(), &CancellationToken::new()).await;

        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].port < w[1].port));
        let open: Vec<u16> = results.iter().filter(|r| r.open).map(|r| r.port).collect();
        let mut expected = vec![open_a, open_b];
        expected.sort_unstable();
        assert_eq!(open, expected);
    }

    #[tokio::test]
    async fn open_ports_filters_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let scanner = PortScanner::with_ports(vec![port, closed_port().await], Duration::from_millis(500), 8);

        assert_eq!(scanner.open_ports(loopback(), &CancellationToken::new()).await, vec![port]);
    }

    #[tokio::test]
    async fn cancelled_scan_returns_nothing() {
        let scanner = PortScanner::with_ports(vec![1, 2, 3], Duration::from_secs(1), 1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(scanner.scan(loopback(), &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn open_ports_emit_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (sink, mut rx) = EventSink::channel();
        let scanner = PortScanner::with_ports(vec![port], Duration::from_millis(500), 1).with_events(sink);

        scanner.scan(loopback(), &CancellationToken::new()).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.category, EventCategory::PortOpen);
        assert!(event.message.starts_with(&format!("{port}/tcp open")));
    }
}
