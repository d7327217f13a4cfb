//! # Banner Grabbing
//!
//! One [`ServiceBanner`] per open port. Each port gets exactly one prober, picked
//! from the [`ProbeTable`] by port number. A prober never fails the host: any
//! error, timeout included, degrades to a minimal "open" banner.
//!
//! Probes for a single host run one after another. Scanning is parallel;
//! fingerprinting is kept sequential so a fragile embedded device sees at most
//! one negotiation at a time from us.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use lanprobe_common::config::RunConfig;
use lanprobe_common::error::ProbeError;
use lanprobe_common::events::{EventCategory, EventSink};
use lanprobe_common::models::{HostAddress, ServiceBanner};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::network::tcp;

mod binary;
mod http;
pub mod table;
mod text;
pub mod tls;

pub use table::{ProbeKind, ProbeTable, service_for_port};
pub use tls::TlsProber;

/// What a single prober produced.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The service identified itself.
    Rich(ServiceBanner),
    /// The exchange completed but said little.
    Minimal(ServiceBanner),
    /// The port is open but the exchange failed.
    FailedOpen(ProbeError),
}

impl ProbeOutcome {
    /// Collapses the outcome into a banner. Failures become placeholders.
    pub fn into_banner(self, port: u16, kind: ProbeKind) -> ServiceBanner {
        match self {
            ProbeOutcome::Rich(banner) | ProbeOutcome::Minimal(banner) => banner,
            ProbeOutcome::FailedOpen(e) => {
                debug!("Probe {} on port {port} failed: {e}", kind.probe_name());
                fallback_banner(port, kind)
            }
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, ProbeOutcome::Rich(_))
    }
}

fn fallback_banner(port: u16, kind: ProbeKind) -> ServiceBanner {
    match kind {
        ProbeKind::Https => ServiceBanner::new(port, ProbeKind::Https.probe_name(), "https", "open (tls)"),
        _ => ServiceBanner::open_only(port, service_for_port(port)),
    }
}

/// Deadlines and cancellation shared by every exchange against one port.
pub(crate) struct ProbeContext<'a> {
    pub host: HostAddress,
    pub port: u16,
    connect_timeout: Duration,
    io_timeout: Duration,
    cancel: &'a CancellationToken,
}

impl ProbeContext<'_> {
    pub async fn connect(&self) -> Result<TcpStream, ProbeError> {
        tcp::connect_from(self.host, self.port, self.connect_timeout, self.cancel).await
    }

    /// Runs one exchange under the banner timeout and the run cancellation.
    pub async fn within<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            res = timeout(self.io_timeout, fut) => res.unwrap_or(Err(ProbeError::timeout(operation))),
        }
    }

    /// Like [`within`](Self::within) for exchanges that track their own deadline.
    pub async fn unless_cancelled<T, F>(&self, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            res = fut => res,
        }
    }

    /// When an exchange started now must be done.
    pub fn io_deadline(&self) -> Instant {
        Instant::now() + self.io_timeout
    }

    pub fn host_header(&self) -> String {
        self.host.ip.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct BannerGrabber {
    table: ProbeTable,
    connect_timeout: Duration,
    banner_timeout: Duration,
    tls: Option<TlsProber>,
    events: EventSink,
}

impl BannerGrabber {
    pub fn new(config: &RunConfig) -> Self {
        let tls = match TlsProber::new() {
            Ok(prober) => Some(prober),
            Err(e) => {
                warn!("TLS prober unavailable, HTTPS ports will only be marked open: {e}");
                None
            }
        };
        Self {
            table: ProbeTable::from_config(config),
            connect_timeout: config.connect_timeout(),
            banner_timeout: config.banner_timeout(),
            tls,
            events: EventSink::disabled(),
        }
    }

    pub fn with_table(mut self, table: ProbeTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn table(&self) -> &ProbeTable {
        &self.table
    }

    /// Banners for every open port, ascending, with duplicate web content linked.
    pub async fn grab_all(
        &self,
        host: HostAddress,
        open_ports: &[u16],
        cancel: &CancellationToken,
    ) -> Vec<ServiceBanner> {
        let mut banners = Vec::with_capacity(open_ports.len());
        for &port in open_ports {
            let banner = self.grab(host, port, cancel).await;
            self.events.emit(
                host.ip,
                EventCategory::Banner,
                format!("{port}/{} {}", banner.service, banner.summary),
            );
            banners.push(banner);
        }
        banners.sort_by_key(|b| b.port);
        banners.dedup_by_key(|b| b.port);
        link_duplicates(banners)
    }

    /// Runs the prober the table assigns to `port`. Never fails.
    pub async fn grab(&self, host: HostAddress, port: u16, cancel: &CancellationToken) -> ServiceBanner {
        let kind = self.table.kind_for(port);
        let ctx = ProbeContext {
            host,
            port,
            connect_timeout: self.connect_timeout,
            io_timeout: self.banner_timeout,
            cancel,
        };

        let outcome = match kind {
            ProbeKind::FactOnly => ProbeOutcome::Minimal(ServiceBanner::open_only(port, service_for_port(port))),
            ProbeKind::Http => http::probe(&ctx, None).await,
            ProbeKind::Https => match &self.tls {
                Some(tls) => http::probe(&ctx, Some(tls)).await,
                None => ProbeOutcome::FailedOpen(ProbeError::Tls("no TLS connector".into())),
            },
            ProbeKind::Ssh => self.exchange(&ctx, text::ssh).await,
            ProbeKind::Vnc => self.exchange(&ctx, text::vnc).await,
            ProbeKind::Peek => self.exchange(&ctx, text::peek).await,
            ProbeKind::Pjl => self.exchange(&ctx, text::pjl).await,
            ProbeKind::Rtsp => {
                let host_header = ctx.host_header();
                self.exchange(&ctx, move |stream, port| text::rtsp(stream, port, host_header))
                    .await
            }
            ProbeKind::Rdp => self.exchange(&ctx, binary::rdp).await,
            ProbeKind::Smb2 => {
                let guid: [u8; 16] = rand::random();
                self.exchange(&ctx, move |stream, port| binary::smb2(stream, port, guid))
                    .await
            }
        };
        outcome.into_banner(port, kind)
    }

    /// Connects, then hands the stream to a single-exchange prober.
    async fn exchange<P, F>(&self, ctx: &ProbeContext<'_>, prober: P) -> ProbeOutcome
    where
        P: FnOnce(TcpStream, u16) -> F,
        F: Future<Output = Result<ProbeOutcome, ProbeError>>,
    {
        let stream = match ctx.connect().await {
            Ok(stream) => stream,
            Err(e) => return ProbeOutcome::FailedOpen(e),
        };
        ctx.within("banner exchange", prober(stream, ctx.port))
            .await
            .unwrap_or_else(ProbeOutcome::FailedOpen)
    }
}

/// Marks web banners that serve byte-identical content as duplicates of the
/// lowest port in their group. The lowest port itself carries no reference.
pub fn link_duplicates(banners: Vec<ServiceBanner>) -> Vec<ServiceBanner> {
    let mut lowest: HashMap<String, u16> = HashMap::new();
    let mut group_size: HashMap<String, usize> = HashMap::new();
    for banner in banners.iter().filter(|b| is_dedup_candidate(b)) {
        if let Some(hash) = &banner.content_hash {
            let entry = lowest.entry(hash.clone()).or_insert(banner.port);
            *entry = (*entry).min(banner.port);
            *group_size.entry(hash.clone()).or_default() += 1;
        }
    }

    banners
        .into_iter()
        .map(|banner| {
            if !is_dedup_candidate(&banner) {
                return banner;
            }
            let Some(hash) = banner.content_hash.clone() else {
                return banner;
            };
            match (lowest.get(&hash), group_size.get(&hash)) {
                (Some(&first), Some(&size)) if size > 1 && first != banner.port => banner.duplicate_of(first),
                _ => banner,
            }
        })
        .collect()
}

fn is_dedup_candidate(banner: &ServiceBanner) -> bool {
    banner.is_web() && banner.content_hash.as_deref().is_some_and(|h| !h.is_empty())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
