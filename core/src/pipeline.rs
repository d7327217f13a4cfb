//! # Pipeline
//!
//! Sequences one run: a liveness sweep over every candidate, then per live host
//! a port scan and banner grab, then classification. Hosts are processed under
//! the run-wide host limit; each one gets a child cancellation token so the run
//! deadline reaches every in-flight socket.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use lanprobe_common::config::RunConfig;
use lanprobe_common::error::ConfigError;
use lanprobe_common::events::{EventCategory, EventSink};
use lanprobe_common::models::{DeviceAnalysisResult, DeviceFact, HostAddress};
use lanprobe_common::network::interface::LocalInterface;
use lanprobe_common::success;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::banner::BannerGrabber;
use crate::classify::{DeviceClassifier, ScoringTables};
use crate::liveness::{EchoProber, LivenessProbe, NeighborSource, ProcNeighborSource, SurgeEchoProber};
use crate::port_scan::PortScanner;
use crate::vendors::OuiVendorResolver;

/// Everything a run produced, sorted by IP.
#[derive(Debug, Default)]
pub struct RunReport {
    pub facts: Vec<DeviceFact>,
    pub analyses: Vec<DeviceAnalysisResult>,
    /// Set when the run deadline or the caller stopped the run early.
    pub cancelled: bool,
}

/// Per-host stages, shared by every host task.
struct HostStages {
    scanner: PortScanner,
    grabber: BannerGrabber,
}

impl HostStages {
    async fn enrich(&self, fact: DeviceFact, cancel: &CancellationToken) -> DeviceFact {
        let host = fact.host();
        let open = self.scanner.open_ports(host, cancel).await;
        let banners = self.grabber.grab_all(host, &open, cancel).await;
        fact.with_open_ports(open).with_banners(banners)
    }
}

pub struct Pipeline {
    liveness: LivenessProbe,
    stages: Arc<HostStages>,
    classifier: DeviceClassifier,
    events: EventSink,
    host_concurrency: usize,
    run_timeout: Option<Duration>,
    hostname_hints: HashMap<Ipv4Addr, String>,
}

impl Pipeline {
    pub fn builder(config: RunConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn classifier(&self) -> &DeviceClassifier {
        &self.classifier
    }

    /// Runs every stage over `hosts`. Cancelling `cancel` stops the run; hosts
    /// already found alive are still reported with what was learned so far.
    pub async fn run(&self, hosts: &[HostAddress], cancel: &CancellationToken) -> RunReport {
        let run_token = cancel.child_token();
        // Stops the deadline task once the run is over.
        let _run_guard = run_token.clone().drop_guard();
        if let Some(limit) = self.run_timeout {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(limit) => {
                        warn!("Run deadline of {}s reached, cancelling in-flight probes", limit.as_secs());
                        token.cancel();
                    }
                }
            });
        }

        let alive = self.liveness.sweep(hosts, &run_token).await;
        let facts = self.enrich_all(alive, &run_token).await;
        let cancelled = run_token.is_cancelled();

        let analyses: Vec<DeviceAnalysisResult> = facts
            .iter()
            .map(|fact| {
                let analysis = self.classifier.analyze(fact);
                self.events.emit(
                    fact.ip(),
                    EventCategory::Classified,
                    format!(
                        "{} ({:.2})",
                        analysis.classification.kind, analysis.classification.confidence
                    ),
                );
                analysis
            })
            .collect();

        if cancelled {
            warn!("Run stopped early; {} hosts reported", facts.len());
        } else {
            success!("Classified {} of {} hosts", analyses.len(), hosts.len());
        }

        RunReport {
            facts,
            analyses,
            cancelled,
        }
    }

    async fn enrich_all(&self, alive: Vec<DeviceFact>, cancel: &CancellationToken) -> Vec<DeviceFact> {
        info!("Scanning {} live hosts", alive.len());
        let limiter = Arc::new(Semaphore::new(self.host_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut done = Vec::with_capacity(alive.len());

        for fact in alive {
            let fact = self.with_hint(fact);
            let permit = if cancel.is_cancelled() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = limiter.clone().acquire_owned() => permit.ok(),
                }
            };
            let Some(permit) = permit else {
                self.events.emit(fact.ip(), EventCategory::Warning, "not scanned, run cancelled");
                done.push(fact);
                continue;
            };

            let stages = Arc::clone(&self.stages);
            let host_token = cancel.child_token();
            tasks.spawn(async move {
                let enriched = stages.enrich(fact, &host_token).await;
                drop(permit);
                enriched
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(fact) => {
                    debug!("{}: {} open ports", fact.ip(), fact.open_ports().len());
                    done.push(fact);
                }
                Err(e) => warn!("Host task failed: {e}"),
            }
        }

        done.sort_by_key(|f| f.ip());
        done
    }

    fn with_hint(&self, fact: DeviceFact) -> DeviceFact {
        let hint = self.hostname_hints.get(&fact.ip()).cloned();
        fact.merge_hostname_hint(hint)
    }
}

/// Wires a [`Pipeline`] from a config. Every collaborator can be swapped, which
/// is how tests replace ICMP and the neighbour table.
pub struct PipelineBuilder {
    config: RunConfig,
    vendors: Option<Arc<OuiVendorResolver>>,
    echo: Option<Arc<dyn EchoProber>>,
    neighbors: Option<Arc<dyn NeighborSource>>,
    tables: Option<ScoringTables>,
    events: EventSink,
    local_interfaces: Vec<LocalInterface>,
    hostname_hints: HashMap<Ipv4Addr, String>,
}

impl PipelineBuilder {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            vendors: None,
            echo: None,
            neighbors: None,
            tables: None,
            events: EventSink::disabled(),
            local_interfaces: Vec::new(),
            hostname_hints: HashMap::new(),
        }
    }

    pub fn vendors(mut self, vendors: Arc<OuiVendorResolver>) -> Self {
        self.vendors = Some(vendors);
        self
    }

    pub fn echo(mut self, echo: Arc<dyn EchoProber>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn neighbors(mut self, neighbors: Arc<dyn NeighborSource>) -> Self {
        self.neighbors = Some(neighbors);
        self
    }

    pub fn scoring_tables(mut self, tables: ScoringTables) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Interfaces the targets were bound to; see [`LivenessProbe::with_local_interfaces`].
    pub fn local_interfaces(mut self, interfaces: Vec<LocalInterface>) -> Self {
        self.local_interfaces = interfaces;
        self
    }

    /// Hostnames learned elsewhere (mDNS, NBNS); only fill facts without one.
    pub fn hostname_hints(mut self, hints: HashMap<Ipv4Addr, String>) -> Self {
        self.hostname_hints = hints;
        self
    }

    /// Validates the config and builds the stages. Vendor tables are loaded
    /// from `oui_dir` unless a resolver was supplied.
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let config = self.config;
        config.validate()?;

        let vendors = match self.vendors {
            Some(vendors) => vendors,
            None => Arc::new(OuiVendorResolver::load_dir(&config.oui_dir).with_builtin_fallback()),
        };
        let echo = self.echo.unwrap_or_else(|| Arc::new(SurgeEchoProber::new()));
        let neighbors = self
            .neighbors
            .unwrap_or_else(|| Arc::new(ProcNeighborSource::default()));
        let classifier = match self.tables {
            Some(tables) => DeviceClassifier::new(tables, Arc::clone(&vendors), config.high_rtt_ms),
            None => DeviceClassifier::from_config(&config, Arc::clone(&vendors))?,
        };

        let liveness = LivenessProbe::new(&config, echo, neighbors, vendors)
            .with_events(self.events.clone())
            .with_local_interfaces(self.local_interfaces);
        let stages = HostStages {
            scanner: PortScanner::new(&config).with_events(self.events.clone()),
            grabber: BannerGrabber::new(&config).with_events(self.events.clone()),
        };

        Ok(Pipeline {
            liveness,
            stages: Arc::new(stages),
            classifier,
            events: self.events,
            host_concurrency: config.host_concurrency,
            run_timeout: config.run_timeout(),
            hostname_hints: self.hostname_hints,
        })
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
