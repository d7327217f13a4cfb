use std::net::Ipv4Addr;
use std::time::Instant;

use anyhow::Context;
use colored::*;
use lanprobe_common::config::{RunConfig, parse_port_list};
use lanprobe_common::events::EventSink;
use lanprobe_common::network::interface::{bind_targets, lan_network, local_interfaces};
use lanprobe_common::network::target::{Ipv4Range, parse_targets};
use lanprobe_common::success;
use lanprobe_core::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::ScanArgs;
use crate::terminal::{colors, print, progress};

/// File, then `LANPROBE_*` variables, then flags.
pub fn load_config(args: &ScanArgs) -> anyhow::Result<RunConfig> {
    let base = match &args.config {
        Some(path) => RunConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    let mut config = base.merge_env().context("reading LANPROBE_* environment")?;

    if let Some(ports) = &args.ports {
        config.ports = parse_port_list(ports).context("parsing --ports")?;
    }
    if let Some(timeout) = args.timeout {
        config.connect_timeout_ms = timeout;
    }
    if let Some(concurrency) = args.concurrency {
        config.port_concurrency = concurrency;
    }
    if let Some(dir) = &args.oui_dir {
        config.oui_dir = dir.clone();
    }
    if args.pjl {
        config.pjl_probe = true;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn resolve_targets(spec: Option<&str>) -> anyhow::Result<Vec<Ipv4Addr>> {
    match spec {
        Some(spec) => parse_targets(spec).context("parsing targets"),
        None => {
            let network = lan_network().context("no target given and no LAN interface found")?;
            info!("No targets given, sweeping {network}");
            Ok(Ipv4Range::hosts_of(network).iter().collect())
        }
    }
}

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    if !is_root::is_root() {
        warn!("Not running as root: ICMP may be unavailable, liveness will lean on ARP");
    }

    let targets = resolve_targets(args.targets.as_deref())?;
    let hosts = bind_targets(&targets).context("binding targets to local interfaces")?;

    let (events, rx) = EventSink::channel();
    let pipeline = Pipeline::builder(config)
        .events(events)
        .local_interfaces(local_interfaces())
        .build()
        .context("building the scan pipeline")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with what has been found");
            on_interrupt.cancel();
        }
    });

    print::header("starting scanner");
    let started = Instant::now();
    let tracker = progress::track(hosts.len() as u64, rx);
    let report = pipeline.run(&hosts, &cancel).await;
    drop(pipeline);
    tracker.finish().await;

    if args.json {
        let json = serde_json::to_string_pretty(&report.analyses).context("serializing results")?;
        println!("{json}");
        return Ok(());
    }

    if report.analyses.is_empty() {
        print::header("zero hosts detected");
        print::no_results();
        return Ok(());
    }

    print::header("devices");
    print::analyses(&report.analyses);
    print::fat_separator();
    let elapsed = started.elapsed().as_secs_f64();
    let summary = format!("{} hosts classified in {elapsed:.2}s", report.analyses.len());
    print::centerln(&summary, |s| s.color(colors::TEXT_DEFAULT).bold());
    if report.cancelled {
        warn!("Results are partial");
    } else {
        success!("Scan complete");
    }
    Ok(())
}
