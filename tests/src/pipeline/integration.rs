#![cfg(test)]
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use lanprobe_common::events::{EventCategory, EventSink};
use lanprobe_common::models::{AliveSource, DeviceKind, ServiceBanner};
use lanprobe_common::network::mac::parse_mac;
use lanprobe_core::liveness::{NeighborTable, SurgeEchoProber};
use tokio_util::sync::CancellationToken;

use crate::support::{
    ReachableEcho, SilentEcho, closed_port, fast_config, greeting_server, http_server_on, loopback, pipeline,
    silent_server,
};

const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

fn reachable() -> Arc<ReachableEcho> {
    Arc::new(ReachableEcho {
        rtt: Duration::from_millis(2),
        ttl: 64,
    })
}

/// This test runs every stage against one loopback host exposing an SSH
/// greeting, a silent service and a closed port.
#[tokio::test]
async fn loopback_host_is_fingerprinted() {
    let ssh = greeting_server(LOCALHOST, b"SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13\r\n").await;
    let silent = silent_server(LOCALHOST).await;
    let closed = closed_port(LOCALHOST).await;

    let (events, mut rx) = EventSink::channel();
    let pipeline = pipeline(
        fast_config(vec![ssh, silent, closed]),
        reachable(),
        NeighborTable::default(),
        events,
    );
    let report = pipeline.run(&[loopback(LOCALHOST)], &CancellationToken::new()).await;
    drop(pipeline);

    assert!(!report.cancelled);
    assert_eq!(report.facts.len(), 1, "localhost should be alive");
    let fact = &report.facts[0];
    let mut expected = vec![ssh, silent];
    expected.sort_unstable();
    assert_eq!(fact.open_ports(), expected.as_slice());
    assert_eq!(fact.alive_source(), AliveSource::Icmp);
    assert_eq!(fact.ttl(), Some(64));

    let banner = |port: u16| fact.banners().iter().find(|b| b.port == port).unwrap();
    assert_eq!(banner(ssh).service, "ssh");
    assert!(banner(ssh).raw_first_line.as_deref().unwrap().starts_with("SSH-2.0-OpenSSH"));
    assert_eq!(banner(silent).probe, ServiceBanner::FACT_ONLY_PROBE);

    let analysis = &report.analyses[0];
    assert_eq!(analysis.classification.kind, DeviceKind::PcUnix);
    assert_eq!(analysis.classification.os_guess, "Linux/Unix");
    assert!((0.0..=1.0).contains(&analysis.classification.confidence));
    assert!(analysis.summary.starts_with("127.0.0.1 - PC/Unix (Linux/Unix); ports: "));

    let json = serde_json::to_value(analysis).unwrap();
    assert_eq!(json["classification"]["kind"], "PC/Unix");
    assert_eq!(json["alive_source"], "icmp");
    assert_eq!(json["services"].as_array().unwrap().len(), 2);
    assert!(json["mac"].is_null());

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event.category);
    }
    let count = |c: EventCategory| seen.iter().filter(|&&s| s == c).count();
    assert_eq!(count(EventCategory::Alive), 1);
    assert_eq!(count(EventCategory::PortOpen), 2);
    assert_eq!(count(EventCategory::Banner), 2);
    assert_eq!(count(EventCategory::Classified), 1);
}

#[tokio::test]
async fn identical_web_content_is_linked_to_the_lower_port() {
    let ip = Ipv4Addr::new(127, 0, 0, 23);
    let body = "<html><head><title>Camera Login</title></head><body>login</body></html>";
    let (Some(low), Some(high)) = (
        http_server_on(ip, 8080, None, body).await,
        http_server_on(ip, 8081, None, body).await,
    ) else {
        eprintln!("ports 8080/8081 are taken on {ip}, skipping");
        return;
    };

    let pipeline = pipeline(
        fast_config(vec![low, high]),
        reachable(),
        NeighborTable::default(),
        EventSink::disabled(),
    );
    let report = pipeline.run(&[loopback(ip)], &CancellationToken::new()).await;

    let fact = &report.facts[0];
    assert_eq!(fact.banners().len(), 2);
    assert_eq!(fact.banners()[0].duplicate_of_port, None);
    assert_eq!(fact.banners()[1].duplicate_of_port, Some(low));
    assert_eq!(fact.banners()[0].probe, "http/get");
    assert_eq!(
        fact.banners()[0].http.as_ref().and_then(|h| h.title.as_deref()),
        Some("Camera Login")
    );

    let services = &report.analyses[0].services;
    assert_eq!(services[1].duplicate_of_port, Some(low));
    assert_eq!(services[0].status, Some(200));
    assert!(report.analyses[0].risks.contains(&format!("http:no-https-redirect({low})")));
}

#[tokio::test]
async fn arp_only_host_is_kept_and_flagged() {
    let mac = parse_mac("02:42:ac:11:00:02").unwrap();
    let neighbors = NeighborTable::from_entries([(LOCALHOST, mac)]);
    let closed = closed_port(LOCALHOST).await;

    let pipeline = pipeline(
        fast_config(vec![closed]),
        Arc::new(SilentEcho),
        neighbors,
        EventSink::disabled(),
    );
    let report = pipeline.run(&[loopback(LOCALHOST)], &CancellationToken::new()).await;

    assert_eq!(report.facts.len(), 1);
    let fact = &report.facts[0];
    assert_eq!(fact.alive_source(), AliveSource::Arp);
    assert!(fact.silent_host());
    assert!(fact.open_ports().is_empty());

    let analysis = &report.analyses[0];
    assert_eq!(analysis.vendor.as_deref(), Some("(randomized)"));
    assert_eq!(analysis.classification.kind, DeviceKind::PhoneTablet);
    assert!(
        analysis
            .classification
            .reasons
            .iter()
            .any(|r| r.contains("randomized; no-open-ports"))
    );
    assert!(analysis.anomalies.contains(&"silent_host".to_string()));
}

#[tokio::test]
async fn unreachable_host_leaves_no_trace_in_results() {
    let closed = closed_port(LOCALHOST).await;
    let (events, mut rx) = EventSink::channel();
    let pipeline = pipeline(
        fast_config(vec![closed]),
        Arc::new(SilentEcho),
        NeighborTable::default(),
        events,
    );

    let report = pipeline.run(&[loopback(LOCALHOST)], &CancellationToken::new()).await;
    drop(pipeline);

    assert!(report.facts.is_empty());
    assert!(report.analyses.is_empty());
    let event = rx.try_recv().unwrap();
    assert_eq!(event.category, EventCategory::Unreachable);
    assert_eq!(event.host, LOCALHOST);
}

/// Needs permission to open ICMP sockets.
#[tokio::test]
#[ignore]
async fn real_icmp_reaches_loopback() {
    let closed = closed_port(LOCALHOST).await;
    let pipeline = pipeline(
        fast_config(vec![closed]),
        Arc::new(SurgeEchoProber::new()),
        NeighborTable::default(),
        EventSink::disabled(),
    );

    let report = pipeline.run(&[loopback(LOCALHOST)], &CancellationToken::new()).await;

    assert_eq!(report.facts.len(), 1);
    assert_eq!(report.facts[0].alive_source(), AliveSource::Icmp);
    assert!(report.facts[0].rtt_ms().is_some());
}
