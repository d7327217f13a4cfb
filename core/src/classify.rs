//! # Device Classification
//!
//! Turns an enriched [`DeviceFact`] into a ranked guess of what the device is.
//!
//! Every signal (open ports, banner text, vendor name, TTL, router and phone
//! heuristics) adds a weight to one device kind. Scores are clamped at zero,
//! the best kind wins, and confidence is its share of the total. Strong router
//! evidence may overrule a narrowly leading kind.
//!
//! Risks and anomalies are computed alongside but never feed the scores.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lanprobe_common::config::RunConfig;
use lanprobe_common::error::ConfigError;
use lanprobe_common::models::{
    Classification, ClassificationResult, DeviceAnalysisResult, DeviceFact, DeviceKind, ScoredKind,
    ServiceEntry,
};
use tracing::debug;

use crate::vendors::{OuiVendorResolver, RANDOMIZED_LABEL};

pub mod risks;
pub mod tables;

pub use risks::RiskEvaluator;
pub use tables::{KeywordMatcher, RouterBrandCatalog, ScoringTables};

const MAX_ALTERNATIVES: usize = 3;
const SUMMARY_PORTS: usize = 4;

/// TTL bands of common default initial TTLs.
pub fn os_from_ttl(ttl: Option<u8>) -> &'static str {
    match ttl {
        Some(t) if t >= 200 => "Network/Router",
        Some(t) if t >= 120 => "Windows",
        Some(t) if t >= 60 => "Linux/Unix",
        _ => "Unknown",
    }
}

#[derive(Default)]
struct Scoreboard {
    scores: [f64; DeviceKind::ALL.len()],
    reasons: Vec<String>,
}

impl Scoreboard {
    fn add(&mut self, kind: DeviceKind, weight: f64) {
        self.scores[kind.index()] += weight;
    }

    fn add_because(&mut self, kind: DeviceKind, weight: f64, reason: impl Into<String>) {
        self.add(kind, weight);
        self.reasons.push(reason.into());
    }

    fn get(&self, kind: DeviceKind) -> f64 {
        self.scores[kind.index()]
    }
}

pub struct DeviceClassifier {
    tables: ScoringTables,
    banner_matchers: Vec<KeywordMatcher>,
    vendor_matchers: Vec<KeywordMatcher>,
    phone_brands: KeywordMatcher,
    catalog: RouterBrandCatalog,
    risks: RiskEvaluator,
    vendors: Arc<OuiVendorResolver>,
    high_rtt_ms: u32,
}

impl std::fmt::Debug for DeviceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClassifier")
            .field("high_rtt_ms", &self.high_rtt_ms)
            .field("vendors", &self.vendors)
            .finish_non_exhaustive()
    }
}

impl DeviceClassifier {
    pub fn new(tables: ScoringTables, vendors: Arc<OuiVendorResolver>, high_rtt_ms: u32) -> Self {
        let banner_matchers = tables.banner_keywords.iter().map(|s| KeywordMatcher::new(&s.keywords)).collect();
        let vendor_matchers = tables.vendor_keywords.iter().map(|s| KeywordMatcher::new(&s.keywords)).collect();
        Self {
            banner_matchers,
            vendor_matchers,
            phone_brands: KeywordMatcher::new(&tables.phone.brands),
            catalog: RouterBrandCatalog::new(&tables.router_brands),
            risks: RiskEvaluator::new(tables.risks.clone()),
            tables,
            vendors,
            high_rtt_ms,
        }
    }

    /// Uses the scoring tables named in the config, or the built-in ones.
    pub fn from_config(config: &RunConfig, vendors: Arc<OuiVendorResolver>) -> Result<Self, ConfigError> {
        let tables = match &config.scoring_tables {
            Some(path) => ScoringTables::from_file(path)?,
            None => ScoringTables::default(),
        };
        Ok(Self::new(tables, vendors, config.high_rtt_ms))
    }

    /// Vendor from the fact, else from the resolver, else the randomized label.
    pub fn vendor_for(&self, fact: &DeviceFact) -> Option<String> {
        if let Some(vendor) = fact.vendor().filter(|v| !v.trim().is_empty()) {
            return Some(vendor.to_string());
        }
        fact.mac().and_then(|m| self.vendors.describe(m))
    }

    pub fn classify(&self, fact: &DeviceFact) -> ClassificationResult {
        let vendor = self.vendor_for(fact);
        ClassificationResult {
            classification: self.score(fact, vendor.as_deref()),
            risks: self.risks.evaluate(fact, Utc::now()),
            anomalies: self.anomalies(fact),
        }
    }

    /// Full report row: classification plus services and a one-line summary.
    pub fn analyze(&self, fact: &DeviceFact) -> DeviceAnalysisResult {
        let vendor = self.vendor_for(fact);
        let ClassificationResult {
            classification,
            risks,
            anomalies,
        } = self.classify(fact);
        let services = services_of(fact);
        let summary = summary_line(fact, vendor.as_deref(), &classification, &services, &risks, &anomalies);

        DeviceAnalysisResult {
            ip: fact.ip(),
            mac: fact.mac(),
            vendor,
            ttl: fact.ttl(),
            rtt_ms: fact.rtt_ms(),
            alive_source: fact.alive_source(),
            open_ports: fact.open_ports().to_vec(),
            services,
            risks,
            anomalies,
            classification,
            summary,
        }
    }

    pub fn anomalies(&self, fact: &DeviceFact) -> Vec<String> {
        let mut anomalies = Vec::new();
        if fact.rtt_ms().is_some_and(|rtt| rtt > self.high_rtt_ms) {
            anomalies.push("high_rtt".to_string());
        }
        if fact.silent_host() {
            anomalies.push("silent_host".to_string());
        }
        if fact.route_mismatch() {
            anomalies.push("route_mismatch".to_string());
        }
        if fact.proxy_arp() {
            anomalies.push("proxy_arp".to_string());
        }
        anomalies
    }

    fn score(&self, fact: &DeviceFact, vendor: Option<&str>) -> Classification {
        let t = &self.tables;
        let open = fact.open_ports();
        let has_any = |ports: &[u16]| ports.iter().any(|p| open.contains(p));
        let banner_text = banner_text(fact);
        let vendor_text = vendor.unwrap_or_default();
        let mut board = Scoreboard::default();

        for signal in t.port_signals.iter().filter(|s| has_any(&s.ports)) {
            board.add_because(signal.kind, signal.weight, signal.reason());
        }
        for (signal, matcher) in t.banner_keywords.iter().zip(&self.banner_matchers) {
            if let Some(hit) = matcher.first_match(&banner_text) {
                board.add_because(signal.kind, signal.weight, format!("banner:{hit}"));
            }
        }
        for (signal, matcher) in t.vendor_keywords.iter().zip(&self.vendor_matchers) {
            if let Some(hit) = matcher.first_match(vendor_text) {
                board.add_because(signal.kind, signal.weight, format!("vendor:{hit}"));
            }
        }

        let os_guess = os_from_ttl(fact.ttl());
        let ttl_bonus = match os_guess {
            "Windows" => Some((DeviceKind::PcWindows, t.ttl.windows)),
            "Linux/Unix" => Some((DeviceKind::PcUnix, t.ttl.unix)),
            "Network/Router" => Some((DeviceKind::Router, t.ttl.router)),
            _ => None,
        };
        if let (Some((kind, bonus)), Some(ttl)) = (ttl_bonus, fact.ttl()) {
            board.add_because(kind, bonus, format!("ttl:{ttl}->{os_guess}"));
        }

        let has_web = has_any(&t.router.web_ports);
        let router_evidence = has_web && self.router_signals(fact, &banner_text, &mut board);

        // Locally administered and claimed by no vendor block.
        let randomized = vendor == Some(RANDOMIZED_LABEL);
        let phone_brand = self.phone_brands.is_match(vendor_text);
        let server_ports = has_any(&t.phone.server_ports);
        if (randomized || phone_brand) && has_web && !server_ports {
            let reason = if randomized { "mac:randomized" } else { "vendor:phone-brand" };
            board.add_because(DeviceKind::PhoneTablet, t.phone.web_client, reason);
        }
        if randomized && open.is_empty() {
            board.add_because(DeviceKind::PhoneTablet, t.phone.no_open_ports, "mac:randomized; no-open-ports");
            let unix = &mut board.scores[DeviceKind::PcUnix.index()];
            *unix = (*unix - t.phone.unix_penalty).max(0.0);
        }
        if server_ports {
            board.add(DeviceKind::PhoneTablet, -t.phone.server_penalty);
        }

        self.rank(fact, board, os_guess, router_evidence)
    }

    /// Applies the router heuristics. Returns whether any of them fired.
    fn router_signals(&self, fact: &DeviceFact, banner_text: &str, board: &mut Scoreboard) -> bool {
        let weights = &self.tables.router;

        let brand = self.catalog.detect(banner_text).map(str::to_string);
        if let Some(brand) = &brand {
            board.add_because(DeviceKind::Router, weights.brand, format!("router.brand:{brand}"));
        }

        let certs: Vec<_> = fact.banners().iter().filter_map(|b| b.tls.as_ref()).collect();
        let cn_text = certs
            .iter()
            .flat_map(|tls| tls.subject_cn.iter().chain(tls.subject_alt_names.iter()))
            .fold(String::new(), |acc, name| format!("{acc} {}", name.to_lowercase()));
        let cn_hit = weights.cn_keywords.iter().any(|k| cn_text.contains(&k.to_lowercase()));
        let issuer_hit = certs
            .iter()
            .filter_map(|tls| tls.issuer.as_deref())
            .any(|issuer| self.catalog.named_brand(issuer).is_some());
        let octet = fact.ip().octets()[3];
        let gateway_ip = octet == 1 || octet == 254;

        if cn_hit || issuer_hit || gateway_ip {
            board.add(DeviceKind::Router, weights.strong);
            if cn_hit {
                board.reasons.push("tls.cn:router-keyword".to_string());
            }
            if issuer_hit {
                board.reasons.push("tls.issuer:router-brand".to_string());
            }
            if gateway_ip {
                board.reasons.push("ip:suspected-gateway(.1/.254)".to_string());
            }
        }

        let fired = brand.is_some() || cn_hit || issuer_hit || gateway_ip;
        if fired {
            board.add(DeviceKind::PcUnix, -weights.pc_penalty);
            board.add(DeviceKind::PcWindows, -weights.pc_penalty);
        }
        fired
    }

    fn rank(&self, fact: &DeviceFact, board: Scoreboard, os_guess: &str, router_evidence: bool) -> Classification {
        let Scoreboard { scores, mut reasons } = board;

        // Stable sort over declaration order: ties keep the fixed kind order.
        let mut ranked: Vec<ScoredKind> = DeviceKind::ALL
            .iter()
            .map(|&kind| ScoredKind {
                kind,
                score: scores[kind.index()],
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let best = ranked[0];
        let router = scores[DeviceKind::Router.index()];
        let winner = if router_evidence
            && best.kind != DeviceKind::Router
            && router > 0.0
            && router >= best.score * self.tables.router.override_ratio
        {
            reasons.push(format!(
                "router:override({:.2}>={:.0}% of {})",
                router,
                self.tables.router.override_ratio * 100.0,
                best.kind
            ));
            ScoredKind {
                kind: DeviceKind::Router,
                score: router,
            }
        } else {
            best
        };

        let total: f64 = scores.iter().map(|s| s.max(0.0)).sum();
        let confidence = if total > 0.0 {
            ((winner.score.max(0.0) / total) * 100.0).round() / 100.0
        } else {
            0.0
        };

        let mut alternatives: Vec<ScoredKind> = ranked.iter().copied().take(MAX_ALTERNATIVES).collect();
        if !alternatives.iter().any(|a| a.kind == winner.kind) {
            alternatives.pop();
            alternatives.insert(0, winner);
        }

        let clamped: BTreeMap<DeviceKind, f64> =
            DeviceKind::ALL.iter().map(|&k| (k, scores[k.index()].max(0.0))).collect();

        debug!(
            "{}: {} ({os_guess}) conf={confidence:.2} reasons=[{}]",
            fact.ip(),
            winner.kind,
            reasons.join("; ")
        );

        Classification {
            kind: winner.kind,
            os_guess: os_guess.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            scores: clamped,
            reasons,
            alternatives,
        }
    }
}

/// Lowercased text of everything the banners revealed about the software.
fn banner_text(fact: &DeviceFact) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for banner in fact.banners() {
        if let Some(http) = &banner.http {
            parts.extend(http.server());
            parts.extend(http.title.as_deref());
            parts.extend(http.generator.as_deref());
        }
        if let Some(tls) = &banner.tls {
            parts.extend(tls.subject_cn.as_deref());
            parts.extend(tls.issuer.as_deref());
        }
        parts.extend(banner.redirect_to.as_deref());
        parts.extend(banner.raw_first_line.as_deref());
        if banner.probe != lanprobe_common::models::ServiceBanner::FACT_ONLY_PROBE && banner.summary != "open" {
            parts.push(&banner.summary);
        }
    }
    parts.join(" ").to_lowercase()
}

/// One entry per banner plus bare entries for banner-less open ports, by port.
pub fn services_of(fact: &DeviceFact) -> Vec<ServiceEntry> {
    let mut services: Vec<ServiceEntry> = fact
        .banners()
        .iter()
        .map(|b| {
            let http = b.http.as_ref();
            ServiceEntry {
                port: b.port,
                service: b.service.clone(),
                status: http.and_then(|h| h.status_code()),
                server: http.and_then(|h| h.server()).map(str::to_string),
                title: http.and_then(|h| h.title.clone()),
                generator: http.and_then(|h| h.generator.clone()),
                charset: http.and_then(|h| h.charset.clone()),
                is_compressed: http.map(|h| h.is_compressed),
                redirect_to: b.redirect_to.clone(),
                content_hash: b.content_hash.clone(),
                duplicate_of_port: b.duplicate_of_port,
                tls: b.tls.clone(),
            }
        })
        .collect();

    for &port in fact.open_ports() {
        if !services.iter().any(|s| s.port == port) {
            services.push(ServiceEntry::bare(port));
        }
    }
    services.sort_by_key(|s| s.port);
    services
}

fn summary_line(
    fact: &DeviceFact,
    vendor: Option<&str>,
    classification: &Classification,
    services: &[ServiceEntry],
    risks: &[String],
    anomalies: &[String],
) -> String {
    let mut line = format!("{} - {} ({})", fact.ip(), classification.kind, classification.os_guess);
    if let Some(vendor) = vendor.filter(|v| !v.trim().is_empty()) {
        line.push_str(&format!(", {vendor}"));
    }
    if !services.is_empty() {
        let ports: Vec<String> = services
            .iter()
            .take(SUMMARY_PORTS)
            .map(|s| match s.service.as_str() {
                "tcp" => s.port.to_string(),
                svc => format!("{svc}:{}", s.port),
            })
            .collect();
        line.push_str(&format!("; ports: {}", ports.join(",")));
    }
    if !risks.is_empty() {
        line.push_str(&format!("; risks: {}", risks.join(",")));
    }
    if !anomalies.is_empty() {
        line.push_str(&format!("; anomalies: {}", anomalies.join(",")));
    }
    if let Some(reason) = classification.reasons.first() {
        line.push_str(&format!("; why: {reason}"));
    }
    line
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
    use lanprobe_common::models::{HostAddress, HttpInfo, IcmpObservation, ServiceBanner, TlsInfo};
    use pnet::util::MacAddr;
    use std::net::Ipv4Addr;

    fn classifier() -> DeviceClassifier {
        DeviceClassifier::new(ScoringTables::default(), Arc::new(OuiVendorResolver::empty()), 30)
    }

    fn host(last: u8) -> HostAddress {
        HostAddress::new(Ipv4Addr::new(192, 168, 1, last), Ipv4Addr::new(192, 168, 1, 10))
    }

    fn fact(last: u8, ttl: Option<u8>, mac: Option<MacAddr>, ports: &[u16]) -> DeviceFact {
        let icmp = match ttl {
            Some(ttl) => IcmpObservation::replied(4, Some(ttl)),
            None => IcmpObservation::silent(),
        };
        DeviceFact::from_liveness(host(last), icmp, mac.or(Some(MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55))))
            .unwrap()
            .with_open_ports(ports.iter().copied())
    }

    fn web_banner(port: u16, server: &str) -> ServiceBanner {
        let mut http = HttpInfo {
            status_line: Some("HTTP/1.1 200 OK".into()),
            ..HttpInfo::default()
        };
        http.headers.insert("server".into(), server.into());
        ServiceBanner::new(port, "http/head", "http", format!("HTTP 200, {server}")).with_http(http)
    }

    #[test]
    fn ttl_bands() {
        assert_eq!(os_from_ttl(Some(255)), "Network/Router");
        assert_eq!(os_from_ttl(Some(128)), "Windows");
        assert_eq!(os_from_ttl(Some(64)), "Linux/Unix");
        assert_eq!(os_from_ttl(Some(32)), "Unknown");
        assert_eq!(os_from_ttl(None), "Unknown");
    }

    #[test]
    fn windows_host_by_ports_and_ttl() {
        let result = classifier().classify(&fact(20, Some(128), None, &[445, 3389]));
        let c = &result.classification;
        assert_eq!(c.kind, DeviceKind::PcWindows);
        assert_eq!(c.os_guess, "Windows");
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.reasons[0], "ports:windows(445/3389/5985/5986)");
        assert!(c.reasons.contains(&"ttl:128->Windows".to_string()));
        assert_eq!(result.risks, vec!["exposed:smb(445)", "exposed:rdp(3389)"]);
    }

    #[test]
    fn hp_vendor_on_raw_print_port_is_printer() {
        let f = fact(30, Some(64), None, &[9100]).with_vendor(Some("Hewlett-Packard Company".into()));
        let c = classifier().classify(&f).classification;
        assert_eq!(c.kind, DeviceKind::Printer);
        assert!(c.reasons.contains(&"vendor:hewlett".to_string()));
    }

    #[test]
    fn randomized_mac_with_nothing_open_is_phone() {
        let random = MacAddr(0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee);
        let f = fact(40, None, Some(random), &[]);
        let analysis = classifier().analyze(&f);
        assert_eq!(analysis.classification.kind, DeviceKind::PhoneTablet);
        assert!(analysis.classification.reasons.iter().any(|r| r.contains("randomized; no-open-ports")));
        assert_eq!(analysis.vendor.as_deref(), Some("(randomized)"));
        assert!(analysis.summary.ends_with("why: mac:randomized; no-open-ports"));
    }

    #[test]
    fn registered_locally_administered_block_is_not_randomized() {
        use lanprobe_common::models::{MacPrefix, VendorRecord, VendorSource};

        let prefix = MacPrefix::new("0A00270AB").unwrap();
        let record = VendorRecord::new(prefix, "Acme Virtual NIC", VendorSource::IeeeCsv);
        let vendors = OuiVendorResolver::from_records([record]);
        let classifier = DeviceClassifier::new(ScoringTables::default(), Arc::new(vendors), 30);
        let virtual_nic = MacAddr(0x0a, 0x00, 0x27, 0x0a, 0xb1, 0x02);

        let idle = classifier.analyze(&fact(41, None, Some(virtual_nic), &[]));
        assert_eq!(idle.vendor.as_deref(), Some("Acme Virtual NIC"));
        assert_ne!(idle.classification.kind, DeviceKind::PhoneTablet);
        assert!(!idle.classification.reasons.iter().any(|r| r.starts_with("mac:randomized")));

        let web = classifier.classify(&fact(42, Some(64), Some(virtual_nic), &[80])).classification;
        assert!(!web.reasons.iter().any(|r| r.starts_with("mac:randomized")));
    }

    #[test]
    fn routeros_banner_makes_a_router() {
        let f = fact(20, Some(64), None, &[22, 80]).with_banners(vec![web_banner(80, "RouterOS v6")]);
        let c = classifier().classify(&f).classification;
        assert_eq!(c.kind, DeviceKind::Router);
        assert!(c.reasons.contains(&"router.brand:MikroTik".to_string()));
        assert!(c.reasons.contains(&"banner:routeros".to_string()));
    }

    #[test]
    fn router_evidence_overrides_narrow_leader() {
        let mut tables = ScoringTables::default();
        tables.router.brand = 1.0;
        tables.banner_keywords[2].weight = 1.3;
        let classifier = DeviceClassifier::new(tables, Arc::new(OuiVendorResolver::empty()), 30);

        // PC/Windows: 1.7 ports + 0.6 vendor + 0.4 ttl - 0.2 = 2.5; Router: 1.3 + 1.0 = 2.3
        let f = fact(20, Some(128), None, &[80, 445])
            .with_vendor(Some("Microsoft Corporation".into()))
            .with_banners(vec![web_banner(80, "RouterOS")]);
        let c = classifier.classify(&f).classification;

        assert_eq!(c.alternatives[0].kind, DeviceKind::PcWindows);
        assert_eq!(c.kind, DeviceKind::Router);
        assert!(c.alternatives.iter().any(|a| a.kind == DeviceKind::Router));
    }

    #[test]
    fn router_needs_a_web_port_for_strong_signals() {
        let f = fact(1, Some(64), None, &[22]);
        let c = classifier().classify(&f).classification;
        assert_eq!(c.kind, DeviceKind::PcUnix);
        assert!(!c.reasons.iter().any(|r| r.starts_with("ip:suspected-gateway")));
    }

    #[test]
    fn gateway_ip_and_router_cn() {
        let tls = TlsInfo {
            subject_cn: Some("router.miwifi.com".into()),
            ..TlsInfo::default()
        };
        let banner = ServiceBanner::new(443, "http/head", "https", "HTTPS 200").with_tls(tls);
        let f = fact(1, Some(64), None, &[443]).with_banners(vec![banner]);
        let c = classifier().classify(&f).classification;
        assert_eq!(c.kind, DeviceKind::Router);
        assert!(c.reasons.contains(&"tls.cn:router-keyword".to_string()));
        assert!(c.reasons.contains(&"ip:suspected-gateway(.1/.254)".to_string()));
    }

    #[test]
    fn no_signal_means_zero_confidence() {
        let c = classifier().classify(&fact(50, None, None, &[])).classification;
        assert_eq!(c.confidence, 0.0);
        assert!(c.scores.values().all(|&s| s == 0.0));
        assert!(c.alternatives.len() <= 3);
    }

    #[test]
    fn confidence_and_scores_stay_in_bounds() {
        let random = MacAddr(0x06, 0, 0, 0, 0, 1);
        let cases = [
            fact(9, Some(255), Some(random), &[22, 80, 443, 445, 554, 9100]),
            fact(254, Some(128), None, &[3389, 5000, 1883]),
            fact(77, Some(64), Some(random), &[22, 3306]),
        ];
        for f in &cases {
            let c = classifier().classify(f).classification;
            assert!((0.0..=1.0).contains(&c.confidence), "{}", c.confidence);
            assert!(c.scores.values().all(|&s| s >= 0.0));
            assert!(c.alternatives.len() <= 3);
            assert!(c.alternatives.iter().any(|a| a.kind == c.kind));
        }
    }

    #[test]
    fn analysis_lists_services_and_anomalies() {
        let f = DeviceFact::from_liveness(host(60), IcmpObservation::replied(45, Some(64)), None)
            .unwrap()
            .with_open_ports([22, 80, 1234])
            .with_banners(vec![
                web_banner(80, "lighttpd/1.4.35"),
                ServiceBanner::new(22, "ssh/banner", "ssh", "SSH-2.0-dropbear"),
            ])
            .with_link_flags(false, true);
        let analysis = classifier().analyze(&f);

        let ports: Vec<u16> = analysis.services.iter().map(|s| s.port).collect();
        assert_eq!(ports, vec![22, 80, 1234]);
        assert_eq!(analysis.services[2].service, "tcp");
        assert_eq!(analysis.services[1].status, Some(200));
        assert_eq!(analysis.anomalies, vec!["high_rtt", "route_mismatch"]);
        assert!(analysis.risks.contains(&"http:outdated-server(80,lighttpd/1.4.35)".to_string()));
        assert!(analysis.summary.starts_with("192.168.1.60 - PC/Unix (Linux/Unix); ports: ssh:22,http:80,1234"));
        assert!(analysis.summary.contains("; anomalies: high_rtt,route_mismatch"));
    }

    #[test]
    fn from_config_reads_tables_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.toml");
        std::fs::write(&path, "[router]\noverride_ratio = 0.5\n").unwrap();
        let config = RunConfig {
            scoring_tables: Some(path),
            ..RunConfig::default()
        };
        let classifier = DeviceClassifier::from_config(&config, Arc::new(OuiVendorResolver::empty())).unwrap();
        assert_eq!(classifier.tables.router.override_ratio, 0.5);
    }
}
