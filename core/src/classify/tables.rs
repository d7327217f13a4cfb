//! Scoring weights and keyword dictionaries.
//!
//! Everything the classifier knows about vendors, ports and brands lives here as
//! data. The defaults are empirically tuned and carry no claim of optimality; a
//! TOML file with the same shape replaces any subset of them.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use lanprobe_common::error::ConfigError;
use lanprobe_common::models::DeviceKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fires when any of `ports` is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSignal {
    pub kind: DeviceKind,
    pub label: String,
    pub ports: Vec<u16>,
    pub weight: f64,
}

impl PortSignal {
    fn new(kind: DeviceKind, label: &str, ports: &[u16], weight: f64) -> Self {
        Self {
            kind,
            label: label.to_string(),
            ports: ports.to_vec(),
            weight,
        }
    }

    /// `port:ssh(22)` or `ports:print(9100/515/631)`.
    pub fn reason(&self) -> String {
        let ports = self.ports.iter().map(u16::to_string).collect::<Vec<_>>().join("/");
        if self.ports.len() == 1 {
            format!("port:{}({ports})", self.label)
        } else {
            format!("ports:{}({ports})", self.label)
        }
    }
}

/// Fires once when any keyword occurs in the searched text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSignal {
    pub kind: DeviceKind,
    pub keywords: Vec<String>,
    pub weight: f64,
}

impl KeywordSignal {
    fn new(kind: DeviceKind, keywords: &[&str], weight: f64) -> Self {
        Self {
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlBonus {
    pub windows: f64,
    pub unix: f64,
    pub router: f64,
}

impl Default for TtlBonus {
    fn default() -> Self {
        Self {
            windows: 0.4,
            unix: 0.3,
            router: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterWeights {
    /// Ports that make a host "web reachable" for router heuristics.
    pub web_ports: Vec<u16>,
    pub brand: f64,
    /// Added once, however many strong signals fire.
    pub strong: f64,
    /// Taken from both PC kinds when any router signal fires.
    pub pc_penalty: f64,
    pub cn_keywords: Vec<String>,
    /// Router score must reach this share of the leader to take over.
    pub override_ratio: f64,
}

impl Default for RouterWeights {
    fn default() -> Self {
        Self {
            web_ports: vec![80, 443, 8080],
            brand: 1.8,
            strong: 3.0,
            pc_penalty: 0.2,
            cn_keywords: ["router.", " router", "miwifi", "routerlogin", "fritz.box"]
                .map(String::from)
                .to_vec(),
            override_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneWeights {
    pub brands: Vec<String>,
    pub server_ports: Vec<u16>,
    pub web_client: f64,
    pub no_open_ports: f64,
    pub unix_penalty: f64,
    pub server_penalty: f64,
}

impl Default for PhoneWeights {
    fn default() -> Self {
        Self {
            brands: [
                "apple", "samsung", "xiaomi", "huawei", "honor", "oneplus", "google", "motorola", "oppo", "vivo",
            ]
            .map(String::from)
            .to_vec(),
            server_ports: vec![22, 445, 3389, 5432, 3306],
            web_client: 1.8,
            no_open_ports: 3.5,
            unix_penalty: 0.3,
            server_penalty: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterBrand {
    pub brand: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl RouterBrand {
    fn new(brand: &str, keywords: &[&str], domains: &[&str]) -> Self {
        Self {
            brand: brand.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Ports whose mere exposure is reported as a risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposedPort {
    pub port: u16,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskRules {
    pub exposed: Vec<ExposedPort>,
    pub expiring_days: i64,
    pub legacy_tls: Vec<String>,
    pub weak_cipher_markers: Vec<String>,
    /// Case-insensitive regexes matched against the `Server` header.
    pub outdated_servers: Vec<String>,
}

impl Default for RiskRules {
    fn default() -> Self {
        let exposed = [(445, "smb"), (3389, "rdp"), (5900, "vnc"), (554, "rtsp"), (23, "telnet")]
            .map(|(port, service)| ExposedPort {
                port,
                service: service.to_string(),
            })
            .to_vec();
        Self {
            exposed,
            expiring_days: 90,
            legacy_tls: ["TLSv1.0", "TLSv1.1", "SSLv3"].map(String::from).to_vec(),
            weak_cipher_markers: ["RC4", "3DES", "DES-CBC3"].map(String::from).to_vec(),
            outdated_servers: [
                r"apache/(1\.|2\.0\.|2\.2\.)",
                r"nginx/(0\.|1\.([0-9]|1[0-4])\.)",
                r"microsoft-iis/(5|6|7)\.",
                r"lighttpd/1\.4\.[1-3][0-9]\b",
                r"goahead",
                r"\bboa/",
                r"micro_httpd",
                r"mini_httpd/1\.1[0-9]",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTables {
    pub port_signals: Vec<PortSignal>,
    pub banner_keywords: Vec<KeywordSignal>,
    pub vendor_keywords: Vec<KeywordSignal>,
    pub ttl: TtlBonus,
    pub router: RouterWeights,
    pub phone: PhoneWeights,
    pub router_brands: Vec<RouterBrand>,
    pub risks: RiskRules,
}

impl Default for ScoringTables {
    fn default() -> Self {
        use DeviceKind::*;
        Self {
            port_signals: vec![
                PortSignal::new(Printer, "print", &[9100, 515, 631], 1.5),
                PortSignal::new(Camera, "camera", &[554, 37777, 8765], 2.0),
                PortSignal::new(Router, "router", &[53, 23, 8291], 1.2),
                PortSignal::new(Nas, "nas", &[5000, 5001, 9000, 32400], 2.0),
                PortSignal::new(PcWindows, "windows", &[445, 3389, 5985, 5986], 1.7),
                PortSignal::new(PcUnix, "ssh", &[22], 1.0),
                PortSignal::new(Iot, "iot", &[1883, 5683], 1.0),
            ],
            banner_keywords: vec![
                KeywordSignal::new(Printer, &["jetdirect", "ipp", "pjl"], 1.0),
                KeywordSignal::new(Camera, &["hikvision", "dahua", "goahead", "nvr"], 1.5),
                KeywordSignal::new(Router, &["routeros", "openwrt", "airmax"], 1.5),
                KeywordSignal::new(Nas, &["synology", "qnap"], 2.0),
            ],
            vendor_keywords: vec![
                KeywordSignal::new(Printer, &["hp", "hewlett", "brother", "canon", "epson"], 1.8),
                KeywordSignal::new(Camera, &["hikvision", "dahua", "axis"], 1.5),
                KeywordSignal::new(
                    Router,
                    &["tplink", "tp-link", "mikrotik", "ubiquiti", "d-link", "zyxel"],
                    2.0,
                ),
                KeywordSignal::new(Nas, &["synology", "qnap", "asustor", "western digital"], 1.8),
                KeywordSignal::new(PcWindows, &["microsoft"], 0.6),
            ],
            ttl: TtlBonus::default(),
            router: RouterWeights::default(),
            phone: PhoneWeights::default(),
            router_brands: default_router_brands(),
            risks: RiskRules::default(),
        }
    }
}

fn default_router_brands() -> Vec<RouterBrand> {
    vec![
        RouterBrand::new("Xiaomi", &["miwifi", "xiaomi"], &["miwifi.com"]),
        RouterBrand::new("MikroTik", &["routeros", "mikrotik"], &["mikrotik.com"]),
        RouterBrand::new("Ubiquiti", &["ubiquiti", "unifi", "airmax", "edgeos"], &["ui.com", "ubnt.com"]),
        RouterBrand::new("TP-Link", &["tplink", "tp-link"], &["tplinkwifi.net"]),
        RouterBrand::new("Keenetic", &["keenetic", "ndms"], &["keenetic.cloud"]),
        RouterBrand::new("ASUS", &["asuswrt", "asustek"], &["asus.com"]),
        RouterBrand::new("D-Link", &["d-link", "dlink"], &[]),
        RouterBrand::new("Zyxel", &["zyxel"], &[]),
        RouterBrand::new("Netgear", &["netgear", "routerlogin"], &["routerlogin.net", "routerlogin.com"]),
        RouterBrand::new("Huawei", &["huawei", "hilink"], &[]),
        RouterBrand::new("ZTE", &["zte"], &[]),
        RouterBrand::new("Tenda", &["tenda"], &["tendawifi.com"]),
        RouterBrand::new("Linksys", &["linksys", "velop"], &[]),
        RouterBrand::new("AVM Fritz!", &["fritz!box", "fritz.box", "avm"], &["fritz.box"]),
        RouterBrand::new("Synology RT", &["synology router", "rt2600ac"], &[]),
        RouterBrand::new("OpenWrt", &["openwrt", "luci"], &[]),
        RouterBrand::new("DD-WRT", &["dd-wrt"], &[]),
        RouterBrand::new("EdgeRouter", &["edgerouter"], &[]),
        RouterBrand::new("Technicolor", &["technicolor"], &[]),
        RouterBrand::new("Sagemcom", &["sagemcom"], &[]),
        RouterBrand::new("Arris", &["arris"], &[]),
    ]
}

impl ScoringTables {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            what: "scoring tables".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

/// Case-insensitive keyword matcher that respects word boundaries on the
/// alphanumeric ends of each keyword.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    entries: Vec<(String, Regex)>,
}

fn boundary_pattern(keyword: &str) -> String {
    let escaped = regex::escape(&keyword.to_lowercase());
    let word_edge = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let lead = if word_edge(keyword.chars().next()) { r"\b" } else { "" };
    let trail = if word_edge(keyword.chars().last()) { r"\b" } else { "" };
    format!("(?i){lead}{escaped}{trail}")
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let entries = keywords
            .iter()
            .map(AsRef::as_ref)
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| match Regex::new(&boundary_pattern(k)) {
                Ok(re) => Some((k.to_string(), re)),
                Err(e) => {
                    warn!("Ignoring keyword {k:?}: {e}");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    /// First keyword, in table order, found in `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(k, _)| k.as_str())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }
}

static GENERIC_ROUTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(router|gateway)\b").expect("valid generic router regex"));

pub const GENERIC_ROUTER: &str = "Generic Router";

/// Router brand detection over banner text.
#[derive(Debug, Clone)]
pub struct RouterBrandCatalog {
    brands: Vec<(String, KeywordMatcher, Vec<String>)>,
}

impl RouterBrandCatalog {
    pub fn new(brands: &[RouterBrand]) -> Self {
        let brands = brands
            .iter()
            .map(|b| {
                let domains = b.domains.iter().map(|d| d.to_lowercase()).collect();
                (b.brand.clone(), KeywordMatcher::new(&b.keywords), domains)
            })
            .collect();
        Self { brands }
    }

    /// Brand named by keyword or domain only.
    pub fn named_brand(&self, text: &str) -> Option<&str> {
        if let Some((brand, _, _)) = self.brands.iter().find(|(_, kw, _)| kw.is_match(text)) {
            return Some(brand);
        }
        let lower = text.to_lowercase();
        self.brands
            .iter()
            .find(|(_, _, domains)| domains.iter().any(|d| lower.contains(d.as_str())))
            .map(|(brand, _, _)| brand.as_str())
    }

    /// Named brand, or [`GENERIC_ROUTER`] when the text merely says router or gateway.
    pub fn detect(&self, text: &str) -> Option<&str> {
        self.named_brand(text)
            .or_else(|| GENERIC_ROUTER_RE.is_match(text).then_some(GENERIC_ROUTER))
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
