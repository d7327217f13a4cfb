//! Port to probe selection. No response sniffing happens here; the port number
//! alone decides which prober runs.

use std::collections::BTreeSet;

use lanprobe_common::config::RunConfig;

pub const HTTP_PORTS: &[u16] = &[
    80, 81, 82, 3000, 5000, 8000, 8001, 8008, 8080, 8081, 8123, 8181, 8888, 9000, 9090, 32400,
];
pub const HTTPS_PORTS: &[u16] = &[443, 4443, 5001, 6443, 8443, 9443, 10000, 10443, 32443];
pub const PJL_PORT: u16 = 9100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Http,
    Https,
    Ssh,
    Rdp,
    Smb2,
    Vnc,
    Rtsp,
    Pjl,
    Peek,
    FactOnly,
}

impl ProbeKind {
    /// Name recorded in [`ServiceBanner::probe`](lanprobe_common::models::ServiceBanner).
    /// HTTP reports `http/head` or `http/get` depending on what it ended up sending.
    pub fn probe_name(&self) -> &'static str {
        match self {
            ProbeKind::Http => "http/head",
            ProbeKind::Https => "tls/cert",
            ProbeKind::Ssh => "ssh/banner",
            ProbeKind::Rdp => "rdp/neg",
            ProbeKind::Smb2 => "smb2/neg",
            ProbeKind::Vnc => "vnc/banner",
            ProbeKind::Rtsp => "rtsp/options",
            ProbeKind::Pjl => "pjl/info",
            ProbeKind::Peek => "generic/peek",
            ProbeKind::FactOnly => "fact/open",
        }
    }
}

/// Service label implied by the port number alone.
pub fn service_for_port(port: u16) -> &'static str {
    if HTTP_PORTS.contains(&port) {
        return "http";
    }
    if HTTPS_PORTS.contains(&port) {
        return "https";
    }
    match port {
        22 => "ssh",
        445 => "smb",
        3389 => "rdp",
        5900 => "vnc",
        554 => "rtsp",
        5357 => "wsd",
        9100 | 515 | 631 => "printer",
        37777 => "dahua",
        8291 => "mikrotik",
        1433 => "mssql",
        3306 => "mysql",
        5432 => "postgres",
        27017 => "mongodb",
        9200 => "elasticsearch",
        6379 => "redis",
        11211 => "memcached",
        23 => "telnet",
        53 => "dns",
        21 => "ftp",
        25 => "smtp",
        110 => "pop3",
        143 => "imap",
        _ => "tcp",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTable {
    fact_only: BTreeSet<u16>,
    pjl: bool,
}

impl ProbeTable {
    pub fn new(fact_only: impl IntoIterator<Item = u16>, pjl: bool) -> Self {
        let mut fact_only: BTreeSet<u16> = fact_only.into_iter().collect();
        if pjl {
            fact_only.remove(&PJL_PORT);
        }
        Self { fact_only, pjl }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.fact_only_ports.iter().copied(), config.pjl_probe)
    }

    pub fn kind_for(&self, port: u16) -> ProbeKind {
        if self.fact_only.contains(&port) {
            return ProbeKind::FactOnly;
        }
        if HTTP_PORTS.contains(&port) {
            return ProbeKind::Http;
        }
        if HTTPS_PORTS.contains(&port) {
            return ProbeKind::Https;
        }
        match port {
            22 => ProbeKind::Ssh,
            3389 => ProbeKind::Rdp,
            445 => ProbeKind::Smb2,
            5900 => ProbeKind::Vnc,
            554 => ProbeKind::Rtsp,
            PJL_PORT if self.pjl => ProbeKind::Pjl,
            // Mail, FTP and key-value stores land here too; the greeting names them.
            _ => ProbeKind::Peek,
        }
    }

    pub fn is_fact_only(&self, port: u16) -> bool {
        self.fact_only.contains(&port)
    }
}

impl Default for ProbeTable {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
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
