//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `LANPROBE_*` environment variables, then whatever the caller overrides.
//! [`RunConfig::validate`] must pass before any probe is sent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Candidate ports scanned on every live host.
pub const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 81, 110, 135, 139, 143, 161, 389, 443, 445, 465, 515, 554, 587, 631,
    1883, 2222, 3000, 3306, 3389, 5000, 5001, 5357, 5432, 5683, 5900, 5985, 5986, 6379, 8000, 8008,
    8080, 8081, 8123, 8181, 8291, 8443, 8765, 8888, 9000, 9090, 9100, 11211, 32400, 37777,
];

/// Ports recorded as open without any protocol engagement.
pub const DEFAULT_FACT_ONLY_PORTS: &[u16] = &[5357, 9100];

const MAX_PING_ATTEMPTS: u32 = 10;
const ENV_PREFIX: &str = "LANPROBE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Candidate TCP ports. Deduplicated and sorted before scanning.
    pub ports: Vec<u16>,
    pub ping_attempts: u32,
    pub ping_timeout_ms: u64,
    /// Pause between two echo attempts against the same host.
    pub ping_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Ports of a single host probed at once.
    pub port_concurrency: usize,
    /// Hosts processed at once across the whole run.
    pub host_concurrency: usize,
    pub banner_timeout_ms: u64,
    /// RTT above this value is reported as a `high_rtt` anomaly.
    pub high_rtt_ms: u32,
    /// Directory holding `oui.csv`, `oui.txt`, `manuf` and `nmap-mac-prefixes`.
    pub oui_dir: PathBuf,
    /// Optional deadline for the whole run. Cancels every in-flight probe when it fires.
    pub run_timeout_secs: Option<u64>,
    /// Query port 9100 with PJL `INFO ID` instead of treating it as fact-only.
    pub pjl_probe: bool,
    /// TOML file overriding the classifier's weights and keyword tables.
    pub scoring_tables: Option<PathBuf>,
    pub fact_only_ports: Vec<u16>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            ping_attempts: 3,
            ping_timeout_ms: 1200,
            ping_delay_ms: 150,
            connect_timeout_ms: 1100,
            port_concurrency: 64,
            host_concurrency: 32,
            banner_timeout_ms: 2000,
            high_rtt_ms: 30,
            oui_dir: PathBuf::from("data/oui"),
            run_timeout_secs: None,
            pjl_probe: false,
            scoring_tables: None,
            fact_only_ports: DEFAULT_FACT_ONLY_PORTS.to_vec(),
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            what: "run configuration".to_string(),
            reason: e.to_string(),
        })
    }

    /// Overlays `LANPROBE_*` variables from the process environment.
    pub fn merge_env(self) -> Result<Self, ConfigError> {
        self.merge_vars(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Overlays values from an arbitrary lookup, keyed without the `LANPROBE_` prefix.
    pub fn merge_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(val) = lookup("PORTS") {
            self.ports = parse_port_list(&val)?;
        }
        if let Some(val) = lookup("PING_ATTEMPTS") {
            self.ping_attempts = parse_number("ping_attempts", &val)?;
        }
        if let Some(val) = lookup("PING_TIMEOUT_MS") {
            self.ping_timeout_ms = parse_number("ping_timeout_ms", &val)?;
        }
        if let Some(val) = lookup("CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse_number("connect_timeout_ms", &val)?;
        }
        if let Some(val) = lookup("PORT_CONCURRENCY") {
            self.port_concurrency = parse_number("port_concurrency", &val)?;
        }
        if let Some(val) = lookup("HOST_CONCURRENCY") {
            self.host_concurrency = parse_number("host_concurrency", &val)?;
        }
        if let Some(val) = lookup("BANNER_TIMEOUT_MS") {
            self.banner_timeout_ms = parse_number("banner_timeout_ms", &val)?;
        }
        if let Some(val) = lookup("HIGH_RTT_MS") {
            self.high_rtt_ms = parse_number("high_rtt_ms", &val)?;
        }
        if let Some(val) = lookup("OUI_DIR") {
            self.oui_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = Some(parse_number("run_timeout_secs", &val)?);
        }
        Ok(self)
    }

    /// Rejects settings that would make the run meaningless. This is the only
    /// error class allowed to abort before scanning starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::InvalidPortList("no ports to scan".into()));
        }
        if self.ports.contains(&0) {
            return Err(ConfigError::InvalidPortList("port 0 is not scannable".into()));
        }
        if self.ping_attempts == 0 || self.ping_attempts > MAX_PING_ATTEMPTS {
            return Err(ConfigError::InvalidValue {
                key: "ping_attempts",
                reason: format!("must be within 1..={MAX_PING_ATTEMPTS}"),
            });
        }
        non_zero("ping_timeout_ms", self.ping_timeout_ms)?;
        non_zero("connect_timeout_ms", self.connect_timeout_ms)?;
        non_zero("banner_timeout_ms", self.banner_timeout_ms)?;
        non_zero("port_concurrency", self.port_concurrency as u64)?;
        non_zero("host_concurrency", self.host_concurrency as u64)?;
        if let Some(secs) = self.run_timeout_secs {
            non_zero("run_timeout_secs", secs)?;
        }
        Ok(())
    }

    /// Sorted, deduplicated copy of the candidate ports.
    pub fn scan_ports(&self) -> Vec<u16> {
        let mut ports = self.ports.clone();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// Parses a port specification such as `22,80,8000-8010`.
///
/// The result is sorted and free of duplicates.
pub fn parse_port_list(spec: &str) -> Result<Vec<u16>, ConfigError> {
    let mut ports = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                return Err(ConfigError::InvalidPortList(format!("{start} > {end} in `{part}`")));
            }
            ports.extend(start..=end);
        } else {
            ports.push(parse_port(part)?);
        }
    }

    if ports.is_empty() {
        return Err(ConfigError::InvalidPortList(format!("`{spec}` names no ports")));
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidPortList(format!("invalid port `{}`", raw.trim()))),
        Ok(port) => Ok(port),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        reason: format!("`{raw}` is not a number"),
    })
}

fn non_zero(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
