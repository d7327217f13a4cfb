use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};

use crate::models::banner::TlsInfo;
use crate::models::fact::AliveSource;
use crate::network::mac;

/// Device categories the classifier scores. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    Printer,
    Camera,
    Router,
    #[serde(rename = "NAS")]
    Nas,
    #[serde(rename = "PC/Windows")]
    PcWindows,
    #[serde(rename = "PC/Unix")]
    PcUnix,
    #[serde(rename = "Phone/Tablet")]
    PhoneTablet,
    #[serde(rename = "IoT")]
    Iot,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 8] = [
        DeviceKind::Printer,
        DeviceKind::Camera,
        DeviceKind::Router,
        DeviceKind::Nas,
        DeviceKind::PcWindows,
        DeviceKind::PcUnix,
        DeviceKind::PhoneTablet,
        DeviceKind::Iot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Printer => "Printer",
            DeviceKind::Camera => "Camera",
            DeviceKind::Router => "Router",
            DeviceKind::Nas => "NAS",
            DeviceKind::PcWindows => "PC/Windows",
            DeviceKind::PcUnix => "PC/Unix",
            DeviceKind::PhoneTablet => "Phone/Tablet",
            DeviceKind::Iot => "IoT",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredKind {
    pub kind: DeviceKind,
    pub score: f64,
}

/// The ranked verdict for one host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: DeviceKind,
    pub os_guess: String,
    /// Share of the winning score in the sum of all scores, within `[0, 1]`.
    pub confidence: f64,
    /// Every kind's score, clamped at zero.
    pub scores: BTreeMap<DeviceKind, f64>,
    pub reasons: Vec<String>,
    /// Up to three best kinds, winner included, highest first.
    pub alternatives: Vec<ScoredKind>,
}

/// Classifier output: the verdict plus the independently computed risks and anomalies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    #[serde(flatten)]
    pub classification: Classification,
    pub risks: Vec<String>,
    pub anomalies: Vec<String>,
}

/// Flattened, report-friendly view of one banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub port: u16,
    pub service: String,
    pub status: Option<u16>,
    pub server: Option<String>,
    pub title: Option<String>,
    pub generator: Option<String>,
    pub charset: Option<String>,
    pub is_compressed: Option<bool>,
    pub redirect_to: Option<String>,
    pub content_hash: Option<String>,
    pub duplicate_of_port: Option<u16>,
    pub tls: Option<TlsInfo>,
}

impl ServiceEntry {
    /// Entry for an open port nothing could be learned about.
    pub fn bare(port: u16) -> Self {
        Self {
            port,
            service: "tcp".to_string(),
            status: None,
            server: None,
            title: None,
            generator: None,
            charset: None,
            is_compressed: None,
            redirect_to: None,
            content_hash: None,
            duplicate_of_port: None,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAnalysisResult {
    pub ip: Ipv4Addr,
    #[serde(serialize_with = "mac::serialize_opt")]
    pub mac: Option<MacAddr>,
    pub vendor: Option<String>,
    pub ttl: Option<u8>,
    pub rtt_ms: Option<u32>,
    pub alive_source: AliveSource,
    pub open_ports: Vec<u16>,
    pub services: Vec<ServiceEntry>,
    pub risks: Vec<String>,
    pub anomalies: Vec<String>,
    pub classification: Classification,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_report_labels() {
        assert_eq!(serde_json::to_value(DeviceKind::PcWindows).unwrap(), "PC/Windows");
        assert_eq!(serde_json::to_value(DeviceKind::Nas).unwrap(), "NAS");
        assert_eq!(DeviceKind::PhoneTablet.to_string(), "Phone/Tablet");
    }

    #[test]
    fn all_is_in_declaration_order() {
        for (idx, kind) in DeviceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), idx);
        }
    }
}
