use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What an HTTP(S) endpoint revealed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpInfo {
    pub status_line: Option<String>,
    /// Header names are lowercased; the first occurrence of a header wins.
    pub headers: BTreeMap<String, String>,
    pub title: Option<String>,
    pub generator: Option<String>,
    pub charset: Option<String>,
    pub is_compressed: bool,
}

impl HttpInfo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn server(&self) -> Option<&str> {
        self.header("server")
    }

    /// Numeric status parsed from the status line.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line
            .as_deref()?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    }
}

/// Handshake and certificate details of a TLS endpoint. The chain is never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TlsInfo {
    pub version: Option<String>,
    pub cipher_suite: Option<String>,
    pub subject_cn: Option<String>,
    pub subject_alt_names: Vec<String>,
    pub issuer: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sig_alg: Option<String>,
    pub self_signed: bool,
}

/// Everything learned about one open port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceBanner {
    pub port: u16,
    /// Probe that produced this banner, e.g. `http/get` or `fact/open`.
    pub probe: String,
    pub service: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_first_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of_port: Option<u16>,
}

impl ServiceBanner {
    pub const FACT_ONLY_PROBE: &'static str = "fact/open";

    pub fn new(
        port: u16,
        probe: impl Into<String>,
        service: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            port,
            probe: probe.into(),
            service: service.into(),
            summary: summary.into(),
            http: None,
            tls: None,
            raw_first_line: None,
            content_hash: None,
            redirect_to: None,
            duplicate_of_port: None,
        }
    }

    /// Placeholder for a port that is open but revealed nothing.
    pub fn open_only(port: u16, service: impl Into<String>) -> Self {
        Self::new(port, Self::FACT_ONLY_PROBE, service, "open")
    }

    pub fn with_http(mut self, http: HttpInfo) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_tls(mut self, tls: TlsInfo) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_first_line(mut self, line: impl Into<String>) -> Self {
        self.raw_first_line = Some(line.into());
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_redirect(mut self, location: Option<String>) -> Self {
        self.redirect_to = location;
        self
    }

    pub fn duplicate_of(mut self, port: u16) -> Self {
        self.duplicate_of_port = Some(port);
        self
    }

    pub fn is_web(&self) -> bool {
        self.http.is_some() || matches!(self.service.as_str(), "http" | "https")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut http = HttpInfo::default();
        http.headers.insert("server".into(), "nginx/1.18.0".into());
        assert_eq!(http.header("Server"), Some("nginx/1.18.0"));
        assert_eq!(http.server(), Some("nginx/1.18.0"));
    }

    #[test]
    fn status_code_comes_from_status_line() {
        let http = HttpInfo {
            status_line: Some("HTTP/1.1 302 Found".into()),
            ..HttpInfo::default()
        };
        assert_eq!(http.status_code(), Some(302));
    }

    #[test]
    fn open_only_banner_is_minimal() {
        let banner = ServiceBanner::open_only(5357, "wsd");
        assert_eq!(banner.probe, "fact/open");
        assert_eq!(banner.summary, "open");
        assert!(banner.http.is_none() && banner.content_hash.is_none());
    }
}
