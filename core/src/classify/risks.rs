//! Exposure and hygiene findings, independent of the device kind.

use chrono::{DateTime, Duration, Utc};
use lanprobe_common::models::{DeviceFact, ServiceBanner};
use regex::Regex;
use tracing::warn;

use super::tables::RiskRules;

#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    rules: RiskRules,
    outdated: Vec<Regex>,
}

impl RiskEvaluator {
    pub fn new(rules: RiskRules) -> Self {
        let outdated = rules
            .outdated_servers
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("(?i){pattern}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring outdated-server pattern {pattern:?}: {e}");
                    None
                }
            })
            .collect();
        Self { rules, outdated }
    }

    pub fn evaluate(&self, fact: &DeviceFact, now: DateTime<Utc>) -> Vec<String> {
        let mut risks = Vec::new();
        let open = fact.open_ports();

        for exposed in &self.rules.exposed {
            if open.contains(&exposed.port) {
                risks.push(format!("exposed:{}({})", exposed.service, exposed.port));
            }
        }

        let banners = fact.banners();
        for banner in banners.iter().filter(|b| b.service == "http") {
            let redirects_to_https = banner
                .redirect_to
                .as_deref()
                .is_some_and(|to| to.to_ascii_lowercase().starts_with("https://"));
            if !redirects_to_https {
                risks.push(format!("http:no-https-redirect({})", banner.port));
            }
        }

        for banner in banners {
            self.tls_risks(banner, now, &mut risks);
            let server = banner.http.as_ref().and_then(|h| h.server());
            if let Some(server) = server.filter(|s| self.outdated.iter().any(|re| re.is_match(s))) {
                risks.push(format!("http:outdated-server({},{server})", banner.port));
            }
        }
        risks
    }

    fn tls_risks(&self, banner: &ServiceBanner, now: DateTime<Utc>, risks: &mut Vec<String>) {
        let Some(tls) = &banner.tls else {
            return;
        };
        let port = banner.port;
        if tls.self_signed {
            risks.push(format!("tls:self-signed({port})"));
        }
        if let Some(not_after) = tls.not_after {
            if not_after < now {
                risks.push(format!("tls:expired({port})"));
            } else if not_after < now + Duration::days(self.rules.expiring_days) {
                risks.push(format!("tls:expiring-soon({port})"));
            }
        }
        if let Some(version) = tls.version.as_ref().filter(|v| self.rules.legacy_tls.contains(v)) {
            risks.push(format!("tls:legacy-version({port},{version})"));
        }
        if let Some(cipher) = &tls.cipher_suite {
            let upper = cipher.to_ascii_uppercase();
            let weak_marker = self.rules.weak_cipher_markers.iter().any(|m| upper.contains(m.as_str()));
            // Plain SHA-1 MAC suites end in "-SHA"; SHA256/384 do not.
            if weak_marker || upper.ends_with("-SHA") {
                risks.push(format!("tls:weak-cipher({port})"));
            }
        }
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
