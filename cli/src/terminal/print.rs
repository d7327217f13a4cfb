use colored::*;
use lanprobe_common::models::{DeviceAnalysisResult, ServiceEntry};
use tracing::info;

use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 64;
pub const PRINT_TARGET: &str = "lanprobe::print";
const KEY_WIDTH: usize = 8;

type Detail = (String, ColoredString);

pub fn print(msg: &str) {
    info!(target: "lanprobe::print", raw_msg = msg);
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

pub fn fat_separator() {
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).bright_black();
    print(&format!("{}", sep));
}

/// Centers `plain` before colouring it, so escape codes do not skew the width.
pub fn centerln(plain: &str, paint: impl Fn(&str) -> ColoredString) {
    let space = " ".repeat(TOTAL_WIDTH.saturating_sub(plain.chars().count()) / 2);
    print(&format!("{}{}", space, paint(plain)));
}

pub fn aligned_line(key: &str, value: ColoredString) {
    let dots: String = ".".repeat((KEY_WIDTH + 2).saturating_sub(key.len()));
    let colon: String = format!("{}{}", dots.color(colors::SEPARATOR), ":".color(colors::SEPARATOR));
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    print(&format!("{} {}{} {}", prefix, key.color(colors::PRIMARY), colon, value));
}

pub fn tree_head(idx: usize, name: &str) {
    let idx_str: String = format!("[{}]", idx.to_string().color(colors::ACCENT));
    let output: String = format!(
        "{} {}",
        idx_str.color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    );
    print(&output);
}

pub fn as_tree_one_level(key_value_pair: Vec<Detail>) {
    for (i, (key, value)) in key_value_pair.iter().enumerate() {
        let last: bool = i + 1 == key_value_pair.len();
        let branch: ColoredString = if !last {
            "├─".bright_black()
        } else {
            "└─".bright_black()
        };
        let dots = ".".repeat(KEY_WIDTH.saturating_sub(key.chars().count()));
        let output: String = format!(
            " {} {}{}{} {}",
            branch,
            key.color(colors::TEXT_DEFAULT),
            dots.color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
            value
        );
        print(&output);
    }
}

pub fn no_results() {
    centerln("no live hosts found", |s| s.red().bold());
}

/// `ssh:22 (OpenSSH)` style service label.
pub fn service_label(service: &ServiceEntry) -> String {
    let mut label = format!("{}:{}", service.service, service.port);
    let detail = service
        .server
        .as_deref()
        .or(service.title.as_deref())
        .or(service.tls.as_ref().and_then(|t| t.subject_cn.as_deref()));
    if let Some(detail) = detail {
        label.push_str(&format!(" ({detail})"));
    }
    if let Some(port) = service.duplicate_of_port {
        label.push_str(&format!(" = {port}"));
    }
    label
}

/// Rows shown under a host's tree head.
pub fn analysis_details(analysis: &DeviceAnalysisResult) -> Vec<Detail> {
    let c = &analysis.classification;
    let mut details: Vec<Detail> = vec![(
        "Kind".to_string(),
        format!("{} ({:.0}%)", c.kind, c.confidence * 100.0).bold().green(),
    )];
    details.push(("OS".to_string(), c.os_guess.normal()));

    if let Some(mac) = analysis.mac {
        details.push(("MAC".to_string(), mac.to_string().color(colors::MAC_ADDR)));
    }
    if let Some(vendor) = &analysis.vendor {
        details.push(("Vendor".to_string(), vendor.normal()));
    }

    let mut link = analysis.alive_source.as_str().to_string();
    if let Some(ttl) = analysis.ttl {
        link.push_str(&format!(", ttl {ttl}"));
    }
    if let Some(rtt) = analysis.rtt_ms {
        link.push_str(&format!(", {rtt} ms"));
    }
    details.push(("Seen".to_string(), link.normal()));

    for service in &analysis.services {
        details.push(("Port".to_string(), service_label(service).color(colors::ACCENT)));
    }
    if !analysis.risks.is_empty() {
        details.push(("Risks".to_string(), analysis.risks.join(", ").color(colors::RISK)));
    }
    if !analysis.anomalies.is_empty() {
        details.push(("Anomaly".to_string(), analysis.anomalies.join(", ").color(colors::ANOMALY)));
    }
    if !c.reasons.is_empty() {
        let reasons: Vec<&str> = c.reasons.iter().take(3).map(String::as_str).collect();
        details.push(("Why".to_string(), reasons.join("; ").dimmed()));
    }
    details
}

pub fn analyses(analyses: &[DeviceAnalysisResult]) {
    for (idx, analysis) in analyses.iter().enumerate() {
        tree_head(idx, &analysis.ip.to_string().color(colors::IPV4_ADDR).to_string());
        as_tree_one_level(analysis_details(analysis));
        if idx + 1 != analyses.len() {
            print("");
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
