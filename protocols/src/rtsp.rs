//! RTSP `OPTIONS` probe.

use std::sync::LazyLock;

use regex::Regex;

use crate::http::{USER_AGENT, clip, parse_response_with};

static PUBLIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^Public:\s*(.+)$").expect("valid public regex"));

pub fn options_request(host: &str) -> Vec<u8> {
    format!("OPTIONS rtsp://{host}/ RTSP/1.0\r\nCSeq: 1\r\nUser-Agent: {USER_AGENT}\r\n\r\n").into_bytes()
}

/// Methods listed in the `Public` header, trimmed.
pub fn public_methods(reply: &str) -> Option<String> {
    let methods = PUBLIC_RE.captures(reply)?.get(1)?.as_str().trim();
    (!methods.is_empty()).then(|| methods.to_string())
}

/// `RTSP Public: ...`, the status line, or `None` for a non-RTSP reply.
pub fn summarize(reply: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(reply);
    if let Some(methods) = public_methods(&text) {
        return Some(clip(&format!("RTSP Public: {methods}")));
    }
    parse_response_with(reply, "RTSP/").status_line.map(|line| clip(&line))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
