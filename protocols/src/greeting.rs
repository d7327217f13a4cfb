//! Server-first text greetings (mail, FTP, key-value stores).

/// Bytes that make a silent key-value store answer, keyed by the port's service.
pub fn nudge_for(service: &str) -> Option<&'static [u8]> {
    match service {
        "redis" => Some(b"PING\r\n"),
        "memcached" => Some(b"version\r\n"),
        _ => None,
    }
}

/// Refines the service label from greeting text.
pub fn service_from_greeting(text: &str) -> Option<&'static str> {
    let lower = text.trim_start().to_ascii_lowercase();
    if lower.starts_with("ssh-") {
        return Some("ssh");
    }
    if lower.starts_with("rfb ") {
        return Some("vnc");
    }
    if lower.starts_with("+ok") || lower.contains("pop3") {
        return Some("pop3");
    }
    if lower.starts_with("* ok") || lower.contains("imap") {
        return Some("imap");
    }
    if lower.starts_with("220") && (lower.contains("smtp") || lower.contains("esmtp")) {
        return Some("smtp");
    }
    if lower.starts_with("220") && lower.contains("ftp") {
        return Some("ftp");
    }
    if lower.starts_with("+pong") || lower.contains("redis") || lower.starts_with("-noauth") {
        return Some("redis");
    }
    if lower.starts_with("version ") || lower.contains("memcached") {
        return Some("memcached");
    }
    None
}

/// First line of a greeting, without the line terminator.
pub fn first_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.lines().next().unwrap_or_default().trim().to_string()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
