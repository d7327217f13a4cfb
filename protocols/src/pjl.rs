//! PJL `INFO ID` query for raw-print (JetDirect) ports.

const UEL: &str = "\x1B%-12345X";

pub fn info_id_request() -> Vec<u8> {
    format!("{UEL}@PJL INFO ID\r\n{UEL}\r\n").into_bytes()
}

/// The quoted model identifier from an `@PJL INFO ID` reply.
pub fn parse_info_id(reply: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(reply);
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    let id = text[start..start + len].trim();
    (!id.is_empty()).then(|| id.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
