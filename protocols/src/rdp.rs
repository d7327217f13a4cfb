//! RDP connection request (TPKT + X.224 CR + RDP_NEG_REQ).
//!
//! Only enough of MS-RDPBCGR is implemented to make a server answer; the
//! reply is never decoded past the X.224 header and the negotiation response.

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;

const X224_CONNECTION_REQUEST: u8 = 0xE0;
const X224_CONNECTION_CONFIRM: u8 = 0xD0;
/// Length indicator, code, dst-ref (2), src-ref (2), class.
const X224_CR_FIXED_LEN: usize = 7;
const X224_CLASS_0: u8 = 0x00;

const NEG_REQ_TYPE: u8 = 0x01;
const NEG_RSP_TYPE: u8 = 0x02;
const NEG_LEN: u16 = 8;

pub const PROTOCOL_SSL: u32 = 0x0000_0001;
pub const PROTOCOL_HYBRID: u32 = 0x0000_0002;

/// Cookie name sent in the `mstshash` routing token.
pub const DEFAULT_COOKIE: &str = "lanprobe";

/// Builds a connection request offering TLS and CredSSP.
pub fn connection_request(cookie: &str) -> Vec<u8> {
    let cookie = format!("Cookie: mstshash={cookie}\r\n");
    let total = TPKT_HEADER_LEN + X224_CR_FIXED_LEN + cookie.len() + NEG_LEN as usize;

    let mut buf = Vec::with_capacity(total);
    buf.push(TPKT_VERSION);
    buf.push(0x00);
    buf.extend_from_slice(&(total as u16).to_be_bytes());

    // X.224 length indicator excludes itself
    buf.push((total - TPKT_HEADER_LEN - 1) as u8);
    buf.push(X224_CONNECTION_REQUEST);
    buf.extend_from_slice(&[0x00, 0x00]);
    buf.extend_from_slice(&[0x00, 0x00]);
    buf.push(X224_CLASS_0);

    buf.extend_from_slice(cookie.as_bytes());

    buf.push(NEG_REQ_TYPE);
    buf.push(0x00);
    buf.extend_from_slice(&NEG_LEN.to_le_bytes());
    buf.extend_from_slice(&(PROTOCOL_SSL | PROTOCOL_HYBRID).to_le_bytes());
    buf
}

/// True when the reply carries an X.224 connection confirm.
pub fn is_connection_confirm(reply: &[u8]) -> bool {
    reply.len() > TPKT_HEADER_LEN + 1
        && reply[0] == TPKT_VERSION
        && reply[TPKT_HEADER_LEN + 1] == X224_CONNECTION_CONFIRM
}

/// Security protocol the server selected, when the confirm carries an RDP_NEG_RSP.
pub fn selected_protocol(reply: &[u8]) -> Option<u32> {
    if !is_connection_confirm(reply) {
        return None;
    }
    let neg = reply.get(TPKT_HEADER_LEN + X224_CR_FIXED_LEN..)?;
    if neg.first() != Some(&NEG_RSP_TYPE) || neg.len() < NEG_LEN as usize {
        return None;
    }
    Some(u32::from_le_bytes([neg[4], neg[5], neg[6], neg[7]]))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
