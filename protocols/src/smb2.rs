//! SMB2 NEGOTIATE over direct TCP (port 445).
//!
//! Layout follows MS-SMB2 2.2.1 (sync header) and 2.2.3 (NEGOTIATE request).
//! Every multi-byte field is little-endian except the NetBIOS length.

const NETBIOS_SESSION_MESSAGE: u8 = 0x00;
const NETBIOS_HEADER_LEN: usize = 4;

const SMB2_MAGIC: [u8; 4] = [0xFE, b'S', b'M', b'B'];
const SMB1_MAGIC: [u8; 4] = [0xFF, b'S', b'M', b'B'];
const SMB2_HEADER_LEN: u16 = 64;
const SMB2_NEGOTIATE: u16 = 0x0000;
const CREDITS_REQUESTED: u16 = 1;

const NEGOTIATE_STRUCTURE_SIZE: u16 = 36;
const SECURITY_MODE_SIGNING_ENABLED: u16 = 0x0001;
/// Offset of DialectRevision inside the NEGOTIATE response body.
const RESPONSE_DIALECT_OFFSET: usize = 4;

pub const DIALECTS: [u16; 4] = [0x0202, 0x0210, 0x0300, 0x0302];

/// Builds a NetBIOS-framed NEGOTIATE request for [`DIALECTS`].
pub fn negotiate_request(client_guid: [u8; 16]) -> Vec<u8> {
    let mut smb = Vec::with_capacity(SMB2_HEADER_LEN as usize + 36 + DIALECTS.len() * 2);

    // sync header
    smb.extend_from_slice(&SMB2_MAGIC);
    smb.extend_from_slice(&SMB2_HEADER_LEN.to_le_bytes());
    smb.extend_from_slice(&0u16.to_le_bytes()); // credit charge
    smb.extend_from_slice(&0u32.to_le_bytes()); // status
    smb.extend_from_slice(&SMB2_NEGOTIATE.to_le_bytes());
    smb.extend_from_slice(&CREDITS_REQUESTED.to_le_bytes());
    smb.extend_from_slice(&0u32.to_le_bytes()); // flags
    smb.extend_from_slice(&0u32.to_le_bytes()); // next command
    smb.extend_from_slice(&0u64.to_le_bytes()); // message id
    smb.extend_from_slice(&0u32.to_le_bytes()); // process id
    smb.extend_from_slice(&0u32.to_le_bytes()); // tree id
    smb.extend_from_slice(&0u64.to_le_bytes()); // session id
    smb.extend_from_slice(&[0u8; 16]); // signature

    // NEGOTIATE body
    smb.extend_from_slice(&NEGOTIATE_STRUCTURE_SIZE.to_le_bytes());
    smb.extend_from_slice(&(DIALECTS.len() as u16).to_le_bytes());
    smb.extend_from_slice(&SECURITY_MODE_SIGNING_ENABLED.to_le_bytes());
    smb.extend_from_slice(&0u16.to_le_bytes()); // reserved
    smb.extend_from_slice(&0u32.to_le_bytes()); // capabilities
    smb.extend_from_slice(&client_guid);
    smb.extend_from_slice(&0u64.to_le_bytes()); // client start time
    for dialect in DIALECTS {
        smb.extend_from_slice(&dialect.to_le_bytes());
    }

    let mut frame = Vec::with_capacity(NETBIOS_HEADER_LEN + smb.len());
    frame.push(NETBIOS_SESSION_MESSAGE);
    frame.extend_from_slice(&(smb.len() as u32).to_be_bytes()[1..]);
    frame.extend_from_slice(&smb);
    frame
}

fn magic_at(reply: &[u8], offset: usize) -> Option<[u8; 4]> {
    reply.get(offset..offset + 4)?.try_into().ok()
}

/// Reply carries the SMB2 protocol marker, either bare or after a NetBIOS header.
pub fn is_smb2_reply(reply: &[u8]) -> bool {
    magic_at(reply, NETBIOS_HEADER_LEN) == Some(SMB2_MAGIC) || magic_at(reply, 0) == Some(SMB2_MAGIC)
}

pub fn is_smb1_reply(reply: &[u8]) -> bool {
    magic_at(reply, NETBIOS_HEADER_LEN) == Some(SMB1_MAGIC)
}

/// Dialect revision chosen by the server.
pub fn negotiated_dialect(reply: &[u8]) -> Option<u16> {
    if magic_at(reply, NETBIOS_HEADER_LEN) != Some(SMB2_MAGIC) {
        return None;
    }
    let offset = NETBIOS_HEADER_LEN + SMB2_HEADER_LEN as usize + RESPONSE_DIALECT_OFFSET;
    let bytes = reply.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn dialect_name(dialect: u16) -> Option<&'static str> {
    match dialect {
        0x0202 => Some("2.0.2"),
        0x0210 => Some("2.1"),
        0x0300 => Some("3.0"),
        0x0302 => Some("3.0.2"),
        0x0311 => Some("3.1.1"),
        _ => None,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_with_dialect(dialect: u16) -> Vec<u8> {
        let mut smb = vec![0u8; 64 + 8];
        smb[..4].copy_from_slice(&SMB2_MAGIC);
        smb[64..66].copy_from_slice(&65u16.to_le_bytes());
        smb[68..70].copy_from_slice(&dialect.to_le_bytes());
        let mut frame = vec![0, 0, 0, smb.len() as u8];
        frame.extend(smb);
        frame
    }

    #[test]
    fn request_framing() {
        let req = negotiate_request([0xAB; 16]);
        let declared = u32::from_be_bytes([0, req[1], req[2], req[3]]) as usize;
        assert_eq!(req[0], NETBIOS_SESSION_MESSAGE);
        assert_eq!(declared, req.len() - NETBIOS_HEADER_LEN);
        assert_eq!(&req[4..8], &SMB2_MAGIC);
        assert_eq!(u16::from_le_bytes([req[8], req[9]]), 64);
    }

    #[test]
    fn request_lists_dialects_last() {
        let req = negotiate_request([0; 16]);
        let body = &req[4 + 64..];
        assert_eq!(u16::from_le_bytes([body[0], body[1]]), 36);
        assert_eq!(u16::from_le_bytes([body[2], body[3]]), 4);
        assert_eq!(&body[36..], &[0x02, 0x02, 0x10, 0x02, 0x00, 0x03, 0x02, 0x03]);
    }

    #[test]
    fn reply_detection() {
        let reply = reply_with_dialect(0x0302);
        assert!(is_smb2_reply(&reply));
        assert!(!is_smb1_reply(&reply));
        assert_eq!(negotiated_dialect(&reply), Some(0x0302));
        assert_eq!(dialect_name(0x0302), Some("3.0.2"));
    }

    #[test]
    fn smb1_and_short_replies() {
        let smb1 = [0, 0, 0, 4, 0xFF, b'S', b'M', b'B'];
        assert!(is_smb1_reply(&smb1));
        assert!(!is_smb2_reply(&smb1));
        assert_eq!(negotiated_dialect(&[0, 0, 0, 4, 0xFE, b'S', b'M', b'B']), None);
    }
}
