//! RDP and SMB2 negotiation probers. Request bytes come from the protocol
//! builders; only enough of the reply is decoded to confirm the service.

use lanprobe_common::error::ProbeError;
use lanprobe_common::models::ServiceBanner;
use lanprobe_protocols::{rdp as rdp_proto, smb2 as smb2_proto};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::ProbeOutcome;
use super::table::ProbeKind;
use crate::network::tcp::read_some;

const REPLY_LIMIT: usize = 1024;

pub(super) async fn rdp<S>(mut stream: S, port: u16) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&rdp_proto::connection_request(rdp_proto::DEFAULT_COOKIE)).await?;
    let reply = read_some(&mut stream, REPLY_LIMIT).await?;
    if reply.is_empty() {
        return Ok(ProbeOutcome::Minimal(ServiceBanner::new(
            port,
            ProbeKind::Rdp.probe_name(),
            "rdp",
            "open",
        )));
    }

    let mut summary = format!("RDP: {} bytes reply", reply.len());
    if rdp_proto::is_connection_confirm(&reply) {
        summary.push_str(" (X.224 CC)");
    }
    Ok(ProbeOutcome::Rich(ServiceBanner::new(
        port,
        ProbeKind::Rdp.probe_name(),
        "rdp",
        summary,
    )))
}

pub(super) async fn smb2<S>(mut stream: S, port: u16, client_guid: [u8; 16]) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&smb2_proto::negotiate_request(client_guid)).await?;
    let reply = read_some(&mut stream, REPLY_LIMIT).await?;
    let probe = ProbeKind::Smb2.probe_name();

    if reply.is_empty() {
        return Ok(ProbeOutcome::Minimal(ServiceBanner::new(port, probe, "smb", "open")));
    }
    if smb2_proto::is_smb2_reply(&reply) {
        let summary = match smb2_proto::negotiated_dialect(&reply).and_then(smb2_proto::dialect_name) {
            Some(dialect) => format!("SMB2/3 negotiate reply (dialect {dialect})"),
            None => "SMB2/3 negotiate reply".to_string(),
        };
        return Ok(ProbeOutcome::Rich(ServiceBanner::new(port, probe, "smb", summary)));
    }
    Ok(ProbeOutcome::Minimal(ServiceBanner::new(
        port,
        probe,
        "smb",
        format!("SMB reply {} bytes", reply.len()),
    )))
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
    use tokio::io::{AsyncReadExt, duplex};

    fn summary(outcome: ProbeOutcome) -> String {
        match outcome {
            ProbeOutcome::Rich(b) | ProbeOutcome::Minimal(b) => b.summary,
            ProbeOutcome::FailedOpen(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[tokio::test]
    async fn rdp_confirm_is_recognized() {
        let (client, mut server) = duplex(1024);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(buf[0], 0x03);
            assert_eq!(n, u16::from_be_bytes([buf[2], buf[3]]) as usize);
            // TPKT + X.224 CC + RDP_NEG_RSP selecting TLS
            server
                .write_all(&[
                    0x03, 0x00, 0x00, 0x13, 0x0e, 0xd0, 0x00, 0x00, 0x12, 0x34, 0x00, 0x02, 0x00, 0x08, 0x00,
                    0x01, 0x00, 0x00, 0x00,
                ])
                .await
                .unwrap();
            server
        });

        let outcome = rdp(client, 3389).await.unwrap();
        let _server = task.await.unwrap();
        assert!(outcome.is_rich());
        assert_eq!(summary(outcome), "RDP: 19 bytes reply (X.224 CC)");
    }

    #[tokio::test]
    async fn rdp_any_reply_counts() {
        let (client, mut server) = duplex(1024);
        server.write_all(b"\x03\x00\x00\x09junk!").await.unwrap();
        assert_eq!(summary(rdp(client, 3389).await.unwrap()), "RDP: 9 bytes reply");
    }

    #[tokio::test]
    async fn smb2_reply_with_dialect() {
        let (client, mut server) = duplex(1024);
        let mut reply = vec![0x00, 0x00, 0x00, 0x48];
        reply.extend_from_slice(b"\xfeSMB");
        reply.resize(4 + 64, 0);
        // StructureSize, SecurityMode, DialectRevision 0x0302
        reply.extend_from_slice(&[0x41, 0x00, 0x01, 0x00, 0x02, 0x03]);
        server.write_all(&reply).await.unwrap();

        let outcome = smb2(client, 445, [7; 16]).await.unwrap();
        assert_eq!(summary(outcome), "SMB2/3 negotiate reply (dialect 3.0.2)");
    }

    #[tokio::test]
    async fn smb1_only_server_reports_size() {
        let (client, mut server) = duplex(1024);
        let mut reply = vec![0x00, 0x00, 0x00, 0x20];
        reply.extend_from_slice(b"\xffSMB");
        reply.resize(36, 0);
        server.write_all(&reply).await.unwrap();

        let outcome = smb2(client, 445, [0; 16]).await.unwrap();
        assert!(!outcome.is_rich());
        assert_eq!(summary(outcome), "SMB reply 36 bytes");
    }
}
