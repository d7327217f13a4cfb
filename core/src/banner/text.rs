//! Line-oriented probers: SSH, VNC, RTSP, PJL and the generic greeting peek.

use lanprobe_common::error::ProbeError;
use lanprobe_common::models::ServiceBanner;
use lanprobe_protocols::http::{clip, content_hash, header_end};
use lanprobe_protocols::{greeting, pjl as pjl_proto, rtsp as rtsp_proto};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::table::{ProbeKind, service_for_port};
use super::ProbeOutcome;
use crate::network::tcp::{read_some, read_until};

const SSH_LINE_LIMIT: usize = 1024;
const VNC_GREETING_LIMIT: usize = 64;
const PEEK_LIMIT: usize = 1024;
const RTSP_LIMIT: usize = 2048;
const PJL_LIMIT: usize = 1024;

fn minimal(port: u16, kind: ProbeKind, service: &str) -> ProbeOutcome {
    ProbeOutcome::Minimal(ServiceBanner::new(port, kind.probe_name(), service, "open"))
}

pub(super) async fn ssh<S>(mut stream: S, port: u16) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = read_until(&mut stream, SSH_LINE_LIMIT, |b| b.contains(&b'\n')).await?;
    let line = greeting::first_line(&bytes);
    if line.is_empty() {
        return Ok(minimal(port, ProbeKind::Ssh, "ssh"));
    }
    let banner = ServiceBanner::new(port, ProbeKind::Ssh.probe_name(), "ssh", clip(&line)).with_first_line(clip(&line));
    Ok(ProbeOutcome::Rich(banner))
}

pub(super) async fn vnc<S>(mut stream: S, port: u16) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let bytes = read_some(&mut stream, VNC_GREETING_LIMIT).await?;
    let line = greeting::first_line(&bytes);
    if line.is_empty() {
        return Ok(minimal(port, ProbeKind::Vnc, "vnc"));
    }
    let banner = ServiceBanner::new(port, ProbeKind::Vnc.probe_name(), "vnc", clip(&line)).with_first_line(clip(&line));
    Ok(ProbeOutcome::Rich(banner))
}

/// Reads whatever the service volunteers. Key-value stores that wait for the
/// client first get a harmless nudge.
pub(super) async fn peek<S>(mut stream: S, port: u16) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let port_service = service_for_port(port);
    if let Some(nudge) = greeting::nudge_for(port_service) {
        stream.write_all(nudge).await?;
    }
    let bytes = read_some(&mut stream, PEEK_LIMIT).await?;
    let line = greeting::first_line(&bytes);
    if line.is_empty() {
        return Ok(minimal(port, ProbeKind::Peek, port_service));
    }

    let service = greeting::service_from_greeting(&line).unwrap_or(port_service);
    let banner = ServiceBanner::new(port, ProbeKind::Peek.probe_name(), service, clip(&line))
        .with_first_line(clip(&line))
        .with_content_hash(content_hash(&bytes));
    Ok(ProbeOutcome::Rich(banner))
}

pub(super) async fn rtsp<S>(mut stream: S, port: u16, host: String) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&rtsp_proto::options_request(&host)).await?;
    let reply = read_until(&mut stream, RTSP_LIMIT, |b| header_end(b).is_some()).await?;
    match rtsp_proto::summarize(&reply) {
        Some(summary) => Ok(ProbeOutcome::Rich(ServiceBanner::new(
            port,
            ProbeKind::Rtsp.probe_name(),
            "rtsp",
            summary,
        ))),
        None if reply.is_empty() => Ok(minimal(port, ProbeKind::Rtsp, "rtsp")),
        None => Err(ProbeError::mismatch(format!("{} bytes of non-RTSP reply", reply.len()))),
    }
}

pub(super) async fn pjl<S>(mut stream: S, port: u16) -> Result<ProbeOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&pjl_proto::info_id_request()).await?;
    let reply = read_until(&mut stream, PJL_LIMIT, |b| b.iter().filter(|&&c| c == b'"').count() >= 2).await?;
    match pjl_proto::parse_info_id(&reply) {
        Some(id) => Ok(ProbeOutcome::Rich(ServiceBanner::new(
            port,
            ProbeKind::Pjl.probe_name(),
            "printer",
            clip(&format!("PJL: {id}")),
        ))),
        None => Ok(minimal(port, ProbeKind::Pjl, "printer")),
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
