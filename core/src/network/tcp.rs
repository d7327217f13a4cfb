use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use lanprobe_common::error::ProbeError;
use lanprobe_common::models::HostAddress;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{Instant as Deadline, timeout, timeout_at};
use tokio_util::sync::CancellationToken;

/// Connects to `host:port` from the host's interface address.
///
/// The connect is bounded by both `deadline` and `cancel`; whichever fires
/// first aborts it and drops the half-open socket.
pub async fn connect_from(
    host: HostAddress,
    port: u16,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<TcpStream, ProbeError> {
    let socket = TcpSocket::new_v4()?;
    if host.is_bound() {
        socket.bind(SocketAddr::new(IpAddr::V4(host.iface), 0))?;
    }
    let target = SocketAddr::new(IpAddr::V4(host.ip), port);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        res = timeout(deadline, socket.connect(target)) => match res {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ProbeError::from_io(e)),
            Err(_) => Err(ProbeError::timeout("tcp connect")),
        },
    }
}

/// Times a connect and reports whether it completed.
pub async fn probe_open(
    host: HostAddress,
    port: u16,
    deadline: Duration,
    cancel: &CancellationToken,
) -> (bool, Duration) {
    let started = Instant::now();
    let open = connect_from(host, port, deadline, cancel).await.is_ok();
    (open, started.elapsed())
}

/// Reads until EOF, `limit` bytes, or `stop` says the buffer is complete.
/// Bytes gathered before an error are returned only if there are any.
pub async fn read_until<S, F>(stream: &mut S, limit: usize, stop: F) -> Result<Vec<u8>, ProbeError>
where
    S: tokio::io::AsyncRead + Unpin,
    F: Fn(&[u8]) -> bool,
{
    read_loop(stream, limit, None, stop).await
}

/// Like [`read_until`], but gives up at `deadline`. Whatever arrived by then
/// is returned; only a deadline with nothing read is an error.
pub async fn read_until_deadline<S, F>(
    stream: &mut S,
    limit: usize,
    deadline: Deadline,
    stop: F,
) -> Result<Vec<u8>, ProbeError>
where
    S: tokio::io::AsyncRead + Unpin,
    F: Fn(&[u8]) -> bool,
{
    read_loop(stream, limit, Some(deadline), stop).await
}

async fn read_loop<S, F>(
    stream: &mut S,
    limit: usize,
    deadline: Option<Deadline>,
    stop: F,
) -> Result<Vec<u8>, ProbeError>
where
    S: tokio::io::AsyncRead + Unpin,
    F: Fn(&[u8]) -> bool,
{
    let mut buf = Vec::with_capacity(limit.min(8192));
    let mut chunk = [0u8; 4096];
    while buf.len() < limit {
        let want = chunk.len().min(limit - buf.len());
        let read = stream.read(&mut chunk[..want]);
        let res = match deadline {
            Some(at) => match timeout_at(at, read).await {
                Ok(res) => res,
                Err(_) if buf.is_empty() => return Err(ProbeError::timeout("read")),
                Err(_) => break,
            },
            None => read.await,
        };
        match res {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if stop(&buf) {
                    break;
                }
            }
            Err(e) if buf.is_empty() => return Err(ProbeError::from_io(e)),
            Err(_) => break,
        }
    }
    Ok(buf)
}

/// A single read of at most `limit` bytes.
pub async fn read_some<S>(stream: &mut S, limit: usize) -> Result<Vec<u8>, ProbeError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    read_until(stream, limit, |_| true).await
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
