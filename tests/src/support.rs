//! Loopback services and liveness fakes shared by the integration tests.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lanprobe_common::config::RunConfig;
use lanprobe_common::events::EventSink;
use lanprobe_common::models::HostAddress;
use lanprobe_core::Pipeline;
use lanprobe_core::liveness::{EchoProber, EchoReply, NeighborSource, NeighborTable};
use lanprobe_core::vendors::OuiVendorResolver;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answers every echo request after `rtt`, with a fixed TTL.
pub struct ReachableEcho {
    pub rtt: Duration,
    pub ttl: u8,
}

#[async_trait]
impl EchoProber for ReachableEcho {
    async fn echo(&self, _host: HostAddress, _seq: u16, _timeout: Duration) -> Option<EchoReply> {
        Some(EchoReply {
            rtt: self.rtt,
            ttl: Some(self.ttl),
        })
    }
}

/// Never answers; every attempt runs into its timeout.
pub struct SilentEcho;

#[async_trait]
impl EchoProber for SilentEcho {
    async fn echo(&self, _host: HostAddress, _seq: u16, timeout: Duration) -> Option<EchoReply> {
        tokio::time::sleep(timeout).await;
        None
    }
}

pub struct StaticNeighbors(pub NeighborTable);

#[async_trait]
impl NeighborSource for StaticNeighbors {
    async fn snapshot(&self) -> NeighborTable {
        self.0.clone()
    }
}

pub fn loopback(ip: Ipv4Addr) -> HostAddress {
    HostAddress::new(ip, ip)
}

/// Short timeouts so a whole run stays well under a second per host.
pub fn fast_config(ports: Vec<u16>) -> RunConfig {
    RunConfig {
        ports,
        ping_attempts: 2,
        ping_timeout_ms: 200,
        ping_delay_ms: 1,
        connect_timeout_ms: 300,
        banner_timeout_ms: 400,
        ..RunConfig::default()
    }
}

pub fn pipeline(
    config: RunConfig,
    echo: Arc<dyn EchoProber>,
    neighbors: NeighborTable,
    events: EventSink,
) -> Pipeline {
    Pipeline::builder(config)
        .vendors(Arc::new(OuiVendorResolver::empty()))
        .echo(echo)
        .neighbors(Arc::new(StaticNeighbors(neighbors)))
        .events(events)
        .build()
        .expect("valid test pipeline")
}

/// Writes `greeting` on connect, then waits for the client to hang up.
pub async fn greeting_server(ip: Ipv4Addr, greeting: &'static [u8]) -> u16 {
    let listener = TcpListener::bind(SocketAddrV4::new(ip, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = stream.write_all(greeting).await;
                let mut sink = [0u8; 256];
                while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
            });
        }
    });
    port
}

/// Accepts connections and never sends a byte.
pub async fn silent_server(ip: Ipv4Addr) -> u16 {
    greeting_server(ip, b"").await
}

/// A port on `ip` with nothing listening.
pub async fn closed_port(ip: Ipv4Addr) -> u16 {
    let listener = TcpListener::bind(SocketAddrV4::new(ip, 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Serves the same HTTP response to any request on a fixed port, HEAD and
/// GET alike. Returns `None` if the port is taken on this machine.
pub async fn http_server_on(
    ip: Ipv4Addr,
    port: u16,
    server: Option<&'static str>,
    body: &'static str,
) -> Option<u16> {
    let listener = TcpListener::bind(SocketAddrV4::new(ip, port)).await.ok()?;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 512];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let server_line = server.map(|s| format!("Server: {s}\r\n")).unwrap_or_default();
                let head = format!(
                    "HTTP/1.1 200 OK\r\n{server_line}Content-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                if request.starts_with(b"GET") {
                    let _ = stream.write_all(body.as_bytes()).await;
                }
                let _ = stream.shutdown().await;
            });
        }
    });
    Some(port)
}
