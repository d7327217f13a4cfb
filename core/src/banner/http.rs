//! HTTP and HTTPS fingerprinting: a HEAD, then a GET on a fresh connection
//! for the body.

use lanprobe_common::error::ProbeError;
use lanprobe_common::models::{ServiceBanner, TlsInfo};
use lanprobe_protocols::http::{self as http_proto, HttpDocument, MAX_RESPONSE_BYTES, Method, header_end};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use super::table::ProbeKind;
use super::tls::TlsProber;
use super::{ProbeContext, ProbeOutcome};
use crate::network::tcp::read_until_deadline;

async fn send_request<S>(stream: &mut S, method: Method, host: &str) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&http_proto::request(method, host)).await?;
    stream.flush().await
}

/// Writes one request and reads the response by `deadline`.
///
/// A HEAD reply ends at the blank line. A GET ends at its `Content-Length`,
/// the final chunk or EOF. Servers that keep the connection open anyway are
/// cut off at the deadline and keep what they sent.
pub(super) async fn exchange<S>(
    mut stream: S,
    method: Method,
    host: &str,
    deadline: Instant,
) -> Result<Vec<u8>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout_at(deadline, send_request(&mut stream, method, host)).await {
        Ok(sent) => sent?,
        Err(_) => return Err(ProbeError::timeout("http request")),
    }
    match method {
        Method::Head => {
            read_until_deadline(&mut stream, MAX_RESPONSE_BYTES, deadline, |b| header_end(b).is_some()).await
        }
        Method::Get => {
            read_until_deadline(&mut stream, MAX_RESPONSE_BYTES, deadline, http_proto::response_complete).await
        }
    }
}

/// Opens a connection (TLS when a prober is given) and runs one exchange.
async fn fetch(
    ctx: &ProbeContext<'_>,
    tls: Option<&TlsProber>,
    method: Method,
) -> Result<(HttpDocument, Option<TlsInfo>), ProbeError> {
    let tcp = ctx.connect().await?;
    let host = ctx.host_header();
    match tls {
        Some(prober) => {
            let (stream, info) = ctx.within("tls handshake", prober.handshake(tcp, ctx.host.ip)).await?;
            let raw = ctx.unless_cancelled(exchange(stream, method, &host, ctx.io_deadline())).await?;
            Ok((http_proto::analyze(&raw), Some(info)))
        }
        None => {
            let raw = ctx.unless_cancelled(exchange(tcp, method, &host, ctx.io_deadline())).await?;
            Ok((http_proto::analyze(&raw), None))
        }
    }
}

pub(super) async fn probe(ctx: &ProbeContext<'_>, tls: Option<&TlsProber>) -> ProbeOutcome {
    let secure = tls.is_some();
    let (head, mut tls_info) = match fetch(ctx, tls, Method::Head).await {
        Ok((doc, info)) => (Some(doc), info),
        // Without a handshake there is nothing to retry over TLS.
        Err(e @ ProbeError::Tls(_)) | Err(e @ ProbeError::Cancelled) => return ProbeOutcome::FailedOpen(e),
        Err(e) => {
            debug!("HEAD on {}:{} failed: {e}", ctx.host.ip, ctx.port);
            (None, None)
        }
    };

    // The GET always follows: title, generator and the content hash live in the body.
    let mut method = Method::Head;
    let mut document = head.clone().filter(|d| d.info.status_line.is_some());
    match fetch(ctx, tls, Method::Get).await {
        Ok((mut get, info)) if get.info.status_line.is_some() => {
            if let Some(head) = &head {
                http_proto::merge_headers(&mut get.info.headers, &head.info.headers);
            }
            document = Some(get);
            method = Method::Get;
            tls_info = tls_info.or(info);
        }
        Ok((_, info)) => tls_info = tls_info.or(info),
        Err(e) => debug!("GET on {}:{} failed: {e}", ctx.host.ip, ctx.port),
    }

    let Some(document) = document else {
        return match tls_info {
            Some(info) => ProbeOutcome::Minimal(
                ServiceBanner::new(ctx.port, ProbeKind::Https.probe_name(), "https", "open (tls)").with_tls(info),
            ),
            None => ProbeOutcome::FailedOpen(ProbeError::mismatch("no HTTP status line")),
        };
    };

    let mut banner = web_banner(ctx.port, secure, method, document);
    if let Some(info) = tls_info {
        banner = banner.with_tls(info);
    }
    ProbeOutcome::Rich(banner)
}

fn web_banner(port: u16, secure: bool, method: Method, document: HttpDocument) -> ServiceBanner {
    let (scheme, service) = if secure { ("HTTPS", "https") } else { ("HTTP", "http") };
    let probe = match method {
        Method::Head => "http/head",
        Method::Get => "http/get",
    };
    let status = document
        .status_code()
        .map(|c| c.to_string())
        .or_else(|| document.info.status_line.clone())
        .unwrap_or_default();
    let summary = match document.info.server() {
        Some(server) => format!("{scheme} {status}, {server}"),
        None => format!("{scheme} {status}"),
    };

    let mut banner = ServiceBanner::new(port, probe, service, http_proto::clip(&summary))
        .with_redirect(document.location.clone());
    if let Some(hash) = document.content_hash.clone() {
        banner = banner.with_content_hash(hash);
    }
    banner.with_http(document.info)
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
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use lanprobe_common::models::HostAddress;
    use std::io::Write;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    fn loopback() -> HostAddress {
        HostAddress::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST)
    }

    fn context(port: u16, cancel: &CancellationToken) -> ProbeContext<'_> {
        ProbeContext {
            host: loopback(),
            port,
            connect_timeout: Duration::from_millis(500),
            io_timeout: Duration::from_millis(1000),
            cancel,
        }
    }

    async fn grab_http(port: u16) -> ServiceBanner {
        let cancel = CancellationToken::new();
        probe(&context(port, &cancel), None).await.into_banner(port, ProbeKind::Http)
    }

    /// Answers HEAD with `head` and GET with `get`, counting requests.
    async fn web_server(head: Vec<u8>, get: Vec<u8>) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let gets = Arc::new(AtomicUsize::new(0));
        let counter = gets.clone();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let (head, get, counter) = (head.clone(), get.clone(), counter.clone());
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 1024];
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    let reply = if buf[..n].starts_with(b"GET") {
                        counter.fetch_add(1, Ordering::SeqCst);
                        get
                    } else {
                        head
                    };
                    let _ = sock.write_all(&reply).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        (port, gets)
    }

    /// Answers every request with `reply` and then holds the connection open.
    async fn lingering_server(reply: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 1024];
                    let _ = sock.read(&mut buf).await;
                    let _ = sock.write_all(&reply).await;
                    tokio::time::sleep(Duration::from_secs(10)).await;
                });
            }
        });
        port
    }

    #[tokio::test]
    async fn server_header_still_fetches_the_body() {
        let head = b"HTTP/1.1 200 OK\r\nServer: nginx/1.24.0\r\nContent-Type: text/html\r\n\r\n".to_vec();
        let page = b"<html><title>Router Admin</title></html>";
        let mut get = format!(
            "HTTP/1.1 200 OK\r\nServer: nginx/1.24.0\r\nContent-Length: {}\r\n\r\n",
            page.len()
        )
        .into_bytes();
        get.extend_from_slice(page);
        let (a, gets_a) = web_server(head.clone(), get.clone()).await;
        let (b, gets_b) = web_server(head, get).await;
        let mut ports = vec![a, b];
        ports.sort_unstable();

        let banners = crate::banner::link_duplicates(vec![grab_http(ports[0]).await, grab_http(ports[1]).await]);
        assert_eq!(gets_a.load(Ordering::SeqCst) + gets_b.load(Ordering::SeqCst), 2);
        assert_eq!(banners[0].probe, "http/get");
        assert_eq!(banners[0].summary, "HTTP 200, nginx/1.24.0");
        assert_eq!(banners[0].content_hash, Some(http_proto::content_hash(page)));
        assert_eq!(banners[0].http.as_ref().unwrap().title.as_deref(), Some("Router Admin"));
        assert_eq!(banners[1].duplicate_of_port, Some(ports[0]));
    }

    #[tokio::test]
    async fn sized_response_on_a_kept_alive_connection_ends_early() {
        let page = b"<html><title>Printer Status</title></html>";
        let mut reply =
            format!("HTTP/1.1 200 OK\r\nServer: httpd\r\nContent-Length: {}\r\n\r\n", page.len()).into_bytes();
        reply.extend_from_slice(page);
        let port = lingering_server(reply).await;

        let started = std::time::Instant::now();
        let banner = grab_http(port).await;
        assert!(started.elapsed() < Duration::from_millis(800));
        assert_eq!(banner.probe, "http/get");
        assert_eq!(banner.content_hash, Some(http_proto::content_hash(page)));
    }

    #[tokio::test]
    async fn unterminated_body_is_kept_at_the_deadline() {
        let reply = b"HTTP/1.0 200 OK\r\nServer: GoAhead-Webs\r\n\r\n<title>IPCam</title>".to_vec();
        let port = lingering_server(reply).await;

        let banner = grab_http(port).await;
        assert_eq!(banner.probe, "http/get");
        assert_eq!(banner.summary, "HTTP 200, GoAhead-Webs");
        assert_eq!(banner.http.unwrap().title.as_deref(), Some("IPCam"));
    }

    #[tokio::test]
    async fn serverless_head_falls_back_to_gzip_get() {
        let head = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n".to_vec();
        let html = b"<html><head><meta charset=\"utf-8\"><title> Web  Admin </title>\
            <meta name=\"generator\" content=\"WordPress 6.4\"></head></html>";
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(html).unwrap();
        let body = gz.finish().unwrap();
        let mut get = format!(
            "HTTP/1.1 302 Found\r\nServer: lighttpd/1.4.35\r\nContent-Encoding: gzip\r\nLocation: https://10.0.0.1/\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        get.extend_from_slice(&body);
        let (port, gets) = web_server(head, get).await;

        let banner = grab_http(port).await;
        assert_eq!(gets.load(Ordering::SeqCst), 1);
        assert_eq!(banner.probe, "http/get");
        assert_eq!(banner.summary, "HTTP 302, lighttpd/1.4.35");
        assert_eq!(banner.redirect_to.as_deref(), Some("https://10.0.0.1/"));
        assert_eq!(banner.content_hash, Some(http_proto::content_hash(html)));

        let http = banner.http.unwrap();
        assert!(http.is_compressed);
        assert_eq!(http.title.as_deref(), Some("Web Admin"));
        assert_eq!(http.generator.as_deref(), Some("WordPress 6.4"));
        assert_eq!(http.charset.as_deref(), Some("utf-8"));
    }

    #[tokio::test]
    async fn non_http_service_degrades_to_open() {
        let (port, _) = web_server(b"SSH-2.0-dropbear\r\n".to_vec(), b"SSH-2.0-dropbear\r\n".to_vec()).await;
        let banner = grab_http(port).await;
        assert_eq!(banner.summary, "open");
        assert_eq!(banner.service, "tcp");
    }

    #[tokio::test]
    async fn identical_bodies_on_two_ports_are_linked() {
        let page = b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\nhello router".to_vec();
        let (a, _) = web_server(page.clone(), page.clone()).await;
        let (b, _) = web_server(page.clone(), page).await;
        let mut ports = vec![a, b];
        ports.sort_unstable();

        // Ephemeral ports are not in the HTTP table; probe them directly and link.
        let banners = crate::banner::link_duplicates(vec![grab_http(ports[0]).await, grab_http(ports[1]).await]);
        assert_eq!(banners[0].duplicate_of_port, None);
        assert_eq!(banners[1].duplicate_of_port, Some(ports[0]));
    }

    #[tokio::test]
    async fn https_handshake_failure_is_tls_placeholder() {
        let (port, _) = web_server(b"not tls at all".to_vec(), Vec::new()).await;
        let tls = TlsProber::new().unwrap();
        let cancel = CancellationToken::new();
        let banner = probe(&context(port, &cancel), Some(&tls)).await.into_banner(port, ProbeKind::Https);
        assert_eq!(banner.probe, "tls/cert");
        assert_eq!(banner.summary, "open (tls)");
    }

    #[tokio::test]
    async fn https_reports_certificate_and_headers() {
        use openssl::ssl::{SslAcceptor, SslMethod};
        use std::pin::Pin;

        let (cert, key) = crate::banner::tls::tests::self_signed("router.asus.com");
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        acceptor.set_certificate(&cert).unwrap();
        acceptor.set_private_key(&key).unwrap();
        let acceptor = acceptor.build();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                let ssl = openssl::ssl::Ssl::new(acceptor.context()).unwrap();
                tokio::spawn(async move {
                    let mut stream = tokio_openssl::SslStream::new(ssl, sock).unwrap();
                    if Pin::new(&mut stream).accept().await.is_err() {
                        return;
                    }
                    let mut buf = vec![0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nServer: httpd\r\n\r\n")
                        .await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        let tls = TlsProber::new().unwrap();
        let cancel = CancellationToken::new();
        let banner = probe(&context(port, &cancel), Some(&tls)).await.into_banner(port, ProbeKind::Https);
        assert_eq!(banner.service, "https");
        assert_eq!(banner.summary, "HTTPS 200, httpd");
        let tls = banner.tls.unwrap();
        assert_eq!(tls.subject_cn.as_deref(), Some("router.asus.com"));
        assert!(tls.self_signed);
        assert!(tls.version.unwrap().starts_with("TLSv1"));
    }
}
