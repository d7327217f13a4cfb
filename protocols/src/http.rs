//! Minimal HTTP/1.1 client side: request bytes in, [`HttpDocument`] out.
//!
//! The parser is deliberately forgiving. Embedded web servers on printers and
//! cameras routinely send malformed headers, bare `\n` line endings or bodies
//! longer than their `Content-Length`; whatever can be read is kept.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::LazyLock;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use lanprobe_common::models::HttpInfo;
use regex::Regex;
use sha1::{Digest, Sha1};

/// Hard cap on bytes read from a single response.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;
/// Extracted strings (title, generator, summaries) are cut to this many characters.
pub const MAX_TEXT_CHARS: usize = 180;
pub const USER_AGENT: &str = "LanProbe/1.0";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static GENERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]*name\s*=\s*["']generator["'][^>]*content\s*=\s*["'](.*?)["']"#)
        .expect("valid generator regex")
});
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).expect("valid charset regex")
});
static HEADER_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)charset=([A-Za-z0-9_\-]+)").expect("valid charset regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
        }
    }
}

/// Request for `/` with `Connection: close`, so the server delimits the body by closing.
pub fn request(method: Method, host: &str) -> Vec<u8> {
    let mut req = format!(
        "{} / HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {USER_AGENT}\r\n",
        method.as_str()
    );
    if method == Method::Get {
        req.push_str("Accept-Encoding: gzip, deflate\r\n");
    }
    req.push_str("Connection: close\r\n\r\n");
    req.into_bytes()
}

/// Index just past the blank line that ends the header block.
pub fn header_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Status line, first-wins lowercase headers and the raw (still encoded) body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub status_line: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Splits a raw response. `status_prefix` is `HTTP/` or `RTSP/`.
pub fn parse_response_with(raw: &[u8], status_prefix: &str) -> ParsedResponse {
    let (head, body) = match header_end(raw) {
        Some(end) => (&raw[..end], raw[end..].to_vec()),
        None => (raw, Vec::new()),
    };
    let head = String::from_utf8_lossy(head);
    let mut lines = head.lines();

    let status_line = lines
        .next()
        .map(str::trim)
        .filter(|line| {
            line.get(..status_prefix.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(status_prefix))
        })
        .map(str::to_string);

    let mut headers = BTreeMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            if !name.is_empty() {
                headers.entry(name).or_insert_with(|| value.trim().to_string());
            }
        }
    }

    ParsedResponse {
        status_line,
        headers,
        body,
    }
}

pub fn parse_response(raw: &[u8]) -> ParsedResponse {
    parse_response_with(raw, "HTTP/")
}

/// Reassembles a chunked body. Stops at the terminating chunk or at the first
/// malformed size line, keeping whatever was decoded so far.
pub fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;
    loop {
        let Some(line_end) = rest.windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let size_line = String::from_utf8_lossy(&rest[..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let Ok(size) = usize::from_str_radix(size_hex, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        let end = (start + size).min(rest.len());
        out.extend_from_slice(&rest[start..end]);
        if end + 2 > rest.len() {
            break;
        }
        rest = &rest[end + 2..];
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn from_header(value: Option<&str>) -> Self {
        let value = value.unwrap_or_default().to_ascii_lowercase();
        if value.contains("gzip") {
            ContentEncoding::Gzip
        } else if value.contains("deflate") {
            ContentEncoding::Deflate
        } else {
            ContentEncoding::Identity
        }
    }
}

/// Decompresses a body. `deflate` is tried as zlib first, then as a raw stream,
/// since servers disagree on what the token means.
pub fn decode_body(body: &[u8], encoding: ContentEncoding) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match encoding {
        ContentEncoding::Identity => return Ok(body.to_vec()),
        ContentEncoding::Gzip => {
            GzDecoder::new(body).take(MAX_RESPONSE_BYTES as u64 * 4).read_to_end(&mut out)?;
        }
        ContentEncoding::Deflate => {
            let zlib = ZlibDecoder::new(body)
                .take(MAX_RESPONSE_BYTES as u64 * 4)
                .read_to_end(&mut out);
            if zlib.is_err() {
                out.clear();
                DeflateDecoder::new(body)
                    .take(MAX_RESPONSE_BYTES as u64 * 4)
                    .read_to_end(&mut out)?;
            }
        }
    }
    Ok(out)
}

/// Cuts to [`MAX_TEXT_CHARS`] characters on a char boundary.
pub fn clip(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}

fn squash(text: &str) -> Option<String> {
    let squashed = WHITESPACE_RE.replace_all(text, " ");
    let squashed = squashed.trim();
    (!squashed.is_empty()).then(|| clip(squashed))
}

pub fn extract_title(html: &str) -> Option<String> {
    squash(TITLE_RE.captures(html)?.get(1)?.as_str())
}

pub fn extract_generator(html: &str) -> Option<String> {
    squash(GENERATOR_RE.captures(html)?.get(1)?.as_str())
}

pub fn meta_charset(html: &str) -> Option<String> {
    Some(META_CHARSET_RE.captures(html)?.get(1)?.as_str().to_string())
}

pub fn header_charset(content_type: &str) -> Option<String> {
    Some(HEADER_CHARSET_RE.captures(content_type)?.get(1)?.as_str().to_string())
}

/// Lowercase hex SHA-1.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha1::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

/// Everything extracted from one response, body already de-chunked and decompressed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpDocument {
    pub info: HttpInfo,
    pub body: Vec<u8>,
    pub content_hash: Option<String>,
    pub location: Option<String>,
}

impl HttpDocument {
    pub fn status_code(&self) -> Option<u16> {
        self.info.status_code()
    }
}

/// Whether `buf` already holds a whole GET response, so reading can stop
/// without waiting for the server to close.
///
/// The body is delimited by `Content-Length` or the final chunk. Without
/// either the response runs to EOF, except for statuses that carry no body.
pub fn response_complete(buf: &[u8]) -> bool {
    let Some(end) = header_end(buf) else {
        return false;
    };
    let head = parse_response(&buf[..end]);
    let body = &buf[end..];

    if head
        .header("transfer-encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    {
        return body.starts_with(b"0\r\n\r\n") || body.windows(7).any(|w| w == b"\r\n0\r\n\r\n");
    }
    if let Some(length) = head.header("content-length").and_then(|v| v.trim().parse::<usize>().ok()) {
        return body.len() >= length;
    }
    let status = head
        .status_line
        .as_deref()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok());
    matches!(status, Some(100..=199 | 204 | 304))
}

/// Parses and decodes a raw response.
pub fn analyze(raw: &[u8]) -> HttpDocument {
    let parsed = parse_response(raw);

    let body = if parsed
        .header("transfer-encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    {
        dechunk(&parsed.body)
    } else {
        parsed.body.clone()
    };

    let encoding = ContentEncoding::from_header(parsed.header("content-encoding"));
    let is_compressed = encoding != ContentEncoding::Identity;
    let body = match decode_body(&body, encoding) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!("Could not decode {encoding:?} body: {e}");
            Vec::new()
        }
    };

    let text = String::from_utf8_lossy(&body);
    let charset = meta_charset(&text).or_else(|| parsed.header("content-type").and_then(header_charset));
    let location = parsed.header("location").map(clip);
    let content_hash = (!body.is_empty()).then(|| content_hash(&body));

    let info = HttpInfo {
        status_line: parsed.status_line.as_deref().map(clip),
        title: extract_title(&text),
        generator: extract_generator(&text),
        charset,
        is_compressed,
        headers: parsed.headers,
    };

    HttpDocument {
        info,
        body,
        content_hash,
        location,
    }
}

/// Adds headers from `later` that `earlier` did not already carry.
pub fn merge_headers(earlier: &mut BTreeMap<String, String>, later: &BTreeMap<String, String>) {
    for (name, value) in later {
        earlier.entry(name.clone()).or_insert_with(|| value.clone());
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
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn get_request_asks_for_compression() {
        let req = String::from_utf8(request(Method::Get, "10.0.0.1")).unwrap();
        assert!(req.starts_with("GET / HTTP/1.1\r\nHost: 10.0.0.1\r\n"));
        assert!(req.contains("Accept-Encoding: gzip, deflate\r\n"));
        assert!(req.ends_with("Connection: close\r\n\r\n"));

        let head = String::from_utf8(request(Method::Head, "h")).unwrap();
        assert!(!head.contains("Accept-Encoding"));
    }

    #[test]
    fn headers_are_lowercase_and_first_wins() {
        let raw = b"HTTP/1.1 200 OK\r\nServer: first\r\nSERVER: second\r\nX-Odd:no-space\r\n\r\nbody";
        let parsed = parse_response(raw);
        assert_eq!(parsed.status_line.as_deref(), Some("HTTP/1.1 200 OK"));
        assert_eq!(parsed.header("Server"), Some("first"));
        assert_eq!(parsed.header("x-odd"), Some("no-space"));
        assert_eq!(parsed.body, b"body");
    }

    #[test]
    fn non_http_first_line_has_no_status() {
        let parsed = parse_response(b"SSH-2.0-OpenSSH_9.6\r\n");
        assert!(parsed.status_line.is_none());
    }

    #[test]
    fn dechunk_joins_chunks_and_ignores_extensions() {
        let body = b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n";
        assert_eq!(dechunk(body), b"Wikipedia");
        assert_eq!(dechunk(b"zz\r\nbroken"), b"");
    }

    #[test]
    fn gzip_body_is_decoded_before_extraction() {
        let html = b"<html><head><title>  Router\n Login </title></head></html>";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(html).unwrap();
        let gz = encoder.finish().unwrap();

        let mut raw = b"HTTP/1.1 200 OK\r\nServer: lighttpd\r\nContent-Encoding: gzip\r\n\r\n".to_vec();
        raw.extend_from_slice(&gz);
        let doc = analyze(&raw);

        assert!(doc.info.is_compressed);
        assert_eq!(doc.info.title.as_deref(), Some("Router Login"));
        assert_eq!(doc.body, html);
        assert_eq!(doc.content_hash, Some(content_hash(html)));
    }

    #[test]
    fn extracts_generator_and_charset() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Type: text/html; charset=ISO-8859-1\r\n\r\n\
            <meta name=\"generator\" content=\"WordPress 6.5\">";
        let doc = analyze(raw);
        assert_eq!(doc.info.generator.as_deref(), Some("WordPress 6.5"));
        assert_eq!(doc.info.charset.as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn redirect_location_and_empty_body() {
        let redirect = analyze(b"HTTP/1.1 301 Moved\r\nLocation: https://10.0.0.1/\r\n\r\n");
        assert_eq!(redirect.location.as_deref(), Some("https://10.0.0.1/"));
        assert!(redirect.content_hash.is_none());
    }

    #[test]
    fn complete_responses_by_length_and_final_chunk() {
        let sized = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        assert!(response_complete(sized));
        assert!(!response_complete(&sized[..sized.len() - 1]));

        let chunked = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        assert!(response_complete(chunked));
        assert!(!response_complete(&chunked[..chunked.len() - 5]));

        assert!(response_complete(b"HTTP/1.1 304 Not Modified\r\nServer: x\r\n\r\n"));
        assert!(!response_complete(b"HTTP/1.0 200 OK\r\nServer: x\r\n\r\n<html>"));
        assert!(!response_complete(b"HTTP/1.1 200 OK\r\nContent-Le"));
    }

    #[test]
    fn sha1_is_lowercase_hex() {
        assert_eq!(content_hash(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(clip(&long).chars().count(), MAX_TEXT_CHARS);
    }
}
