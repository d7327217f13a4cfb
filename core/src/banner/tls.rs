//! TLS handshakes that accept any certificate.
//!
//! The chain is never validated: the point is to record what a device presents,
//! including expired and self-signed certificates. Legacy protocol versions and
//! weak ciphers stay enabled so old management interfaces still complete the
//! handshake.

use std::net::Ipv4Addr;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use lanprobe_common::error::ProbeError;
use lanprobe_common::models::TlsInfo;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::ssl::{SslConnector, SslMethod, SslRef, SslVerifyMode, SslVersion};
use openssl::x509::{X509NameRef, X509Ref};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::debug;

#[derive(Clone)]
pub struct TlsProber {
    connector: SslConnector,
}

impl std::fmt::Debug for TlsProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsProber").finish_non_exhaustive()
    }
}

fn tls_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::Tls(e.to_string())
}

impl TlsProber {
    pub fn new() -> Result<Self, ProbeError> {
        let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(tls_error)?;
        builder.set_verify(SslVerifyMode::NONE);
        builder
            .set_min_proto_version(Some(SslVersion::TLS1))
            .map_err(tls_error)?;
        if let Err(e) = builder.set_cipher_list("ALL:@SECLEVEL=0") {
            debug!("Could not widen the TLS cipher list: {e}");
        }
        Ok(Self {
            connector: builder.build(),
        })
    }

    /// Completes a handshake over `tcp` and reads the negotiated parameters.
    pub async fn handshake(&self, tcp: TcpStream, peer: Ipv4Addr) -> Result<(SslStream<TcpStream>, TlsInfo), ProbeError> {
        let ssl = self
            .connector
            .configure()
            .map_err(tls_error)?
            .verify_hostname(false)
            .use_server_name_indication(false)
            .into_ssl(&peer.to_string())
            .map_err(tls_error)?;

        let mut stream = SslStream::new(ssl, tcp).map_err(tls_error)?;
        Pin::new(&mut stream).connect().await.map_err(tls_error)?;
        let info = session_info(stream.ssl());
        Ok((stream, info))
    }
}

/// Version, cipher and leaf certificate details of an established session.
pub fn session_info(ssl: &SslRef) -> TlsInfo {
    let mut info = TlsInfo {
        version: Some(normalize_version(ssl.version_str())),
        cipher_suite: ssl.current_cipher().map(|c| c.name().to_string()),
        ..TlsInfo::default()
    };
    if let Some(cert) = ssl.peer_certificate() {
        fill_certificate(&mut info, &cert);
    }
    info
}

/// OpenSSL reports TLS 1.0 as `TLSv1`.
fn normalize_version(raw: &str) -> String {
    match raw {
        "TLSv1" => "TLSv1.0".to_string(),
        other => other.to_string(),
    }
}

pub fn fill_certificate(info: &mut TlsInfo, cert: &X509Ref) {
    let subject = name_text(cert.subject_name());
    let issuer = name_text(cert.issuer_name());

    info.subject_cn = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|e| e.data().as_utf8().ok())
        .map(|cn| cn.to_string());

    info.subject_alt_names = cert
        .subject_alt_names()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| {
                    if let Some(dns) = name.dnsname() {
                        return Some(dns.to_string());
                    }
                    match name.ipaddress()? {
                        [a, b, c, d] => Some(Ipv4Addr::new(*a, *b, *c, *d).to_string()),
                        _ => None,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    info.not_before = asn1_to_utc(cert.not_before());
    info.not_after = asn1_to_utc(cert.not_after());
    info.sig_alg = cert
        .signature_algorithm()
        .object()
        .nid()
        .long_name()
        .ok()
        .map(str::to_string);
    info.self_signed = !subject.is_empty() && subject == issuer;
    info.issuer = (!issuer.is_empty()).then_some(issuer);
}

/// `CN=router.local, O=Acme` style rendering.
fn name_text(name: &X509NameRef) -> String {
    name.entries()
        .filter_map(|entry| {
            let key = entry.object().nid().short_name().ok()?;
            let value = entry.data().as_utf8().ok()?;
            Some(format!("{key}={value}"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn asn1_to_utc(time: &Asn1TimeRef) -> Option<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0).ok()?;
    let diff = epoch.diff(time).ok()?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(secs, 0)
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
pub(crate) mod tests {
    use super::*;
    use openssl::asn1::Asn1Integer;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::extension::SubjectAlternativeName;
    use openssl::x509::{X509, X509NameBuilder};

    /// Self-signed certificate valid from 2020-01-01 for 10 years.
    pub(crate) fn self_signed(cn: &str) -> (X509, PKey<Private>) {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Acme Networks").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = Asn1Integer::from_bn(&BigNum::from_u32(1).unwrap()).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(1_577_836_800).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(1_893_456_000).unwrap())
            .unwrap();
        let san = SubjectAlternativeName::new()
            .dns(cn)
            .ip("192.168.1.1")
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(san).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }

    #[test]
    fn certificate_fields_are_extracted() {
        let (cert, _) = self_signed("router.miwifi.com");
        let mut info = TlsInfo::default();
        fill_certificate(&mut info, &cert);

        assert_eq!(info.subject_cn.as_deref(), Some("router.miwifi.com"));
        assert_eq!(info.subject_alt_names, vec!["router.miwifi.com", "192.168.1.1"]);
        assert_eq!(info.issuer.as_deref(), Some("CN=router.miwifi.com, O=Acme Networks"));
        assert!(info.self_signed);
        assert_eq!(info.not_before.unwrap().timestamp(), 1_577_836_800);
        assert_eq!(info.not_after.unwrap().timestamp(), 1_893_456_000);
        assert_eq!(info.sig_alg.as_deref(), Some("sha256WithRSAEncryption"));
    }

    #[test]
    fn tls_one_zero_is_spelled_out() {
        assert_eq!(normalize_version("TLSv1"), "TLSv1.0");
        assert_eq!(normalize_version("TLSv1.3"), "TLSv1.3");
    }

    #[test]
    fn prober_builds() {
        assert!(TlsProber::new().is_ok());
    }
}
