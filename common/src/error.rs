//! Error taxonomy shared by every stage of the pipeline.
//!
//! Network failures are expected and are folded into weaker facts by the caller
//! ("port open, no banner"). Only [`ConfigError`] is allowed to stop a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The operation did not finish before its own deadline.
    #[error("timed out during {operation}")]
    NetworkTimeout { operation: &'static str },

    /// The peer actively refused or tore down the connection.
    #[error("connection refused or reset: {0}")]
    ConnectionRefusedOrReset(#[source] io::Error),

    /// The peer answered with bytes that do not belong to the expected protocol.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("tls handshake failed: {0}")]
    Tls(String),

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),

    /// The run-wide scope was cancelled while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Sorts an I/O error into the taxonomy.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ProbeError::ConnectionRefusedOrReset(err),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ProbeError::NetworkTimeout {
                operation: "socket i/o",
            },
            _ => ProbeError::Io(err),
        }
    }

    pub fn timeout(operation: &'static str) -> Self {
        ProbeError::NetworkTimeout { operation }
    }

    pub fn mismatch(detail: impl Into<String>) -> Self {
        ProbeError::ProtocolMismatch(detail.into())
    }
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        ProbeError::from_io(err)
    }
}

/// A single malformed line in a vendor table. Counted and skipped by the loaders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_name}:{line}: {reason}")]
pub struct VendorTableParseError {
    pub source_name: String,
    pub line: usize,
    pub reason: String,
}

impl VendorTableParseError {
    pub fn new(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port list: {0}")]
    InvalidPortList(String),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("no usable local interface: {0}")]
    NoUsableInterface(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },
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

    #[test]
    fn from_io_sorts_refused_and_reset_together() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(ProbeError::from_io(refused), ProbeError::ConnectionRefusedOrReset(_)));
        assert!(matches!(ProbeError::from_io(reset), ProbeError::ConnectionRefusedOrReset(_)));
    }

    #[test]
    fn from_io_maps_timeouts() {
        let err = io::Error::from(io::ErrorKind::TimedOut);
        assert!(matches!(ProbeError::from_io(err), ProbeError::NetworkTimeout { .. }));
    }

    #[test]
    fn vendor_parse_error_display_points_at_line() {
        let err = VendorTableParseError::new("manuf", 42, "bad prefix");
        assert_eq!(err.to_string(), "manuf:42: bad prefix");
    }
}
