//! Byte-level request builders and response parsers for the banner probes.
//!
//! Nothing here touches a socket; callers own the transport and deadlines.

pub mod greeting;
pub mod http;
pub mod pjl;
pub mod rdp;
pub mod rtsp;
pub mod smb2;
