//! Structured probe events.
//!
//! The core never writes logs to disk or drives a progress bar itself. It emits
//! tagged events keyed by host, and whoever holds the receiving end decides
//! what to do with them.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Alive,
    Unreachable,
    PortOpen,
    Banner,
    Classified,
    Warning,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::Alive => "alive",
            EventCategory::Unreachable => "unreachable",
            EventCategory::PortOpen => "port_open",
            EventCategory::Banner => "banner",
            EventCategory::Classified => "classified",
            EventCategory::Warning => "warning",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeEvent {
    pub host: Ipv4Addr,
    pub category: EventCategory,
    pub message: String,
}

/// Sending half of the event queue. Cloning is cheap; a sink without a
/// receiver (or whose receiver was dropped) discards events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ProbeEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<ProbeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, host: Ipv4Addr, category: EventCategory, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProbeEvent {
                host,
                category,
                message: message.into(),
            });
        }
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
