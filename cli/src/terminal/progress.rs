use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use lanprobe_common::events::{EventCategory, ProbeEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::terminal::colors;

/// Bar that log lines are printed above while a scan runs.
static ACTIVE: Mutex<Option<ProgressBar>> = Mutex::new(None);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub swept: u64,
    pub alive: u64,
    pub open_ports: u64,
    pub banners: u64,
    pub classified: u64,
}

impl Tally {
    /// Returns whether the event completed one candidate of the sweep.
    pub fn record(&mut self, category: EventCategory) -> bool {
        match category {
            EventCategory::Alive => {
                self.swept += 1;
                self.alive += 1;
                true
            }
            EventCategory::Unreachable => {
                self.swept += 1;
                true
            }
            EventCategory::PortOpen => {
                self.open_ports += 1;
                false
            }
            EventCategory::Banner => {
                self.banners += 1;
                false
            }
            EventCategory::Classified => {
                self.classified += 1;
                false
            }
            EventCategory::Warning => false,
        }
    }

    fn message(&self) -> String {
        format!(
            "{} alive, {} open ports, {} banners",
            self.alive.to_string().green().bold(),
            self.open_ports.to_string().yellow().bold(),
            self.banners
        )
        .color(colors::TEXT_DEFAULT)
        .to_string()
    }
}

pub struct ScanProgress {
    bar: ProgressBar,
    task: JoinHandle<Tally>,
}

impl ScanProgress {
    /// Clears the bar once the event stream has ended.
    pub async fn finish(self) -> Tally {
        let tally = self.task.await.unwrap_or_default();
        self.bar.finish_and_clear();
        if let Ok(mut active) = ACTIVE.lock() {
            *active = None;
        }
        tally
    }
}

/// Drives a bar over `candidates` hosts from the pipeline's event stream.
pub fn track(candidates: u64, mut events: UnboundedReceiver<ProbeEvent>) -> ScanProgress {
    let bar = ProgressBar::new(candidates);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} [{bar:32.green/white}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("█▓░").tick_strings(&[
            "▁▁▁▁▁", "▁▂▂▂▁", "▁▄▂▄▁", "▂▄▆▄▂", "▄▆█▆▄", "▂▄▆▄▂", "▁▄▂▄▁", "▁▂▂▂▁",
        ]));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    if let Ok(mut active) = ACTIVE.lock() {
        *active = Some(bar.clone());
    }

    let handle = bar.clone();
    let task = tokio::spawn(async move {
        let mut tally = Tally::default();
        while let Some(event) = events.recv().await {
            debug!("{} {}: {}", event.host, event.category, event.message);
            if tally.record(event.category) {
                handle.inc(1);
            }
            handle.set_message(tally.message());
        }
        tally
    });

    ScanProgress { bar, task }
}

/// Log writer that keeps output above the active bar.
pub struct ProgressWriter;

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf);
        let msg = msg.trim_end();
        let bar = ACTIVE.lock().ok().and_then(|active| active.clone());
        match bar {
            Some(bar) => bar.println(msg),
            None => writeln!(std::io::stderr(), "{msg}")?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
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
    use lanprobe_common::events::EventSink;
    use std::net::Ipv4Addr;

    #[test]
    fn only_sweep_events_advance_the_bar() {
        let mut tally = Tally::default();
        assert!(tally.record(EventCategory::Alive));
        assert!(tally.record(EventCategory::Unreachable));
        assert!(!tally.record(EventCategory::PortOpen));
        assert!(!tally.record(EventCategory::Classified));
        assert_eq!(tally.swept, 2);
        assert_eq!(tally.alive, 1);
        assert_eq!(tally.open_ports, 1);
    }

    #[tokio::test]
    async fn tally_follows_the_stream() {
        let (sink, rx) = EventSink::channel();
        let progress = track(2, rx);
        let host = Ipv4Addr::new(10, 0, 0, 1);
        sink.emit(host, EventCategory::Alive, "alive via icmp");
        sink.emit(host, EventCategory::PortOpen, "22/tcp open (1 ms)");
        sink.emit(host, EventCategory::Banner, "22/ssh SSH-2.0-OpenSSH");
        sink.emit(Ipv4Addr::new(10, 0, 0, 2), EventCategory::Unreachable, "no icmp or arp reply");
        drop(sink);

        let tally = progress.finish().await;
        assert_eq!(tally.swept, 2);
        assert_eq!(tally.banners, 1);
    }
}
