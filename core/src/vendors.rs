//! # MAC Vendor Resolution
//!
//! [`OuiVendorResolver`] merges the IEEE, Wireshark and nmap vendor tables found
//! in a data directory into one prefix map. It is built once per run and shared
//! behind an `Arc`; nothing here performs network I/O.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lanprobe_common::error::VendorTableParseError;
use lanprobe_common::models::{MacPrefix, VendorRecord, VendorSource};
use lanprobe_common::network::mac::{self, mac_key};
use mac_oui::Oui;
use pnet::util::MacAddr;
use rayon::prelude::*;
use tracing::{debug, info, warn};

pub mod loaders;

/// Label used for locally administered MACs with no vendor match.
pub const RANDOMIZED_LABEL: &str = "(randomized)";

/// Table files in merge order. Earlier files win on duplicate prefixes.
pub const TABLE_FILES: [(VendorSource, &str); 4] = [
    (VendorSource::IeeeCsv, "oui.csv"),
    (VendorSource::IeeeText, "oui.txt"),
    (VendorSource::Wireshark, "manuf"),
    (VendorSource::Nmap, "nmap-mac-prefixes"),
];

/// Per-file outcome of a directory load.
#[derive(Debug)]
pub struct SourceReport {
    pub source: VendorSource,
    pub path: PathBuf,
    /// Records that made it into the merged table (not shadowed by an earlier file).
    pub added: usize,
    pub skipped: usize,
    pub errors: Vec<VendorTableParseError>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub sources: Vec<SourceReport>,
    pub used_builtin: bool,
}

impl LoadReport {
    pub fn total_added(&self) -> usize {
        self.sources.iter().map(|s| s.added).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.sources.iter().map(|s| s.skipped).sum()
    }
}

pub struct OuiVendorResolver {
    table: HashMap<MacPrefix, VendorRecord>,
    builtin: Option<Oui>,
    report: LoadReport,
}

impl std::fmt::Debug for OuiVendorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OuiVendorResolver")
            .field("prefixes", &self.table.len())
            .field("builtin", &self.builtin.is_some())
            .finish()
    }
}

impl OuiVendorResolver {
    /// An empty resolver. Every lookup misses.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
            builtin: None,
            report: LoadReport::default(),
        }
    }

    /// Builds a resolver from in-memory records; the first record for a prefix wins.
    pub fn from_records(records: impl IntoIterator<Item = VendorRecord>) -> Self {
        let mut table = HashMap::new();
        for record in records {
            table.entry(record.prefix.clone()).or_insert(record);
        }
        Self {
            table,
            ..Self::empty()
        }
    }

    /// Loads every known table file present in `dir`. Files are parsed in
    /// parallel and merged in [`TABLE_FILES`] order.
    pub fn load_dir(dir: &Path) -> Self {
        let parsed: Vec<Option<(PathBuf, loaders::ParsedTable)>> = TABLE_FILES
            .par_iter()
            .map(|(source, file)| {
                let path = dir.join(file);
                match fs::read(&path) {
                    Ok(bytes) => {
                        let text = String::from_utf8_lossy(&bytes);
                        Some((path, loaders::parse_table(*source, &text)))
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!("Vendor table {} not present", path.display());
                        None
                    }
                    Err(e) => {
                        warn!("Could not read vendor table {}: {e}", path.display());
                        None
                    }
                }
            })
            .collect();

        let mut table: HashMap<MacPrefix, VendorRecord> = HashMap::new();
        let mut report = LoadReport::default();

        for ((source, _), loaded) in TABLE_FILES.iter().zip(parsed) {
            let Some((path, parsed)) = loaded else {
                continue;
            };
            let mut added = 0;
            for record in parsed.records {
                if let std::collections::hash_map::Entry::Vacant(slot) = table.entry(record.prefix.clone()) {
                    slot.insert(record);
                    added += 1;
                }
            }
            if parsed.skipped > 0 {
                debug!(
                    "{}: skipped {} malformed lines (first: {:?})",
                    path.display(),
                    parsed.skipped,
                    parsed.errors.first().map(ToString::to_string)
                );
            }
            report.sources.push(SourceReport {
                source: *source,
                path,
                added,
                skipped: parsed.skipped,
                errors: parsed.errors,
            });
        }

        info!(
            "Loaded {} vendor prefixes from {} ({} lines skipped)",
            table.len(),
            dir.display(),
            report.total_skipped()
        );

        Self {
            table,
            builtin: None,
            report,
        }
    }

    /// Attaches the database embedded in `mac_oui` when no table could be loaded.
    pub fn with_builtin_fallback(mut self) -> Self {
        if !self.table.is_empty() {
            return self;
        }
        match Oui::default() {
            Ok(db) => {
                warn!("No vendor tables found, using the built-in OUI database");
                self.builtin = Some(db);
                self.report.used_builtin = true;
            }
            Err(e) => warn!("No vendor tables and built-in database unavailable: {e}"),
        }
        self
    }

    /// Most specific match for a MAC in any textual form. Input that does not
    /// normalize to 12 hex digits never matches.
    pub fn lookup(&self, raw_mac: &str) -> Option<VendorRecord> {
        let key = mac_key(raw_mac)?;
        MacPrefix::LENGTHS
            .iter()
            .filter_map(|&len| MacPrefix::truncated(&key, len))
            .find_map(|prefix| self.table.get(&prefix).cloned())
            .or_else(|| self.lookup_builtin(&key))
    }

    fn lookup_builtin(&self, key: &str) -> Option<VendorRecord> {
        let db = self.builtin.as_ref()?;
        let colon_form = mac::parse_mac(key)?.to_string();
        match db.lookup_by_mac(&colon_form) {
            Ok(Some(entry)) => {
                let prefix = MacPrefix::truncated(key, 6)?;
                Some(VendorRecord::new(prefix, entry.company_name.clone(), VendorSource::Builtin))
            }
            _ => None,
        }
    }

    pub fn vendor_of(&self, mac: MacAddr) -> Option<String> {
        self.lookup(&mac::mac_to_key(mac)).map(|r| r.organization)
    }

    /// Vendor name, or [`RANDOMIZED_LABEL`] for an unmatched locally administered MAC.
    pub fn describe(&self, mac: MacAddr) -> Option<String> {
        self.vendor_of(mac).or_else(|| {
            mac::is_locally_administered(mac).then(|| RANDOMIZED_LABEL.to_string())
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && self.builtin.is_none()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
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
