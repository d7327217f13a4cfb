//! Tolerant line parsers, one per vendor table format.
//!
//! Each parser returns `Ok(None)` for lines that carry no assignment (comments,
//! headers, continuation lines) and an error only for lines that look like an
//! assignment but cannot be read.

use lanprobe_common::error::VendorTableParseError;
use lanprobe_common::models::{MacPrefix, VendorRecord, VendorSource};
use lanprobe_common::network::mac::normalize_mac;

/// Errors kept per source for diagnostics; the rest are only counted.
pub const MAX_KEPT_ERRORS: usize = 5;

#[derive(Debug, Default)]
pub struct ParsedTable {
    pub records: Vec<VendorRecord>,
    pub skipped: usize,
    pub errors: Vec<VendorTableParseError>,
}

pub fn parse_table(source: VendorSource, text: &str) -> ParsedTable {
    let name = source.to_string();
    let mut table = ParsedTable::default();

    for (idx, line) in text.lines().enumerate() {
        let parsed = match source {
            VendorSource::IeeeCsv => parse_csv_line(line),
            VendorSource::IeeeText => parse_text_line(line),
            VendorSource::Wireshark => parse_manuf_line(line),
            VendorSource::Nmap => parse_nmap_line(line),
            VendorSource::Builtin => Ok(None),
        };
        match parsed {
            Ok(Some((prefix, org))) => table.records.push(VendorRecord::new(prefix, org, source)),
            Ok(None) => {}
            Err(reason) => {
                table.skipped += 1;
                if table.errors.len() < MAX_KEPT_ERRORS {
                    table.errors.push(VendorTableParseError::new(&name, idx + 1, reason));
                }
            }
        }
    }
    table
}

type LineResult = Result<Option<(MacPrefix, String)>, String>;

fn organization(raw: &str) -> Result<String, String> {
    let org = raw.trim().trim_matches('"').trim();
    if org.is_empty() {
        return Err("empty organization".into());
    }
    Ok(org.to_string())
}

fn prefix_of(hex: &str, len: usize) -> Result<MacPrefix, String> {
    let hex = normalize_mac(hex);
    if hex.len() < len {
        return Err(format!("prefix '{hex}' shorter than {len} digits"));
    }
    MacPrefix::truncated(&hex, len).ok_or_else(|| format!("prefix '{hex}' is not hex"))
}

/// Splits one CSV record, honouring double quotes.
fn split_csv(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// `Registry,Assignment,Organization Name,Organization Address`
fn parse_csv_line(line: &str) -> LineResult {
    let line = line.trim();
    if line.is_empty() || line.starts_with("Registry,") {
        return Ok(None);
    }
    let fields = split_csv(line);
    if fields.len() < 3 {
        return Err(format!("expected at least 3 fields, got {}", fields.len()));
    }
    let len = match fields[0].trim() {
        "MA-S" => 9,
        "MA-M" => 7,
        _ => 6,
    };
    Ok(Some((prefix_of(&fields[1], len)?, organization(&fields[2])?)))
}

/// `00-22-72   (hex)\t\tAmerican Micro-Fuel Device Corp.`
fn parse_text_line(line: &str) -> LineResult {
    let Some((prefix, org)) = line.split_once("(hex)") else {
        return Ok(None);
    };
    Ok(Some((prefix_of(prefix.trim(), 6)?, organization(org)?)))
}

/// `00:1B:C5:00:00:00/36<TAB>Short<TAB>Long name`
fn parse_manuf_line(line: &str) -> LineResult {
    let line = line.trim_end();
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }
    let mut columns = line.split('\t').map(str::trim).filter(|c| !c.is_empty());
    let Some(address) = columns.next() else {
        return Ok(None);
    };
    let short = columns.next().ok_or("missing vendor name")?;
    let name = columns.next().unwrap_or(short);
    let name = name.split('#').next().unwrap_or(name);

    let (hex, len) = match address.split_once('/') {
        Some((hex, bits)) => {
            let bits: usize = bits.parse().map_err(|_| format!("bad mask '/{bits}'"))?;
            match bits {
                24 => (hex, 6),
                28 => (hex, 7),
                36 => (hex, 9),
                other => return Err(format!("unsupported mask /{other}")),
            }
        }
        None => (address, 6),
    };
    Ok(Some((prefix_of(hex, len)?, organization(name)?)))
}

/// `FCBE75 Organization`
fn parse_nmap_line(line: &str) -> LineResult {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (hex, org) = line
        .split_once(char::is_whitespace)
        .ok_or("missing organization")?;
    let prefix = MacPrefix::new(hex).ok_or_else(|| format!("bad prefix '{hex}'"))?;
    Ok(Some((prefix, organization(org)?)))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
