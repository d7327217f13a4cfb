use std::fmt;

use serde::Serialize;

/// Table a vendor assignment was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorSource {
    IeeeCsv,
    IeeeText,
    Wireshark,
    Nmap,
    /// Database embedded in the binary, used when no table could be loaded.
    Builtin,
}

impl fmt::Display for VendorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VendorSource::IeeeCsv => "oui.csv",
            VendorSource::IeeeText => "oui.txt",
            VendorSource::Wireshark => "manuf",
            VendorSource::Nmap => "nmap-mac-prefixes",
            VendorSource::Builtin => "builtin",
        };
        f.write_str(name)
    }
}

/// Uppercase hex MAC prefix of one of the three IEEE block sizes:
/// 24 bits (MA-L), 28 bits (MA-M) or 36 bits (MA-S).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MacPrefix(String);

impl MacPrefix {
    pub const LENGTHS: [usize; 3] = [9, 7, 6];

    /// Accepts already-stripped hex of length 6, 7 or 9.
    pub fn new(hex: &str) -> Option<Self> {
        let hex = hex.to_ascii_uppercase();
        if !Self::LENGTHS.contains(&hex.len()) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(hex))
    }

    /// Takes the first `len` hex characters of a longer string.
    pub fn truncated(hex: &str, len: usize) -> Option<Self> {
        hex.get(..len).and_then(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bits(&self) -> u8 {
        (self.0.len() * 4) as u8
    }
}

impl fmt::Display for MacPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.bits())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorRecord {
    pub prefix: MacPrefix,
    pub organization: String,
    pub source: VendorSource,
}

impl VendorRecord {
    pub fn new(prefix: MacPrefix, organization: impl Into<String>, source: VendorSource) -> Self {
        Self {
            prefix,
            organization: organization.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_accepts_only_block_sizes() {
        assert_eq!(MacPrefix::new("fcbe75").unwrap().bits(), 24);
        assert_eq!(MacPrefix::new("70B3D51").unwrap().bits(), 28);
        assert_eq!(MacPrefix::new("0050C2ABC").unwrap().bits(), 36);
        assert!(MacPrefix::new("00112").is_none());
        assert!(MacPrefix::new("GG1122").is_none());
    }

    #[test]
    fn truncated_takes_leading_hex() {
        let prefix = MacPrefix::truncated("70B3D5123400", 7).unwrap();
        assert_eq!(prefix.as_str(), "70B3D51");
        assert!(MacPrefix::truncated("70B3", 6).is_none());
    }
}
