use pnet::util::MacAddr;
use serde::Serializer;

/// Number of hex digits in a full 48-bit MAC address.
pub const MAC_HEX_LEN: usize = 12;

/// Strips separators (`:` `-` `.` and whitespace) and uppercases.
///
/// The result is *not* guaranteed to be a valid MAC; use [`mac_key`] when a
/// lookup key is needed.
pub fn normalize_mac(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalized 12-digit hex key. Anything but exactly 12 hex digits is `None`.
pub fn mac_key(raw: &str) -> Option<String> {
    let normalized = normalize_mac(raw);
    let valid =
        normalized.len() == MAC_HEX_LEN && normalized.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(normalized)
}

pub fn parse_mac(raw: &str) -> Option<MacAddr> {
    let key = mac_key(raw)?;
    let mut octets = [0u8; 6];
    for (idx, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&key[idx * 2..idx * 2 + 2], 16).ok()?;
    }
    Some(MacAddr::new(octets[0], octets[1], octets[2], octets[3], octets[4], octets[5]))
}

pub fn mac_to_key(mac: MacAddr) -> String {
    format!(
        "{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        mac.0, mac.1, mac.2, mac.3, mac.4, mac.5
    )
}

/// True when bit 1 of the first octet is set: the address was not assigned
/// by a vendor, typically a randomized/private address on phones.
pub fn is_locally_administered(mac: MacAddr) -> bool {
    mac.0 & 0x02 != 0
}

pub fn is_zero(mac: MacAddr) -> bool {
    mac == MacAddr::zero()
}

pub fn serialize_opt<S: Serializer>(mac: &Option<MacAddr>, serializer: S) -> Result<S::Ok, S::Error> {
    match mac {
        Some(mac) => serializer.collect_str(mac),
        None => serializer.serialize_none(),
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

    #[test]
    fn normalize_strips_every_separator_style() {
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "AABBCCDDEEFF");
        assert_eq!(normalize_mac(" aa-bb-cc-dd-ee-ff "), "AABBCCDDEEFF");
        assert_eq!(normalize_mac("aabb.ccdd.eeff"), "AABBCCDDEEFF");
    }

    #[test]
    fn mac_key_rejects_short_input() {
        assert_eq!(mac_key("aa:bb:cc"), None);
        assert_eq!(mac_key("zz:bb:cc:dd:ee:ff"), None);
        assert_eq!(mac_key("00:1b:63:84:45:e6").as_deref(), Some("001B638445E6"));
    }

    #[test]
    fn mac_key_rejects_overlong_input() {
        // EUI-64 and a MAC with trailing junk must not be cut down to a valid key.
        assert_eq!(mac_key("00:1b:63:ff:fe:84:45:e6"), None);
        assert_eq!(mac_key("00:1b:63:84:45:e6:00"), None);
        assert_eq!(parse_mac("001b638445e6ab"), None);
        assert_eq!(normalize_mac("00:1b:63:84:45:e6:00"), "001B638445E600");
    }

    #[test]
    fn parse_mac_round_trips_through_display() {
        let mac = parse_mac("00-1B-63-84-45-E6").unwrap();
        assert_eq!(mac.to_string(), "00:1b:63:84:45:e6");
        assert_eq!(mac_to_key(mac), "001B638445E6");
    }

    #[test]
    fn locally_administered_bit_detection() {
        assert!(is_locally_administered(parse_mac("02:00:00:00:00:01").unwrap()));
        assert!(is_locally_administered(parse_mac("da:a1:19:00:00:01").unwrap()));
        assert!(!is_locally_administered(parse_mac("00:1b:63:84:45:e6").unwrap()));
    }
}
