//! Heartbeat wire protocol
//!
//! Devices send one UTF-8 line per datagram:
//!
//! ```text
//! HEARTBEAT:<name>,IP:<address>,<freeform-suffix>
//! ```
//!
//! Only the first two comma-separated fields are interpreted. When the
//! `IP:` field is missing or does not hold an IP address, the UDP source
//! address identifies the device instead.

use crate::constants::{ADDRESS_FIELD_PREFIX, HEARTBEAT_PREFIX};
use std::net::IpAddr;

/// A decoded heartbeat announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub name: String,
    pub address: IpAddr,
}

/// Why a datagram was not accepted as a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not valid UTF-8
    NotUtf8,
    /// Does not start with `HEARTBEAT:`; not meant for us
    NotHeartbeat,
    /// Prefix present but the device name is empty
    MissingName,
}

/// Decode a raw datagram received from `source`
pub fn decode_datagram(data: &[u8], source: IpAddr) -> Result<Heartbeat, Rejection> {
    let text = std::str::from_utf8(data).map_err(|_| Rejection::NotUtf8)?;
    parse_heartbeat(text.trim(), source)
}

/// Parse an already-decoded heartbeat line
///
/// The prefix check is exact and case-sensitive; fields are trimmed.
pub fn parse_heartbeat(line: &str, source: IpAddr) -> Result<Heartbeat, Rejection> {
    let content = line
        .strip_prefix(HEARTBEAT_PREFIX)
        .ok_or(Rejection::NotHeartbeat)?;

    let mut fields = content.split(',');

    let name = fields.next().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(Rejection::MissingName);
    }

    let address = fields
        .next()
        .and_then(parse_address_field)
        .unwrap_or(source);

    Ok(Heartbeat {
        name: name.to_string(),
        address,
    })
}

/// Extract the address from an `IP:<address>` field
fn parse_address_field(field: &str) -> Option<IpAddr> {
    field
        .trim()
        .strip_prefix(ADDRESS_FIELD_PREFIX)?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_explicit_address_wins_over_source() {
        let hb = parse_heartbeat("HEARTBEAT:Cube43,IP:192.168.0.43,HELLO", ip("192.168.0.99"))
            .unwrap();

        assert_eq!(hb.name, "Cube43");
        assert_eq!(hb.address, ip("192.168.0.43"));
    }

    #[test]
    fn test_missing_address_field_uses_source() {
        let hb = parse_heartbeat("HEARTBEAT:Cube43,HELLO", ip("10.0.0.5")).unwrap();

        assert_eq!(hb.name, "Cube43");
        assert_eq!(hb.address, ip("10.0.0.5"));
    }

    #[test]
    fn test_name_only_uses_source() {
        let hb = parse_heartbeat("HEARTBEAT:Cube43", ip("10.0.0.5")).unwrap();

        assert_eq!(hb.name, "Cube43");
        assert_eq!(hb.address, ip("10.0.0.5"));
    }

    #[test]
    fn test_malformed_address_uses_source() {
        let hb = parse_heartbeat("HEARTBEAT:Cube43,IP:not-an-ip,HELLO", ip("10.0.0.5")).unwrap();
        assert_eq!(hb.address, ip("10.0.0.5"));

        let hb = parse_heartbeat("HEARTBEAT:Cube43,IP:,HELLO", ip("10.0.0.5")).unwrap();
        assert_eq!(hb.address, ip("10.0.0.5"));
    }

    #[test]
    fn test_fields_are_trimmed() {
        let hb = parse_heartbeat("HEARTBEAT: Cube7 , IP: 192.168.0.7 ,x", ip("10.0.0.5")).unwrap();

        assert_eq!(hb.name, "Cube7");
        assert_eq!(hb.address, ip("192.168.0.7"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let hb = parse_heartbeat("HEARTBEAT:Cube1,IP:192.168.0.1,HELLO,IP:1.2.3.4,more", ip("10.0.0.5"))
            .unwrap();
        assert_eq!(hb.address, ip("192.168.0.1"));
    }

    #[test]
    fn test_ipv6_address_field() {
        let hb = parse_heartbeat("HEARTBEAT:Cube6,IP:fe80::1", ip("10.0.0.5")).unwrap();
        assert_eq!(hb.address, ip("fe80::1"));
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert_eq!(
            parse_heartbeat("heartbeat:Cube43,IP:192.168.0.43", ip("10.0.0.5")),
            Err(Rejection::NotHeartbeat)
        );
        assert_eq!(
            parse_heartbeat("Val:22046 Thr:21649 Stt:0", ip("10.0.0.5")),
            Err(Rejection::NotHeartbeat)
        );
        assert_eq!(parse_heartbeat("", ip("10.0.0.5")), Err(Rejection::NotHeartbeat));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            parse_heartbeat("HEARTBEAT:,IP:192.168.0.43", ip("10.0.0.5")),
            Err(Rejection::MissingName)
        );
        assert_eq!(
            parse_heartbeat("HEARTBEAT:", ip("10.0.0.5")),
            Err(Rejection::MissingName)
        );
    }

    #[test]
    fn test_decode_datagram_trims_line() {
        let hb = decode_datagram(b"  HEARTBEAT:Cube43,IP:192.168.0.43,HELLO\r\n", ip("10.0.0.5"))
            .unwrap();
        assert_eq!(hb.name, "Cube43");
    }

    #[test]
    fn test_decode_datagram_invalid_utf8() {
        assert_eq!(
            decode_datagram(&[0x48, 0xFF, 0xFE, 0xFD], ip("10.0.0.5")),
            Err(Rejection::NotUtf8)
        );
    }

    proptest! {
        #[test]
        fn prop_non_prefixed_lines_rejected(line in "[^H].*") {
            prop_assert_eq!(
                parse_heartbeat(&line, ip("10.0.0.5")),
                Err(Rejection::NotHeartbeat)
            );
        }

        #[test]
        fn prop_name_and_address_extracted(
            name in "[A-Za-z0-9_-]{1,16}",
            a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255,
            suffix in "[A-Z]{0,8}",
        ) {
            let line = format!("HEARTBEAT:{},IP:{}.{}.{}.{},{}", name, a, b, c, d, suffix);
            let hb = parse_heartbeat(&line, ip("10.0.0.5")).unwrap();
            prop_assert_eq!(hb.name, name);
            prop_assert_eq!(hb.address, ip(&format!("{}.{}.{}.{}", a, b, c, d)));
        }
    }
}
