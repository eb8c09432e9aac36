pub(crate) fn split_descriptors(mut raw: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    std::iter::from_fn(move || match raw {
        [length, descriptor_type, ..] => {
            let length = *length as usize;
            if length > raw.len() {
                log::warn!(
                    "descriptor length {} exceeds available data ({} bytes)",
                    length,
                    raw.len()
                );
                return None;
            }
            if length < 2 {
                log::warn!("descriptor length {} is too short, stopping", length);
                return None;
            }
            let (desc_data, next) = raw.split_at(length);

            raw = next;

            Some((*descriptor_type, desc_data))
        }
        [] => None,
        _ => {
            log::warn!("invalid trailing descriptor bytes: {:x?}", raw);
            None
        }
    })
}

/// Formats a USB id the way it is displayed: `0x`-prefixed, 4 lowercase hex digits.
pub fn to_hex(id: u16) -> String {
    format!("{:#06x}", id)
}

/// Parses a hex USB id, with or without a `0x`/`0X` prefix.
pub fn parse_hex(s: &str) -> Option<u16> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_every_id() {
        for id in 0..=u16::MAX {
            assert_eq!(parse_hex(&to_hex(id)), Some(id));
        }
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(to_hex(0x46d), "0x046d");
        assert_eq!(to_hex(0), "0x0000");
        assert_eq!(to_hex(0xffff), "0xffff");
    }

    #[test]
    fn hex_parsing_variants() {
        assert_eq!(parse_hex("46d"), Some(0x46d));
        assert_eq!(parse_hex("0X046D"), Some(0x46d));
        assert_eq!(parse_hex(" 0x1908 "), Some(0x1908));
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex("zz"), None);
        assert_eq!(parse_hex("10000"), None);
        assert_eq!(parse_hex("+1"), None);
    }

    #[test]
    fn descriptors_are_split_by_length() {
        let raw = [3, 0x24, 0xaa, 2, 0x0b, 4, 0x05, 1, 2];
        let descs = split_descriptors(&raw).collect::<Vec<_>>();
        assert_eq!(
            descs,
            vec![
                (0x24, &[3u8, 0x24, 0xaa][..]),
                (0x0b, &[2u8, 0x0b][..]),
                (0x05, &[4u8, 0x05, 1, 2][..]),
            ]
        );
    }

    #[test]
    fn truncated_descriptor_stops_iteration() {
        let raw = [3, 0x24, 0xaa, 9, 0x0b];
        assert_eq!(split_descriptors(&raw).count(), 1);
    }
}
