//! Escaping of payload bytes.
//!
//! Any byte below [`UNSAFE_BYTE_LIMIT`] is replaced by [`UNSAFE_BYTE_MARKER`]
//! followed by the byte XORed with [`UNSAFE_BYTE_MASK`]. The marker itself falls in
//! that range, so it is always escaped and decoding never has to guess.
use super::{UNSAFE_BYTE_LIMIT, UNSAFE_BYTE_MARKER, UNSAFE_BYTE_MASK};

#[inline]
pub fn is_unsafe(b: u8) -> bool {
    b < UNSAFE_BYTE_LIMIT || b == UNSAFE_BYTE_MARKER
}

/// Append the escaped form of `raw` to `out`.
pub fn escape_into(raw: &[u8], out: &mut Vec<u8>) {
    out.reserve(raw.len());
    for &b in raw {
        if is_unsafe(b) {
            out.push(UNSAFE_BYTE_MARKER);
            out.push(b ^ UNSAFE_BYTE_MASK);
        } else {
            out.push(b);
        }
    }
}

pub fn escape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    escape_into(raw, &mut out);
    out
}

/// Append the unescaped form of `escaped` to `out`.
///
/// A marker at the very end of the input has nothing to unmask and is dropped.
pub fn unescape_into(escaped: &[u8], out: &mut Vec<u8>) {
    out.reserve(escaped.len());
    let mut shift = false;
    for &b in escaped {
        if shift {
            out.push(b ^ UNSAFE_BYTE_MASK);
            shift = false;
        } else if b == UNSAFE_BYTE_MARKER {
            shift = true;
        } else {
            out.push(b);
        }
    }
}

pub fn unescape(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    unescape_into(escaped, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PACKET_DELIMITER, TOKEN_DELIMITER};

    #[test]
    fn plain_bytes_pass_through() {
        let raw = b"a1@x.com 2014-01-01";
        assert_eq!(escape(raw), raw.to_vec());
        assert_eq!(unescape(raw), raw.to_vec());
    }

    #[test]
    fn control_bytes_are_masked() {
        assert_eq!(escape(b"a\tb\nc"), vec![b'a', 0x01, 0x49, b'b', 0x01, 0x4a, b'c']);
        assert_eq!(escape(&[0x00, 0x0f, 0x10]), vec![0x01, 0x40, 0x01, 0x4f, 0x10]);
    }

    #[test]
    fn marker_is_always_escaped() {
        assert_eq!(escape(&[UNSAFE_BYTE_MARKER]), vec![0x01, 0x41]);
        assert_eq!(unescape(&[0x01, 0x41]), vec![UNSAFE_BYTE_MARKER]);
    }

    #[test]
    fn escaped_output_never_contains_delimiters() {
        let raw: Vec<u8> = (0..=255).collect();
        let escaped = escape(&raw);
        assert!(!escaped.contains(&TOKEN_DELIMITER));
        assert!(!escaped.contains(&PACKET_DELIMITER));
    }

    #[test]
    fn round_trip_every_byte_value() {
        let raw: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).collect();
        let escaped = escape(&raw);
        assert_eq!(unescape(&escaped), raw);
        assert_eq!(escape(&unescape(&escaped)), escaped);

        for b in 0..=255u8 {
            let escaped = escape(&[b, b]);
            assert_eq!(unescape(&escaped), vec![b, b]);
        }
    }

    #[test]
    fn dangling_marker_is_dropped() {
        assert_eq!(unescape(&[b'a', UNSAFE_BYTE_MARKER]), b"a".to_vec());
    }
}
