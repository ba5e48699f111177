use std::borrow::Cow;

use anyhow::{bail, Result};
use encoding_rs::WINDOWS_1251;

const UNASSIGNED_1251: u8 = 0x98;

/// Decode one raw log line into text.
///
/// UTF-8 is tried first; lines that are not valid UTF-8 are decoded as
/// Windows-1251, which is what the legacy frontends wrote. Byte `0x98` is
/// unassigned in Windows-1251 and makes the whole line undecodable.
pub fn decode_line(raw: &[u8]) -> Result<Cow<'_, str>> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(Cow::Borrowed(text));
    }

    // the WHATWG table maps 0x98 to U+0098, the codepage leaves it undefined
    if let Some(pos) = raw.iter().position(|&b| b == UNASSIGNED_1251) {
        bail!("byte 0x98 at offset {pos} is neither UTF-8 nor Windows-1251");
    }

    let (text, _) = WINDOWS_1251.decode_without_bom_handling(raw);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_is_borrowed() {
        let line = "GET /api/v2/banner/25019354 HTTP/1.1".as_bytes();
        let decoded = decode_line(line).unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(decoded, "GET /api/v2/banner/25019354 HTTP/1.1");
    }

    #[test]
    fn test_utf8_cyrillic() {
        let decoded = decode_line("привет".as_bytes()).unwrap();
        assert_eq!(decoded, "привет");
    }

    #[test]
    fn test_windows_1251_fallback() {
        // "Привет" in Windows-1251
        let raw = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        let decoded = decode_line(&raw).unwrap();
        assert!(matches!(decoded, Cow::Owned(_)));
        assert_eq!(decoded, "Привет");
    }

    #[test]
    fn test_unassigned_byte_is_rejected() {
        let err = decode_line(&[b'a', 0x98, 0xFF]).unwrap_err();
        assert!(err.to_string().contains("0x98"));
    }

    #[test]
    fn test_every_other_high_byte_decodes() {
        for b in (0x80..=0xFFu8).filter(|&b| b != 0x98) {
            assert!(decode_line(&[b'a', b, 0xFF]).is_ok(), "byte {b:#x}");
        }
    }
}
