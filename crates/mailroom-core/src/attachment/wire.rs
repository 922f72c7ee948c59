//! Base64 wire encoding used by the Gmail API and MCP content blocks

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{Error, Result};

/// Standard alphabet, padding optional on decode
const TOLERANT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode wire-encoded bytes written in either the URL-safe or the standard
/// alphabet, with or without padding. ASCII whitespace is ignored.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let normalized: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return Err(Error::Decode("attachment data is empty".to_string()));
    }

    TOLERANT
        .decode(normalized.as_bytes())
        .map_err(|e| Error::Decode(e.to_string()))
}

/// Encode bytes for an MCP image/resource block (standard alphabet, padded)
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    // Exercises both 62/63 alphabet slots
    const SAMPLE: &[u8] = &[0xfb, 0xff, 0xbf, 0x00, 0x3e, 0x3f, 0x41];

    #[test]
    fn test_decodes_every_variant() {
        for encoded in [
            URL_SAFE_NO_PAD.encode(SAMPLE),
            URL_SAFE.encode(SAMPLE),
            STANDARD.encode(SAMPLE),
            base64::engine::general_purpose::STANDARD_NO_PAD.encode(SAMPLE),
        ] {
            assert_eq!(decode(&encoded).unwrap(), SAMPLE, "variant {encoded}");
        }
    }

    #[test]
    fn test_ignores_line_breaks() {
        let encoded = STANDARD.encode(b"hello world, this wraps");
        let wrapped = format!("{}\r\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode(&wrapped).unwrap(), b"hello world, this wraps");
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(matches!(decode(""), Err(Error::Decode(_))));
        assert!(matches!(decode("  \n"), Err(Error::Decode(_))));
        assert!(matches!(decode("abcde"), Err(Error::Decode(_))));
        assert!(matches!(decode("ab$d"), Err(Error::Decode(_))));
        assert!(matches!(decode("a=bc"), Err(Error::Decode(_))));
    }
}
