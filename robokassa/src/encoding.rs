//! Base64url encoding for refund token segments.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as b64url;

/// A token segment holding base64url text without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64UrlSegment(pub String);

impl Base64UrlSegment {
    /// Encodes raw bytes into a segment.
    #[must_use]
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64url.encode(input.as_ref()))
    }

    /// Decodes the segment to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is not valid unpadded base64url.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64url.decode(&self.0)
    }

    /// Returns the encoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Base64UrlSegment {
    fn from(encoded: &str) -> Self {
        Self(encoded.to_owned())
    }
}

impl Display for Base64UrlSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_has_no_padding_or_unsafe_chars() {
        let segment = Base64UrlSegment::encode([0xfb_u8, 0xff, 0xfe, 0x01]);
        assert!(!segment.as_str().contains('='));
        assert!(!segment.as_str().contains('+'));
        assert!(!segment.as_str().contains('/'));
        assert_eq!(segment.decode().unwrap(), vec![0xfb, 0xff, 0xfe, 0x01]);
    }

    #[test]
    fn test_decode_rejects_padded_input() {
        assert!(Base64UrlSegment::from("YQ==").decode().is_err());
        assert_eq!(Base64UrlSegment::from("YQ").decode().unwrap(), b"a");
    }
}
