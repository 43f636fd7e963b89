//! Signature engine: hashes canonical strings and checks received signatures.

use std::fmt::{self, Display, Formatter};

use subtle::ConstantTimeEq;

use crate::algorithm::SignatureAlgorithm;
use crate::canonical::SignatureContext;
use crate::hash;

/// A produced signature: a lowercase hex digest or a compact refund token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureValue(String);

impl SignatureValue {
    /// Wraps an already computed signature.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the signature text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the value and returns the signature text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SignatureValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for SignatureValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs `context` with `secret` using `algorithm`.
#[must_use]
pub fn sign(
    context: &SignatureContext,
    algorithm: SignatureAlgorithm,
    secret: &str,
) -> SignatureValue {
    let canonical = context.canonical_string(secret);
    SignatureValue(hash::digest(algorithm, canonical.as_bytes()))
}

/// Recomputes the signature of `context` and compares it with `candidate`.
///
/// The comparison ignores ASCII case and runs in time independent of where
/// the two values differ.
#[must_use]
pub fn verify(
    context: &SignatureContext,
    algorithm: SignatureAlgorithm,
    secret: &str,
    candidate: &str,
) -> bool {
    let expected = sign(context, algorithm, secret);
    signatures_match(expected.as_str(), candidate)
}

/// Case-insensitive, fixed-time equality of two signature strings.
#[must_use]
pub fn signatures_match(expected: &str, candidate: &str) -> bool {
    let expected = expected.trim().to_ascii_lowercase();
    let candidate = candidate.trim().to_ascii_lowercase();
    if expected.is_empty() || candidate.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical;

    const NO_EXT: [(&str, &str); 0] = [];

    #[test]
    fn test_sign_matches_digest_of_canonical_string() {
        let ctx = canonical::payment_link("demo", "100.00", Some("1"), NO_EXT);
        let sig = sign(&ctx, SignatureAlgorithm::Md5, "pass1");
        assert_eq!(
            sig.as_str(),
            hash::digest(SignatureAlgorithm::Md5, b"demo:100.00:1:pass1")
        );
    }

    #[test]
    fn test_sign_then_verify_roundtrip() {
        for alg in SignatureAlgorithm::ALL {
            let ctx = canonical::payment_link("demo", "19.99", Some("77"), [("Shp_x", "1")]);
            let sig = sign(&ctx, alg, "pass1");
            assert!(verify(&ctx, alg, "pass1", sig.as_str()));
        }
    }

    #[test]
    fn test_changing_any_field_fails_verification() {
        let alg = SignatureAlgorithm::Sha256;
        let ctx = canonical::payment_link("demo", "19.99", Some("77"), NO_EXT);
        let sig = sign(&ctx, alg, "pass1");

        let variants = [
            canonical::payment_link("demo2", "19.99", Some("77"), NO_EXT),
            canonical::payment_link("demo", "19.98", Some("77"), NO_EXT),
            canonical::payment_link("demo", "19.99", Some("78"), NO_EXT),
            canonical::payment_link("demo", "19.99", None, NO_EXT),
        ];
        for other in &variants {
            assert!(!verify(other, alg, "pass1", sig.as_str()));
        }
        assert!(!verify(&ctx, alg, "pass2", sig.as_str()));
        assert!(!verify(&ctx, SignatureAlgorithm::Sha512, "pass1", sig.as_str()));
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let ctx = canonical::notification("100.00", "42", NO_EXT);
        let sig = sign(&ctx, SignatureAlgorithm::Md5, "password2");
        assert!(verify(
            &ctx,
            SignatureAlgorithm::Md5,
            "password2",
            &sig.as_str().to_ascii_uppercase()
        ));
    }

    #[test]
    fn test_signatures_match_rejects_empty_and_truncated() {
        assert!(!signatures_match("abc", ""));
        assert!(!signatures_match("", ""));
        assert!(!signatures_match("abcdef", "abcde"));
        assert!(signatures_match("ABCDEF", " abcdef "));
    }

    #[test]
    fn test_sha512_signature_is_128_lowercase_hex() {
        let ctx = canonical::admin_xml("shop", Some("50.25"), "12345");
        let sig = sign(&ctx, SignatureAlgorithm::Sha512, "secret1");
        assert_eq!(sig.as_str().len(), 128);
        assert_eq!(sig.as_str(), sig.as_str().to_ascii_lowercase());
        assert!(verify(&ctx, SignatureAlgorithm::Sha512, "secret1", sig.as_str()));
    }
}
