//! Digest functions behind each [`SignatureAlgorithm`].

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use crate::algorithm::SignatureAlgorithm;
use crate::error::RoboKassaError;

/// Hashes `data` and returns the raw digest bytes.
#[must_use]
pub fn digest_bytes(algorithm: SignatureAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Md5 => Md5::digest(data).to_vec(),
        SignatureAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        SignatureAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Hashes `data` and returns the lowercase hex digest.
#[must_use]
pub fn digest(algorithm: SignatureAlgorithm, data: &[u8]) -> String {
    hex::encode(digest_bytes(algorithm, data))
}

/// Hashes `data` with an algorithm given by name.
///
/// # Errors
///
/// Returns [`RoboKassaError::InvalidSignatureAlgorithm`] if `selector` is not
/// one of `MD5`, `SHA256`, `SHA512` (in any case).
pub fn digest_with(selector: &str, data: &[u8]) -> Result<String, RoboKassaError> {
    let algorithm: SignatureAlgorithm = selector.parse()?;
    Ok(digest(algorithm, data))
}
