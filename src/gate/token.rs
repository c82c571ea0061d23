use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Field separator of the signed message. Issuer and verifier must agree on it byte for byte.
pub const TOKEN_SEPARATOR: char = '|';

/// Compute the token for a credential: lowercase hex of
/// `SHA-256(serial | issue_time | secret)` over UTF-8 bytes.
pub fn compute_token(serial: &str, issue_time: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serial.as_bytes());
    hasher.update([TOKEN_SEPARATOR as u8]);
    hasher.update(issue_time.as_bytes());
    hasher.update([TOKEN_SEPARATOR as u8]);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a presented token against the one derived from the credential fields.
///
/// The comparison runs in constant time over the expected length, so a partially
/// matching token takes as long to reject as a completely wrong one.
pub fn authenticate(serial: &str, issue_time: &str, presented: &str, secret: &str) -> bool {
    let expected = compute_token(serial, issue_time, secret);
    bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
}
