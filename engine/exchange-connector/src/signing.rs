//! HMAC request signing shared by the venue adapters

use crate::error::{ExchangeError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 of `message` keyed by `secret`
pub fn hmac_sha512_hex(secret: &[u8], message: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha512::new_from_slice(secret).map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Millisecond nonce for query-signed venues
pub fn nonce_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Nanosecond nonce for body-signed venues
pub fn nonce_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_else(|| nonce_millis() * 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha512_known_vector() {
        // RFC 4231 test case 2
        let sig = hmac_sha512_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_signature_is_hex_of_expected_length() {
        let sig = hmac_sha512_hex(b"secret", b"https://example.com/?a=1").unwrap();
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_nonces_increase() {
        let a = nonce_nanos();
        let b = nonce_nanos();
        assert!(b >= a);
        assert!(nonce_millis() > 1_500_000_000_000);
    }
}
