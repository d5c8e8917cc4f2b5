//! Cirrus CI webhook signature verification.
//!
//! Cirrus CI signs every webhook delivery with HMAC-SHA256 over the raw
//! request body, keyed with the secret token configured for the
//! repository or organization, and sends the hex digest in the
//! `X-Cirrus-Signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a presented signature was rejected.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The signature header is not valid hexadecimal.
    #[error("event signature verification failed: failed to hex-decode the signature {presented:?}: {source}")]
    Decode {
        presented: String,
        #[source]
        source: hex::FromHexError,
    },
    /// The decoded signature does not match the expected digest.
    #[error("event signature verification failed: signature is not valid")]
    Mismatch,
    /// The secret token cannot be used as an HMAC key.
    #[error("event signature verification failed: invalid secret token")]
    InvalidKey,
}

/// Verify a webhook body against the presented signature.
///
/// An empty `secret` disables verification entirely: every body is
/// accepted, whatever (if anything) was presented. Otherwise a missing
/// signature is treated as an empty one and therefore never matches.
///
/// The digest comparison goes through [`Mac::verify_slice`], which is
/// constant-time with respect to the position of the first differing byte.
pub fn verify(secret: &str, body: &[u8], presented: Option<&str>) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Ok(());
    }

    let presented = presented.unwrap_or_default();
    let presented_bytes = hex::decode(presented).map_err(|source| SignatureError::Decode {
        presented: presented.to_string(),
        source,
    })?;

    keyed_mac(secret, body)?
        .verify_slice(&presented_bytes)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compute the hex-encoded signature Cirrus CI would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mac = keyed_mac(secret, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn keyed_mac(secret: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err(SignatureError::InvalidKey),
    };
    mac.update(body);
    Ok(mac)
}

/// Check if signature verification is enabled for the configured secret.
pub fn is_signature_verification_enabled(secret: &str) -> bool {
    !secret.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "topsecret";
    const BODY: &[u8] = br#"{"action":"created","build":{"id":42}}"#;

    #[test]
    fn test_verify_valid_signature() {
        let signature = sign(SECRET, BODY).unwrap();
        assert!(verify(SECRET, BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn test_verify_uppercase_hex_signature() {
        let signature = sign(SECRET, BODY).unwrap().to_uppercase();
        assert!(verify(SECRET, BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn test_verify_tampered_body() {
        let signature = sign(SECRET, BODY).unwrap();
        assert!(matches!(
            verify(SECRET, br#"{"action":"deleted"}"#, Some(&signature)),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_verify_wrong_secret() {
        let signature = sign("another-secret", BODY).unwrap();
        assert!(matches!(
            verify(SECRET, BODY, Some(&signature)),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_verify_truncated_signature() {
        let signature = sign(SECRET, BODY).unwrap();
        assert!(matches!(
            verify(SECRET, BODY, Some(&signature[..32])),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_verify_malformed_hex() {
        assert!(matches!(
            verify(SECRET, BODY, Some("not-hex!")),
            Err(SignatureError::Decode { .. })
        ));
        assert!(matches!(
            verify(SECRET, BODY, Some("abc")),
            Err(SignatureError::Decode { .. })
        ));
    }

    #[test]
    fn test_verify_missing_signature_with_secret() {
        assert!(matches!(
            verify(SECRET, BODY, None),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_verify_without_secret_accepts_anything() {
        assert!(verify("", BODY, None).is_ok());
        assert!(verify("", BODY, Some("not-hex!")).is_ok());
        assert!(verify("", b"", Some("deadbeef")).is_ok());
    }

    #[test]
    fn test_decode_error_does_not_leak_secret() {
        let err = verify(SECRET, BODY, Some("zz")).unwrap_err();
        assert!(!err.to_string().contains(SECRET));
    }

    #[test]
    fn test_sign_is_hex_sha256() {
        let signature = sign(SECRET, BODY).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, sign(SECRET, BODY).unwrap());
    }

    #[test]
    fn test_sign_accepts_keys_of_any_length() {
        let long_key = "k".repeat(1024);
        let signature = sign(&long_key, BODY).unwrap();
        assert!(verify(&long_key, BODY, Some(&signature)).is_ok());

        assert_eq!(sign("", BODY).unwrap().len(), 64);
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(""));
        assert!(is_signature_verification_enabled("key123"));
    }
}
