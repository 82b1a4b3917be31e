/// Webhook signature scheme
///
/// Signed requests carry a header of the form
///
/// ```text
/// Tenure-Signature: t=1767225600,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
/// ```
///
/// where `v1` is the hex HMAC-SHA256 of `"{t}.{raw body}"` under the shared
/// secret. Several `v1` entries may be present during secret rotation; any
/// one matching is enough.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "tenure-signature";

/// Maximum accepted clock difference, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Header is not `t=...,v1=...`
    #[error("Malformed signature header")]
    Malformed,

    /// Timestamp too far from now
    #[error("Signature timestamp outside tolerance")]
    Expired,

    /// No `v1` entry matches the payload
    #[error("Signature mismatch")]
    Mismatch,
}

fn mac_for(secret: &str, timestamp: i64, body: &[u8]) -> Hmac<Sha256> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Builds the header value for `body` signed at `timestamp`
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let signature = hex::encode(mac_for(secret, timestamp, body).finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

/// Verifies a signature header against the raw request body
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=').ok_or(SignatureError::Malformed)?;
        match key {
            "t" => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (now.timestamp() - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac_for(secret, timestamp, body).verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test_secret";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, now().timestamp(), body);

        assert!(header.starts_with(&format!("t={},v1=", now().timestamp())));
        assert_eq!(verify_signature(SECRET, &header, body, 300, now()), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign(SECRET, now().timestamp(), b"original");
        assert_eq!(
            verify_signature(SECRET, &header, b"tampered", 300, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign("another_secret", now().timestamp(), b"body");
        assert_eq!(
            verify_signature(SECRET, &header, b"body", 300, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_tolerance() {
        let signed_at = now().timestamp() - 301;
        let header = sign(SECRET, signed_at, b"body");
        assert_eq!(
            verify_signature(SECRET, &header, b"body", 300, now()),
            Err(SignatureError::Expired)
        );

        let header = sign(SECRET, now().timestamp() - 300, b"body");
        assert_eq!(verify_signature(SECRET, &header, b"body", 300, now()), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=deadbeef", "t=1767225600"] {
            assert_eq!(
                verify_signature(SECRET, header, b"body", 300, now()),
                Err(SignatureError::Malformed),
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn test_rotation_any_signature_matches() {
        let ts = now().timestamp();
        let good = sign(SECRET, ts, b"body");
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", ts, "00".repeat(32), good_sig);

        assert_eq!(verify_signature(SECRET, &header, b"body", 300, now()), Ok(()));
    }

    #[test]
    fn test_non_hex_signature_is_mismatch() {
        let header = format!("t={},v1=not-hex", now().timestamp());
        assert_eq!(
            verify_signature(SECRET, &header, b"body", 300, now()),
            Err(SignatureError::Mismatch)
        );
    }
}
