//! # Request and Webhook Signatures
//!
//! ## Security Model
//!
//! Outbound requests and inbound webhooks are authenticated with
//! HMAC-SHA256 keyed by a shared secret and rendered as lowercase hex.
//!
//! - Requests sign `timestamp + "." + body` with the merchant API key, so a
//!   captured body cannot be replayed under a different timestamp.
//! - Webhooks sign the raw body with the webhook secret.
//! - Verification compares MACs in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, parts: &[&[u8]]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// Signature for an outbound request: `hex(HMAC(secret, timestamp + "." + payload))`.
pub fn sign(payload: &str, timestamp: &str, secret: &str) -> String {
    hex::encode(mac(
        secret,
        &[timestamp.as_bytes(), b".", payload.as_bytes()],
    ))
}

/// Signature over a raw payload: `hex(HMAC(secret, payload))`. Webhook form.
pub fn sign_payload(payload: &str, secret: &str) -> String {
    hex::encode(mac(secret, &[payload.as_bytes()]))
}

/// Verify a webhook signature over `payload`.
///
/// Accepts upper- or lowercase hex. Malformed hex is simply a mismatch.
pub fn verify(signature: &str, payload: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let expected = mac(secret, &[payload.as_bytes()]);
    expected.ct_eq(&provided).into()
}

/// Signing helper bound to one secret.
#[derive(Clone)]
pub struct SignatureService {
    secret: String,
}

impl SignatureService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a request body at `timestamp`.
    pub fn sign(&self, payload: &str, timestamp: &str) -> String {
        sign(payload, timestamp, &self.secret)
    }

    /// Sign a raw payload.
    pub fn sign_payload(&self, payload: &str) -> String {
        sign_payload(payload, &self.secret)
    }

    /// Verify a raw-payload signature.
    pub fn verify(&self, signature: &str, payload: &str) -> bool {
        verify(signature, payload, &self.secret)
    }
}

impl std::fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureService")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign_payload("what do ya want for nothing?", "Jefe");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_request_signature_binds_timestamp() {
        let body = r#"{"amount":"10.00000000"}"#;
        let a = sign(body, "1700000000000", "key");
        assert_eq!(a, sign(body, "1700000000000", "key"));
        assert_eq!(a, sign_payload(&format!("1700000000000.{}", body), "key"));
        assert_ne!(a, sign(body, "1700000000001", "key"));
        assert_ne!(a, sign(body, "1700000000000", "other"));
        assert_ne!(a, sign(r#"{"amount":"10.00000001"}"#, "1700000000000", "key"));
    }

    #[test]
    fn test_verify_round_trip() {
        let payload = r#"{"type":"payment.completed"}"#;
        let sig = sign_payload(payload, "whsec");
        assert!(verify(&sig, payload, "whsec"));
        assert!(verify(&sig.to_uppercase(), payload, "whsec"));
        assert!(!verify(&sig, payload, "other"));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let payload = r#"{"type":"payment.completed"}"#;
        let sig = sign_payload(payload, "whsec");
        assert!(!verify(&sig, r#"{"type":"payment.cancelled"}"#, "whsec"));
        assert!(!verify(&sig[..62], payload, "whsec"));
        assert!(!verify("not-hex", payload, "whsec"));
        assert!(!verify("", payload, "whsec"));
    }

    #[test]
    fn test_any_key_length_signs() {
        let long_key = "k".repeat(200);
        for key in ["", "k", long_key.as_str()] {
            let sig = sign_payload("payload", key);
            assert_eq!(sig.len(), 64);
            assert!(verify(&sig, "payload", key));
        }
    }

    #[test]
    fn test_service_delegates() {
        let svc = SignatureService::new("k");
        assert_eq!(svc.sign("p", "1"), sign("p", "1", "k"));
        assert!(svc.verify(&svc.sign_payload("p"), "p"));
        assert!(format!("{:?}", svc).contains("<redacted>"));
    }
}
