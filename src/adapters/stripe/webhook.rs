//! Stripe webhook authentication.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{t}.{payload}"` with constant-time comparison
//! - Events older than five minutes, or too far in the future, are rejected

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::order::OrderError;
use crate::domain::reconciliation::stripe::StripeEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps.
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,
    #[error("Missing timestamp (t=) in signature")]
    MissingTimestamp,
    #[error("Missing v1 signature in header")]
    MissingV1Signature,
    #[error("Invalid timestamp format")]
    InvalidTimestamp,
    #[error("Invalid signature format (not valid hex)")]
    InvalidSignatureFormat,
}

/// Parsed `t=<timestamp>,v1=<signature>[,v1=...]` header.
///
/// Stripe sends one `v1` entry per active signing secret, so all of them
/// are kept.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures
                        .push(hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?);
                }
                _ => {}
            }
        }

        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureParseError::MissingTimestamp)?,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

/// Verifies `Stripe-Signature` and parses the event.
#[derive(Clone)]
pub struct StripeWebhookVerifier {
    secret: Option<SecretString>,
}

impl StripeWebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret: Some(secret) }
    }

    /// A verifier that rejects every event, for deployments without Stripe.
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    /// Verifies against the current wall clock.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<StripeEvent, OrderError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<StripeEvent, OrderError> {
        let header = SignatureHeader::parse(header).map_err(|e| OrderError::webhook_auth(e.to_string()))?;

        let age = now.saturating_sub(header.timestamp);
        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "Stripe webhook too old"
            );
            return Err(OrderError::webhook_auth(format!("event too old ({} seconds)", age)));
        }
        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(event_timestamp = header.timestamp, "Stripe webhook from the future");
            return Err(OrderError::webhook_auth("event timestamp in future"));
        }

        let expected = self.sign(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|sig| expected.as_slice().ct_eq(sig.as_slice()).unwrap_u8() == 1);
        if !matched {
            tracing::warn!("Invalid Stripe webhook signature");
            return Err(OrderError::webhook_auth("invalid signature"));
        }

        serde_json::from_slice(payload).map_err(|e| OrderError::malformed(format!("stripe event: {}", e)))
    }

    fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, OrderError> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| OrderError::webhook_auth("stripe webhooks disabled"))?;
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| OrderError::webhook_auth(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
pub(crate) fn sign_for_test(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    let sig: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("t={},v1={}", timestamp, sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_719_792_001;

    fn verifier() -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(SecretString::new(SECRET.to_string()))
    }

    fn payload() -> Vec<u8> {
        br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#.to_vec()
    }

    // ════════════════════════════════════════════════════════════════
    // Header parsing
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn parse_keeps_every_v1_signature() {
        let header = SignatureHeader::parse("t=1,v1=abcd,v0=ffff,v1=0102").unwrap();
        assert_eq!(header.timestamp, 1);
        assert_eq!(header.v1_signatures, vec![vec![0xab, 0xcd], vec![0x01, 0x02]]);
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert_eq!(SignatureHeader::parse("").unwrap_err(), SignatureParseError::MissingHeader);
        assert_eq!(SignatureHeader::parse("v1=abcd").unwrap_err(), SignatureParseError::MissingTimestamp);
        assert_eq!(SignatureHeader::parse("t=1").unwrap_err(), SignatureParseError::MissingV1Signature);
        assert_eq!(SignatureHeader::parse("t=x,v1=ab").unwrap_err(), SignatureParseError::InvalidTimestamp);
        assert_eq!(
            SignatureHeader::parse("t=1,v1=abc").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
    }

    // ════════════════════════════════════════════════════════════════
    // Verification
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_yields_event() {
        let header = sign_for_test(SECRET, NOW, &payload());
        let event = verifier().verify_at(&payload(), &header, NOW + 10).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "invoice.paid");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign_for_test("whsec_other", NOW, &payload());
        let err = verifier().verify_at(&payload(), &header, NOW).unwrap_err();
        assert!(matches!(err, OrderError::WebhookAuth(_)));
    }

    #[test]
    fn stale_event_is_rejected() {
        let header = sign_for_test(SECRET, NOW, &payload());
        let err = verifier().verify_at(&payload(), &header, NOW + 301).unwrap_err();
        assert!(matches!(err, OrderError::WebhookAuth(_)));
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        let header = format!("t={},v1=00", i64::MIN);
        let err = verifier().verify_at(&payload(), &header, NOW).unwrap_err();
        assert!(matches!(err, OrderError::WebhookAuth(_)));

        let header = format!("t={},v1=00", i64::MAX);
        let err = verifier().verify_at(&payload(), &header, NOW).unwrap_err();
        assert!(matches!(err, OrderError::WebhookAuth(_)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign_for_test(SECRET, NOW, &payload());
        let tampered = br#"{"id":"evt_2","type":"invoice.paid","data":{"object":{}}}"#;
        assert!(verifier().verify_at(tampered, &header, NOW).is_err());
    }

    #[test]
    fn disabled_verifier_rejects_signed_events() {
        let header = sign_for_test(SECRET, NOW, &payload());
        let err = StripeWebhookVerifier::disabled()
            .verify_at(&payload(), &header, NOW)
            .unwrap_err();
        assert!(matches!(err, OrderError::WebhookAuth(_)));
    }
}
