//! Stripe webhook verification and event decoding.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! The signed payload is `"{t}.{raw body}"` under HMAC-SHA256 with the
//! endpoint secret.

use super::{GatewayError, GatewayResult};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Events older than this are rejected as possible replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Checks the header against the raw request body. `now` is a unix timestamp.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> GatewayResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| GatewayError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(GatewayError::InvalidSignature("missing v1 signature".into()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(GatewayError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = signatures
        .iter()
        .any(|sig| bool::from(sig.as_slice().ct_eq(expected.as_slice())));
    if matched {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature("no matching signature".into()))
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawData {
    object: serde_json::Value,
}

/// The webhook events the payment flow reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentSucceeded { payment_intent_id: String },
    PaymentFailed { payment_intent_id: String },
    InvoicePaid { subscription_id: String },
    ChargeRefunded { payment_intent_id: String, charge_id: String },
    Ignored { event_type: String },
}

fn string_field(object: &serde_json::Value, field: &str) -> GatewayResult<String> {
    object
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidPayload(format!("missing {}", field)))
}

impl WebhookEvent {
    /// Decodes an already verified payload. Returns the event id alongside.
    pub fn parse(payload: &[u8]) -> GatewayResult<(String, WebhookEvent)> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        let object = &raw.data.object;

        let event = match raw.event_type.as_str() {
            "payment_intent.succeeded" => WebhookEvent::PaymentSucceeded {
                payment_intent_id: string_field(object, "id")?,
            },
            "payment_intent.payment_failed" => WebhookEvent::PaymentFailed {
                payment_intent_id: string_field(object, "id")?,
            },
            "invoice.payment_succeeded" => WebhookEvent::InvoicePaid {
                subscription_id: string_field(object, "subscription")?,
            },
            "charge.refunded" => WebhookEvent::ChargeRefunded {
                payment_intent_id: string_field(object, "payment_intent")?,
                charge_id: string_field(object, "id")?,
            },
            _ => WebhookEvent::Ignored {
                event_type: raw.event_type.clone(),
            },
        };

        Ok((raw.id, event))
    }
}

/// Builds a valid header for `payload`. Used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> GatewayResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000).unwrap();
        assert!(verify_signature(BODY, &header, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn rejects_a_tampered_body() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_2"}}}"#;
        assert!(matches!(
            verify_signature(tampered, &header, SECRET, 1_700_000_000),
            Err(GatewayError::InvalidSignature(_))
        ));
    }

    #[test]
    fn rejects_stale_timestamps() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000).unwrap();
        let result = verify_signature(BODY, &header, SECRET, 1_700_000_000 + 301);
        assert!(matches!(result, Err(GatewayError::InvalidSignature(_))));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage_headers() {
        let header = sign_payload(BODY, "other", 1_700_000_000).unwrap();
        assert!(verify_signature(BODY, &header, SECRET, 1_700_000_000).is_err());
        assert!(verify_signature(BODY, "nonsense", SECRET, 1_700_000_000).is_err());
        assert!(verify_signature(BODY, "t=1700000000", SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn any_matching_v1_signature_is_enough() {
        let valid = sign_payload(BODY, SECRET, 1_700_000_000).unwrap();
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), v1);
        assert!(verify_signature(BODY, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn parses_the_events_the_payment_flow_handles() {
        let (id, event) = WebhookEvent::parse(BODY).unwrap();
        assert_eq!(id, "evt_1");
        assert_eq!(
            event,
            WebhookEvent::PaymentSucceeded {
                payment_intent_id: "pi_1".into()
            }
        );

        let refund = br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{"id":"ch_1","payment_intent":"pi_9"}}}"#;
        assert_eq!(
            WebhookEvent::parse(refund).unwrap().1,
            WebhookEvent::ChargeRefunded {
                payment_intent_id: "pi_9".into(),
                charge_id: "ch_1".into()
            }
        );

        let other = br#"{"id":"evt_3","type":"customer.created","data":{"object":{}}}"#;
        assert!(matches!(
            WebhookEvent::parse(other).unwrap().1,
            WebhookEvent::Ignored { .. }
        ));
    }
}
