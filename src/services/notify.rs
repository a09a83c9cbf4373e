use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::db::queries;
use crate::models::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Created,
    Rescheduled,
    Cancelled,
}

impl BookingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEvent::Created => "booking.created",
            BookingEvent::Rescheduled => "booking.rescheduled",
            BookingEvent::Cancelled => "booking.cancelled",
        }
    }
}

/// Outbound side channel for booking lifecycle events. Delivery failures are
/// the caller's problem to log; they never fail the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_event(&self, event: BookingEvent, booking: &Booking) -> anyhow::Result<()>;
}

/// POSTs each event as JSON to a configured URL, signing the exact body
/// bytes with HMAC-SHA1 (base64) in the X-Slotbook-Signature header.
pub struct WebhookNotifier {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn booking_event(&self, event: BookingEvent, booking: &Booking) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "event": event.as_str(),
            "booking": {
                "id": booking.id,
                "provider_id": booking.provider_id,
                "service_id": booking.service_id,
                "start_time": queries::format_datetime(booking.start_time),
                "end_time": queries::format_datetime(booking.end_time),
                "status": booking.status.as_str(),
            },
        });
        let body = serde_json::to_string(&payload)?;
        let signature = sign_payload(&self.secret, &body);

        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Slotbook-Signature", signature)
            .body(body)
            .send()
            .await
            .context("failed to deliver booking webhook")?
            .error_for_status()
            .context("booking webhook returned error")?;

        Ok(())
    }
}

/// Used when no webhook URL is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn booking_event(&self, _event: BookingEvent, _booking: &Booking) -> anyhow::Result<()> {
        Ok(())
    }
}

fn sign_payload(secret: &str, body: &str) -> String {
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(BookingEvent::Created.as_str(), "booking.created");
        assert_eq!(BookingEvent::Rescheduled.as_str(), "booking.rescheduled");
        assert_eq!(BookingEvent::Cancelled.as_str(), "booking.cancelled");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = sign_payload("secret", r#"{"event":"booking.created"}"#);
        let b = sign_payload("secret", r#"{"event":"booking.created"}"#);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_signature_varies_with_secret_and_body() {
        let base = sign_payload("secret", "payload");
        assert_ne!(base, sign_payload("other-secret", "payload"));
        assert_ne!(base, sign_payload("secret", "payload2"));
    }

    #[test]
    fn test_signature_is_base64_of_sha1_digest() {
        let sig = sign_payload("secret", "payload");
        let raw = base64::engine::general_purpose::STANDARD
            .decode(sig)
            .unwrap();
        assert_eq!(raw.len(), 20);
    }
}
