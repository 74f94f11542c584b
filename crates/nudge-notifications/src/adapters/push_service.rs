use async_trait::async_trait;
use reqwest::Client;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessage,
    WebPushMessageBuilder,
};

use super::PushSender;
use crate::error::NotificationError;
use crate::types::PushSubscription;
use crate::vapid::VapidCredentials;

/// Default message time-to-live at the push service
pub const DEFAULT_TTL_SECONDS: u32 = 86_400;

/// Sends RFC 8291 encrypted messages signed with VAPID.
///
/// `web-push` handles encryption and signing; the HTTP request itself goes
/// through a shared `reqwest::Client`.
pub struct WebPushAdapter {
    http_client: Client,
    ttl: u32,
}

impl WebPushAdapter {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL_SECONDS)
    }

    pub fn with_ttl(ttl: u32) -> Self {
        Self {
            http_client: Client::new(),
            ttl,
        }
    }

    fn build_message(
        &self,
        vapid: &VapidCredentials,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<WebPushMessage, NotificationError> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature = VapidSignatureBuilder::from_base64(&vapid.private_key, &info)
            .map_err(|e| NotificationError::NotConfigured(format!("Invalid VAPID key: {e}")))?;
        signature.add_claim("sub", vapid.subject());
        let signature = signature
            .build()
            .map_err(|e| NotificationError::DeliveryFailed(format!("VAPID signing failed: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl);

        builder
            .build()
            .map_err(|e| NotificationError::DeliveryFailed(format!("Invalid push message: {e}")))
    }
}

impl Default for WebPushAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushSender for WebPushAdapter {
    async fn send(
        &self,
        vapid: &VapidCredentials,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), NotificationError> {
        let message = self.build_message(vapid, subscription, payload)?;

        let mut request = self
            .http_client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 | 410 => Err(NotificationError::DeliveryFailed(format!(
                "Subscription expired (HTTP {status})"
            ))),
            _ => Err(NotificationError::DeliveryFailed(format!(
                "Push service rejected message (HTTP {status}): {body}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vapid::VapidKeys;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL};
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::rand_core::OsRng;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vapid() -> VapidCredentials {
        let keys = VapidKeys::generate();
        VapidCredentials {
            email: "ops@example.com".into(),
            public_key: keys.public_key,
            private_key: keys.private_key,
        }
    }

    fn browser_subscription(endpoint: String) -> PushSubscription {
        let browser_key = SigningKey::random(&mut OsRng);
        let p256dh = BASE64URL.encode(browser_key.verifying_key().to_encoded_point(false).as_bytes());
        let auth = BASE64URL.encode([7u8; 16]);
        PushSubscription::new(endpoint, p256dh, auth)
    }

    #[tokio::test]
    async fn test_send_posts_encrypted_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push/abc"))
            .and(header("Content-Encoding", "aes128gcm"))
            .and(header("TTL", "60"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = WebPushAdapter::with_ttl(60);
        let subscription = browser_subscription(format!("{}/push/abc", server.uri()));
        adapter
            .send(&vapid(), &subscription, br#"{"title":"t","body":"b"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_gone_subscription_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let adapter = WebPushAdapter::new();
        let subscription = browser_subscription(format!("{}/push/gone", server.uri()));
        let result = adapter.send(&vapid(), &subscription, b"{}").await;
        assert!(matches!(result, Err(NotificationError::DeliveryFailed(msg)) if msg.contains("expired")));
    }

    #[tokio::test]
    async fn test_malformed_keys_fail_without_request() {
        let adapter = WebPushAdapter::new();
        let subscription = PushSubscription::new("http://127.0.0.1:9/push", "", "");
        let result = adapter.send(&vapid(), &subscription, b"{}").await;
        assert!(result.is_err());
    }
}
