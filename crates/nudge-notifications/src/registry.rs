//! In-memory push subscription registry with self-healing fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::RwLock;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::adapters::PushSender;
use crate::error::NotificationError;
use crate::gateway::PushActions;
use crate::types::{
    DEFAULT_ICON, DEFAULT_PUSH_TITLE, DeliveryReport, PushPayload, PushPayloadData,
    PushSubscription, RawPushSubscription,
};
use crate::vapid::VapidCredentials;

/// Presentation fields stamped on every outgoing payload
#[derive(Debug, Clone)]
pub struct PayloadTemplate {
    pub title: String,
    pub icon: String,
    pub badge: String,
    pub url: String,
}

impl Default for PayloadTemplate {
    fn default() -> Self {
        Self {
            title: DEFAULT_PUSH_TITLE.to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            url: "/".to_string(),
        }
    }
}

impl PayloadTemplate {
    pub fn render(&self, message: &str, now: OffsetDateTime) -> PushPayload {
        PushPayload {
            title: self.title.clone(),
            body: message.to_string(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            data: PushPayloadData {
                url: self.url.clone(),
                timestamp: (now.unix_timestamp_nanos() / 1_000_000) as i64,
            },
        }
    }
}

/// Subscriptions keyed by endpoint. One instance per process, shared via `Arc`.
pub struct PushSubscriptionRegistry {
    vapid: Option<VapidCredentials>,
    sender: Arc<dyn PushSender>,
    template: PayloadTemplate,
    subscriptions: RwLock<Vec<PushSubscription>>,
}

impl PushSubscriptionRegistry {
    pub fn new(vapid: Option<VapidCredentials>, sender: Arc<dyn PushSender>) -> Self {
        Self {
            vapid,
            sender,
            template: PayloadTemplate::default(),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn with_template(mut self, template: PayloadTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.vapid.is_some()
    }

    /// VAPID public key handed to browsers as `applicationServerKey`
    pub fn public_key(&self) -> Option<&str> {
        self.vapid.as_ref().map(|v| v.public_key.as_str())
    }

    /// Add or replace the record for this endpoint.
    pub fn subscribe(&self, raw: &RawPushSubscription) -> Result<(), NotificationError> {
        if self.vapid.is_none() {
            return Err(NotificationError::not_configured());
        }

        let subscription = raw.normalize();
        let mut subscriptions = self.subscriptions.write();
        match subscriptions
            .iter_mut()
            .find(|s| s.endpoint == subscription.endpoint)
        {
            Some(existing) => {
                *existing = subscription;
                info!(endpoint = %raw.endpoint, "Push subscription replaced");
            }
            None => {
                subscriptions.push(subscription);
                info!(endpoint = %raw.endpoint, total = subscriptions.len(), "Push subscription added");
            }
        }
        Ok(())
    }

    /// Idempotent removal by endpoint.
    pub fn unsubscribe(&self, raw: &RawPushSubscription) {
        let removed = self.remove_endpoint(&raw.endpoint);
        if removed {
            info!(endpoint = %raw.endpoint, "Push subscription removed");
        }
    }

    /// Deliver `message` to every subscription concurrently. Subscriptions
    /// whose delivery fails are dropped unless they were replaced meanwhile.
    pub async fn send_to_all(&self, message: &str) -> Result<DeliveryReport, NotificationError> {
        let vapid = self
            .vapid
            .as_ref()
            .ok_or_else(NotificationError::not_configured)?;

        let targets = self.subscriptions();
        if targets.is_empty() {
            return Err(NotificationError::NoSubscriptions);
        }

        let payload = self.template.render(message, OffsetDateTime::now_utc());
        let body = serde_json::to_vec(&payload)
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let sends = targets.iter().map(|subscription| {
            let body = &body;
            async move {
                let result = self.sender.send(vapid, subscription, body).await;
                if let Err(ref e) = result {
                    warn!(
                        endpoint = %subscription.endpoint,
                        error = %e,
                        "Push delivery failed, dropping subscription"
                    );
                    self.remove_record(subscription);
                }
                result.is_ok()
            }
        });

        let outcomes = join_all(sends).await;
        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = DeliveryReport {
            delivered,
            failed: outcomes.len() - delivered,
        };

        if report.failed > 0 {
            warn!(
                delivered = report.delivered,
                failed = report.failed,
                "Push fan-out finished with failures"
            );
        } else {
            info!(delivered = report.delivered, "Push fan-out finished");
        }
        Ok(report)
    }

    pub fn subscriptions(&self) -> Vec<PushSubscription> {
        self.subscriptions.read().clone()
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.subscriptions.read().iter().any(|s| s.endpoint == endpoint)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }

    fn remove_endpoint(&self, endpoint: &str) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.endpoint != endpoint);
        subscriptions.len() != before
    }

    fn remove_record(&self, subscription: &PushSubscription) {
        self.subscriptions.write().retain(|s| s != subscription);
    }
}

#[async_trait]
impl PushActions for PushSubscriptionRegistry {
    async fn subscribe_user(
        &self,
        subscription: &RawPushSubscription,
    ) -> Result<(), NotificationError> {
        self.subscribe(subscription)
    }

    async fn unsubscribe_user(
        &self,
        subscription: &RawPushSubscription,
    ) -> Result<(), NotificationError> {
        self.unsubscribe(subscription);
        Ok(())
    }

    async fn send_notification(&self, message: &str) -> Result<DeliveryReport, NotificationError> {
        self.send_to_all(message).await
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{OnceLock, Weak};

    use super::testing::*;
    use super::*;

    fn registry(sender: ScriptedSender) -> (PushSubscriptionRegistry, Arc<ScriptedSender>) {
        let sender = Arc::new(sender);
        (
            PushSubscriptionRegistry::new(Some(credentials()), sender.clone()),
            sender,
        )
    }

    #[test]
    fn test_subscribe_replaces_same_endpoint() {
        let (registry, _) = registry(ScriptedSender::default());
        registry.subscribe(&raw("https://push/a", "k1", "a1")).unwrap();
        registry.subscribe(&raw("https://push/b", "k2", "a2")).unwrap();
        registry.subscribe(&raw("https://push/a", "k3", "a3")).unwrap();

        let subs = registry.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].endpoint, "https://push/a");
        assert_eq!(subs[0].keys.p256dh, "k3");
        assert_eq!(subs[0].keys.auth, "a3");
    }

    #[test]
    fn test_subscribe_without_vapid_leaves_state_untouched() {
        let registry =
            PushSubscriptionRegistry::new(None, Arc::new(ScriptedSender::default()));
        let err = registry.subscribe(&raw("https://push/a", "k", "a")).unwrap_err();
        assert_eq!(err, NotificationError::not_configured());
        assert!(err.to_string().starts_with("Push notifications not configured"));
        assert!(registry.is_empty());
        assert!(!registry.is_configured());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let (registry, _) = registry(ScriptedSender::default());
        registry.subscribe(&raw("https://push/a", "k", "a")).unwrap();
        registry.unsubscribe(&raw("https://push/missing", "", ""));
        assert_eq!(registry.len(), 1);
        registry.unsubscribe(&raw("https://push/a", "", ""));
        registry.unsubscribe(&raw("https://push/a", "", ""));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_all_requires_subscriptions() {
        let (registry, _) = registry(ScriptedSender::default());
        assert_eq!(
            registry.send_to_all("hello").await,
            Err(NotificationError::NoSubscriptions)
        );
    }

    #[tokio::test]
    async fn test_send_to_all_without_vapid() {
        let registry =
            PushSubscriptionRegistry::new(None, Arc::new(ScriptedSender::default()));
        assert!(matches!(
            registry.send_to_all("hello").await,
            Err(NotificationError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_deliveries_are_pruned() {
        let (registry, sender) = registry(ScriptedSender::failing(&[
            "https://push/2",
            "https://push/4",
        ]));
        for i in 1..=5 {
            registry
                .subscribe(&raw(&format!("https://push/{i}"), "k", "a"))
                .unwrap();
        }

        let report = registry.send_to_all("hello").await.unwrap();
        assert_eq!(report, DeliveryReport { delivered: 3, failed: 2 });
        assert_eq!(registry.len(), 3);
        assert!(!registry.contains("https://push/2"));
        assert!(!registry.contains("https://push/4"));
        assert_eq!(sender.delivered.lock().len(), 3);
    }

    /// Re-subscribes the endpoint with fresh keys while its old record fails.
    struct ResubscribingSender {
        registry: OnceLock<Weak<PushSubscriptionRegistry>>,
    }

    #[async_trait]
    impl PushSender for ResubscribingSender {
        async fn send(
            &self,
            _vapid: &VapidCredentials,
            subscription: &PushSubscription,
            _payload: &[u8],
        ) -> Result<(), NotificationError> {
            let registry = self.registry.get().and_then(Weak::upgrade).unwrap();
            registry
                .subscribe(&raw(&subscription.endpoint, "fresh-key", "fresh-auth"))
                .unwrap();
            Err(NotificationError::DeliveryFailed("410 Gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_fresh_resubscription() {
        let sender = Arc::new(ResubscribingSender {
            registry: OnceLock::new(),
        });
        let registry = Arc::new(PushSubscriptionRegistry::new(
            Some(credentials()),
            sender.clone(),
        ));
        sender.registry.set(Arc::downgrade(&registry)).unwrap();
        registry.subscribe(&raw("https://push/a", "stale-key", "stale-auth")).unwrap();

        let report = registry.send_to_all("hello").await.unwrap();
        assert_eq!(report, DeliveryReport { delivered: 0, failed: 1 });

        let subs = registry.subscriptions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].endpoint, "https://push/a");
        assert_eq!(subs[0].keys.p256dh, "fresh-key");
        assert_eq!(subs[0].keys.auth, "fresh-auth");
    }

    #[tokio::test]
    async fn test_payload_shape() {
        let (registry, sender) = registry(ScriptedSender::default());
        registry.subscribe(&raw("https://push/a", "k", "a")).unwrap();

        registry.send_notification("Reminder: ping").await.unwrap();

        let delivered = sender.delivered.lock();
        let payload = &delivered[0].1;
        assert_eq!(payload["title"], "PWA Notification");
        assert_eq!(payload["body"], "Reminder: ping");
        assert_eq!(payload["icon"], "/icons/icon-192.svg");
        assert_eq!(payload["badge"], "/icons/icon-192.svg");
        assert_eq!(payload["data"]["url"], "/");
        assert!(payload["data"]["timestamp"].as_i64().unwrap() > 0);
    }
}
