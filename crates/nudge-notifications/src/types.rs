use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ErrorKind, NotificationError};

/// Icon used when a notification does not carry its own
pub const DEFAULT_ICON: &str = "/icons/icon-192.svg";

/// Title shown for push messages
pub const DEFAULT_PUSH_TITLE: &str = "PWA Notification";

/// Notification permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Default,
    Granted,
    Denied,
}

/// Action button attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// Caller-facing notification request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub require_interaction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Only honoured by the service-worker channel
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

impl NotificationOptions {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_vibrate(mut self, pattern: Vec<u32>) -> Self {
        self.vibrate = Some(pattern);
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Fully resolved options handed to the platform for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub vibrate: Option<Vec<u32>>,
    pub data: Option<serde_json::Value>,
    pub actions: Vec<NotificationAction>,
}

/// Encryption material of a push subscription (base64url strings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Canonical push subscription record, unique by `endpoint`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

impl PushSubscription {
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys: PushKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
            },
        }
    }
}

/// Subscription as serialized by the browser (`PushSubscription.toJSON()`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPushSubscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<RawPushKeys>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPushKeys {
    #[serde(default)]
    pub p256dh: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
}

impl RawPushSubscription {
    /// Missing keys become empty strings.
    pub fn normalize(&self) -> PushSubscription {
        let keys = self.keys.clone().unwrap_or_default();
        PushSubscription {
            endpoint: self.endpoint.clone(),
            keys: PushKeys {
                p256dh: keys.p256dh.unwrap_or_default(),
                auth: keys.auth.unwrap_or_default(),
            },
        }
    }
}

impl From<&PushSubscription> for RawPushSubscription {
    fn from(sub: &PushSubscription) -> Self {
        Self {
            endpoint: sub.endpoint.clone(),
            expiration_time: None,
            keys: Some(RawPushKeys {
                p256dh: Some(sub.keys.p256dh.clone()),
                auth: Some(sub.keys.auth.clone()),
            }),
        }
    }
}

/// JSON body of every push message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: PushPayloadData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayloadData {
    pub url: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// Outcome of a fan-out send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// `{success, error?, message?}` body exchanged with the server actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<DeliveryReport>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: &NotificationError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            ..Default::default()
        }
    }

    pub fn with_report(mut self, report: DeliveryReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Convert back into a typed result, recovering the error variant from `kind`.
    pub fn into_result(self) -> Result<Self, NotificationError> {
        if self.success {
            return Ok(self);
        }
        let text = self.error.unwrap_or_else(|| "Unknown error".to_string());
        Err(match self.kind {
            Some(ErrorKind::Unsupported) => NotificationError::Unsupported(text),
            Some(ErrorKind::PermissionDenied) => NotificationError::PermissionDenied,
            Some(ErrorKind::NotConfigured) => NotificationError::NotConfigured(text),
            Some(ErrorKind::NoSubscriptions) => NotificationError::NoSubscriptions,
            Some(ErrorKind::NotFound) => NotificationError::NotFound(text),
            Some(ErrorKind::DeliveryFailed) | None => NotificationError::DeliveryFailed(text),
        })
    }
}

/// A pending reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub delay_seconds: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
}

/// Request to create a reminder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderOptions {
    pub message: String,
    pub delay_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ReminderOptions {
    pub fn new(message: impl Into<String>, delay_seconds: i64) -> Self {
        Self {
            message: message.into(),
            delay_seconds,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fills_missing_keys() {
        let raw: RawPushSubscription = serde_json::from_value(serde_json::json!({
            "endpoint": "https://push.example.com/abc",
            "expirationTime": null
        }))
        .unwrap();
        let sub = raw.normalize();
        assert_eq!(sub.endpoint, "https://push.example.com/abc");
        assert_eq!(sub.keys, PushKeys::default());
    }

    #[test]
    fn test_normalize_browser_subscription() {
        let raw: RawPushSubscription = serde_json::from_value(serde_json::json!({
            "endpoint": "https://push.example.com/abc",
            "keys": { "p256dh": "BKey", "auth": "secret" }
        }))
        .unwrap();
        let sub = raw.normalize();
        assert_eq!(sub.keys.p256dh, "BKey");
        assert_eq!(sub.keys.auth, "secret");
    }

    #[test]
    fn test_push_payload_wire_shape() {
        let payload = PushPayload {
            title: DEFAULT_PUSH_TITLE.to_string(),
            body: "Reminder: ping".to_string(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_ICON.to_string(),
            data: PushPayloadData {
                url: "/".to_string(),
                timestamp: 1_700_000_000_000,
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["title"], "PWA Notification");
        assert_eq!(value["data"]["url"], "/");
        assert_eq!(value["data"]["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_action_result_recovers_error_kind() {
        let wire = ActionResult::failure(&NotificationError::not_configured());
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "not-configured");

        let back: ActionResult = serde_json::from_value(json).unwrap();
        assert!(matches!(
            back.into_result(),
            Err(NotificationError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_action_result_without_kind_is_delivery_failure() {
        let wire = ActionResult {
            success: false,
            error: Some("Failed to send notifications".to_string()),
            ..Default::default()
        };
        assert_eq!(
            wire.into_result(),
            Err(NotificationError::DeliveryFailed(
                "Failed to send notifications".to_string()
            ))
        );
    }
}
