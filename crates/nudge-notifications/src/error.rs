use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned whenever VAPID credentials are missing.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Push notifications not configured. Set VAPID environment variables.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("{0}")]
    Unsupported(String),

    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("{0}")]
    NotConfigured(String),

    #[error("No active subscriptions")]
    NoSubscriptions,

    #[error("{0}")]
    DeliveryFailed(String),

    #[error("{0}")]
    NotFound(String),
}

/// Wire tag for each error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Unsupported,
    PermissionDenied,
    NotConfigured,
    NoSubscriptions,
    DeliveryFailed,
    NotFound,
}

impl NotificationError {
    pub fn not_configured() -> Self {
        Self::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::NoSubscriptions => ErrorKind::NoSubscriptions,
            Self::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::PermissionDenied => "permission-denied",
            Self::NotConfigured => "not-configured",
            Self::NoSubscriptions => "no-subscriptions",
            Self::DeliveryFailed => "delivery-failed",
            Self::NotFound => "not-found",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
