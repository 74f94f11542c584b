//! Uniform front door over the three delivery channels: native
//! notifications, service-worker notifications and push via the server
//! actions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::NotificationError;
use crate::platform::{NotificationApi, ServiceWorkerApi};
use crate::types::{
    DEFAULT_ICON, DeliveryReport, DisplayOptions, NotificationOptions, Permission,
    PushSubscription, RawPushSubscription,
};
use crate::vapid::decode_application_server_key;

/// Script and scope used when registering the service worker
pub const SERVICE_WORKER_SCRIPT: &str = "/sw.js";
pub const SERVICE_WORKER_SCOPE: &str = "/";

/// Server-side actions reachable from the client
#[async_trait]
pub trait PushActions: Send + Sync {
    async fn subscribe_user(&self, subscription: &RawPushSubscription)
        -> Result<(), NotificationError>;

    async fn unsubscribe_user(
        &self,
        subscription: &RawPushSubscription,
    ) -> Result<(), NotificationError>;

    /// Fan `message` out to every registered subscription
    async fn send_notification(&self, message: &str) -> Result<DeliveryReport, NotificationError>;
}

pub struct NotificationGateway {
    actions: Arc<dyn PushActions>,
    notifications: Option<Arc<dyn NotificationApi>>,
    service_worker: Option<Arc<dyn ServiceWorkerApi>>,
    vapid_public_key: Option<String>,
    default_icon: String,
    default_badge: String,
}

pub struct NotificationGatewayBuilder {
    actions: Arc<dyn PushActions>,
    notifications: Option<Arc<dyn NotificationApi>>,
    service_worker: Option<Arc<dyn ServiceWorkerApi>>,
    vapid_public_key: Option<String>,
    default_icon: String,
    default_badge: String,
}

impl NotificationGatewayBuilder {
    pub fn with_notification_api(mut self, api: Arc<dyn NotificationApi>) -> Self {
        self.notifications = Some(api);
        self
    }

    pub fn with_service_worker(mut self, api: Arc<dyn ServiceWorkerApi>) -> Self {
        self.service_worker = Some(api);
        self
    }

    pub fn with_vapid_public_key(mut self, key: impl Into<String>) -> Self {
        self.vapid_public_key = Some(key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_default_icon(mut self, icon: impl Into<String>) -> Self {
        self.default_icon = icon.into();
        self
    }

    pub fn with_default_badge(mut self, badge: impl Into<String>) -> Self {
        self.default_badge = badge.into();
        self
    }

    pub fn build(self) -> NotificationGateway {
        NotificationGateway {
            actions: self.actions,
            notifications: self.notifications,
            service_worker: self.service_worker,
            vapid_public_key: self.vapid_public_key,
            default_icon: self.default_icon,
            default_badge: self.default_badge,
        }
    }
}

impl NotificationGateway {
    pub fn builder(actions: Arc<dyn PushActions>) -> NotificationGatewayBuilder {
        NotificationGatewayBuilder {
            actions,
            notifications: None,
            service_worker: None,
            vapid_public_key: None,
            default_icon: DEFAULT_ICON.to_string(),
            default_badge: DEFAULT_ICON.to_string(),
        }
    }

    /// Gateway with the push channel only (no browser runtime)
    pub fn push_only(actions: Arc<dyn PushActions>) -> Self {
        Self::builder(actions).build()
    }

    pub fn is_push_supported(&self) -> bool {
        self.service_worker
            .as_ref()
            .is_some_and(|sw| sw.push_supported())
    }

    pub async fn request_permission(&self) -> Result<Permission, NotificationError> {
        let api = self.notification_api()?;
        Ok(api.request_permission().await)
    }

    /// Display through the page-level Notification API.
    pub async fn send_local_notification(
        &self,
        options: &NotificationOptions,
    ) -> Result<(), NotificationError> {
        let api = self.notification_api()?;

        if api.permission() != Permission::Granted
            && api.request_permission().await != Permission::Granted
        {
            return Err(NotificationError::PermissionDenied);
        }

        let mut display = self.display_options(options);
        // actions are a service-worker feature
        display.actions.clear();
        if !api.supports_vibration() {
            display.vibrate = None;
        }

        api.show(&options.title, &display).map_err(|e| {
            warn!(error = %e, "Failed to show local notification");
            NotificationError::DeliveryFailed(e)
        })
    }

    /// Display through the active service-worker registration. Waits for the
    /// registration to become ready.
    pub async fn send_service_worker_notification(
        &self,
        options: &NotificationOptions,
    ) -> Result<(), NotificationError> {
        let sw = self.service_worker_api()?;
        let registration = sw.ready().await;

        let mut display = self.display_options(options);
        display.require_interaction = false;

        registration
            .show_notification(&options.title, &display)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to show service worker notification");
                NotificationError::DeliveryFailed(e)
            })
    }

    /// Ask the server to push `message` (prefixed with `title`) to every
    /// subscriber.
    pub async fn send_push_notification(
        &self,
        message: &str,
        title: Option<&str>,
    ) -> Result<DeliveryReport, NotificationError> {
        let full_message = match title {
            Some(title) => format!("{title}: {message}"),
            None => message.to_string(),
        };

        let report = self.actions.send_notification(&full_message).await?;
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Push notification sent"
        );
        Ok(report)
    }

    pub async fn current_push_subscription(
        &self,
    ) -> Result<Option<PushSubscription>, NotificationError> {
        let sw = self.service_worker_api()?;
        let registration = sw.ready().await;
        registration
            .push_subscription()
            .await
            .map_err(NotificationError::DeliveryFailed)
    }

    /// Full opt-in flow: permission, worker registration, browser
    /// subscription, then registration with the server.
    pub async fn subscribe_to_push(&self) -> Result<PushSubscription, NotificationError> {
        if !self.is_push_supported() {
            return Err(NotificationError::Unsupported(
                "Push notifications not supported".to_string(),
            ));
        }
        let sw = self.service_worker_api()?;

        if self.request_permission().await? != Permission::Granted {
            return Err(NotificationError::PermissionDenied);
        }

        if let Err(e) = sw.register(SERVICE_WORKER_SCRIPT, SERVICE_WORKER_SCOPE).await {
            warn!(error = %e, "Service worker registration failed");
            return Err(NotificationError::DeliveryFailed(
                "Service worker registration failed".to_string(),
            ));
        }

        let public_key = self.vapid_public_key.as_deref().ok_or_else(|| {
            NotificationError::NotConfigured("VAPID public key not configured".to_string())
        })?;
        let server_key = decode_application_server_key(public_key)?;

        let registration = sw.ready().await;
        let subscription = registration
            .push_subscribe(&server_key)
            .await
            .map_err(NotificationError::DeliveryFailed)?;

        self.actions
            .subscribe_user(&RawPushSubscription::from(&subscription))
            .await?;

        Ok(subscription)
    }

    pub async fn unsubscribe_from_push(&self) -> Result<(), NotificationError> {
        let subscription = self
            .current_push_subscription()
            .await?
            .ok_or_else(|| NotificationError::NotFound("No active subscription".to_string()))?;

        let sw = self.service_worker_api()?;
        sw.ready()
            .await
            .push_unsubscribe()
            .await
            .map_err(NotificationError::DeliveryFailed)?;

        self.actions
            .unsubscribe_user(&RawPushSubscription::from(&subscription))
            .await
    }

    fn notification_api(&self) -> Result<&Arc<dyn NotificationApi>, NotificationError> {
        self.notifications.as_ref().ok_or_else(|| {
            NotificationError::Unsupported("Browser notifications not supported".to_string())
        })
    }

    fn service_worker_api(&self) -> Result<&Arc<dyn ServiceWorkerApi>, NotificationError> {
        self.service_worker.as_ref().ok_or_else(|| {
            NotificationError::Unsupported("Service workers not supported".to_string())
        })
    }

    fn display_options(&self, options: &NotificationOptions) -> DisplayOptions {
        DisplayOptions {
            body: options.body.clone(),
            icon: options
                .icon
                .clone()
                .unwrap_or_else(|| self.default_icon.clone()),
            badge: options
                .badge
                .clone()
                .unwrap_or_else(|| self.default_badge.clone()),
            tag: options.tag.clone(),
            require_interaction: options.require_interaction,
            vibrate: options.vibrate.clone(),
            data: options.data.clone(),
            actions: options.actions.clone(),
        }
    }
}
