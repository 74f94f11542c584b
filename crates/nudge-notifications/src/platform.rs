//! Seams over the browser runtime.
//!
//! A host (WASM bindings, a desktop shell, a test double) implements these
//! traits; the gateway only talks to them through `Arc<dyn ...>`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{DisplayOptions, Permission, PushSubscription};

/// The page-level Notification API
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Current permission without prompting
    fn permission(&self) -> Permission;

    /// Prompt the user. May suspend until they answer.
    async fn request_permission(&self) -> Permission;

    /// Construct and display a notification
    fn show(&self, title: &str, options: &DisplayOptions) -> Result<(), String>;

    /// Whether the device can vibrate
    fn supports_vibration(&self) -> bool {
        true
    }
}

/// The service-worker container (`navigator.serviceWorker`)
#[async_trait]
pub trait ServiceWorkerApi: Send + Sync {
    /// Whether a push manager is exposed alongside the container
    fn push_supported(&self) -> bool;

    async fn register(&self, script_url: &str, scope: &str) -> Result<(), String>;

    /// Resolve once a registration is active. Never resolves if no worker
    /// is ever registered.
    async fn ready(&self) -> Arc<dyn ServiceWorkerRegistration>;
}

/// An active registration and its push manager
#[async_trait]
pub trait ServiceWorkerRegistration: Send + Sync {
    async fn show_notification(&self, title: &str, options: &DisplayOptions)
        -> Result<(), String>;

    async fn push_subscription(&self) -> Result<Option<PushSubscription>, String>;

    /// `pushManager.subscribe({ userVisibleOnly: true, applicationServerKey })`
    async fn push_subscribe(&self, application_server_key: &[u8])
        -> Result<PushSubscription, String>;

    async fn push_unsubscribe(&self) -> Result<bool, String>;
}

/// A controlled window, as listed by `clients.matchAll({ type: 'window' })`
#[async_trait]
pub trait WindowClient: Send + Sync {
    fn url(&self) -> String;

    async fn focus(&self) -> Result<(), String>;
}

/// The worker's `clients` object
#[async_trait]
pub trait WindowClients: Send + Sync {
    async fn match_all(&self) -> Vec<Arc<dyn WindowClient>>;

    async fn open_window(&self, url: &str) -> Result<(), String>;
}
