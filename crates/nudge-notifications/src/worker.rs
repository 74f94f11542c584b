//! Service worker `push` and `notificationclick` handling.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::NotificationError;
use crate::platform::{ServiceWorkerRegistration, WindowClients};
use crate::types::{DEFAULT_ICON, DEFAULT_PUSH_TITLE, DisplayOptions, NotificationAction};

pub const NOTIFICATION_TAG: &str = "pwa-notification";
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Action id that dismisses without opening anything
pub const CLOSE_ACTION: &str = "close";
pub const OPEN_ACTION: &str = "open";

#[derive(Debug, Default, Deserialize)]
struct IncomingPush {
    title: Option<String>,
    #[serde(default)]
    body: String,
    icon: Option<String>,
    badge: Option<String>,
    data: Option<Value>,
}

/// Title plus options ready for `registration.showNotification`
#[derive(Debug, Clone, PartialEq)]
pub struct PushDisplay {
    pub title: String,
    pub options: DisplayOptions,
}

/// Turn a push message body into a display request. An empty body yields
/// nothing to display.
pub fn push_display(data: Option<&[u8]>) -> Result<Option<PushDisplay>, NotificationError> {
    let Some(bytes) = data.filter(|b| !b.is_empty()) else {
        return Ok(None);
    };

    let incoming: IncomingPush = serde_json::from_slice(bytes)
        .map_err(|e| NotificationError::DeliveryFailed(format!("Invalid push payload: {e}")))?;

    Ok(Some(PushDisplay {
        title: incoming
            .title
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
        options: DisplayOptions {
            body: incoming.body,
            icon: incoming
                .icon
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: incoming
                .badge
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            tag: Some(NOTIFICATION_TAG.to_string()),
            require_interaction: false,
            vibrate: Some(VIBRATE_PATTERN.to_vec()),
            data: Some(incoming.data.unwrap_or_else(|| json!({ "url": "/" }))),
            actions: vec![
                NotificationAction::new(OPEN_ACTION, "Open App"),
                NotificationAction::new(CLOSE_ACTION, "Close"),
            ],
        },
    }))
}

/// `push` event: show the message through the registration. Returns whether
/// anything was displayed.
pub async fn handle_push(
    registration: &dyn ServiceWorkerRegistration,
    data: Option<&[u8]>,
) -> Result<bool, NotificationError> {
    let Some(display) = push_display(data)? else {
        debug!("Push event without data, nothing to show");
        return Ok(false);
    };

    registration
        .show_notification(&display.title, &display.options)
        .await
        .map_err(NotificationError::DeliveryFailed)?;
    Ok(true)
}

/// What a notification click ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Dismissed,
    Focused(String),
    Opened(String),
}

/// `notificationclick` event. Focuses the window sitting at the worker scope,
/// otherwise opens `data.url` (or `/`).
pub async fn handle_notification_click(
    action: Option<&str>,
    data: Option<&Value>,
    scope: &str,
    clients: &dyn WindowClients,
) -> Result<ClickOutcome, NotificationError> {
    if action == Some(CLOSE_ACTION) {
        return Ok(ClickOutcome::Dismissed);
    }

    for client in clients.match_all().await {
        let url = client.url();
        if url != scope {
            continue;
        }
        match client.focus().await {
            Ok(()) => return Ok(ClickOutcome::Focused(url)),
            Err(e) => warn!(url = %url, error = %e, "Failed to focus window"),
        }
    }

    let target = data
        .and_then(|d| d.get("url"))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .unwrap_or("/");
    clients
        .open_window(target)
        .await
        .map_err(NotificationError::DeliveryFailed)?;
    Ok(ClickOutcome::Opened(target.to_string()))
}
