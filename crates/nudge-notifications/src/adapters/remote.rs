use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

use crate::error::NotificationError;
use crate::gateway::PushActions;
use crate::types::{ActionResult, DeliveryReport, RawPushSubscription};

/// Calls the server actions over HTTP.
pub struct RemotePushActions {
    http_client: Client,
    base_url: String,
}

impl RemotePushActions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<ActionResult, NotificationError> {
        let url = format!("{}/api/push/{}", self.base_url, action);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        // error statuses still carry an ActionResult body
        let result: ActionResult = response.json().await.map_err(|e| {
            NotificationError::DeliveryFailed(format!("Invalid response from {url} ({status}): {e}"))
        })?;
        result.into_result()
    }
}

#[async_trait]
impl PushActions for RemotePushActions {
    async fn subscribe_user(
        &self,
        subscription: &RawPushSubscription,
    ) -> Result<(), NotificationError> {
        self.call("subscribe", subscription).await.map(|_| ())
    }

    async fn unsubscribe_user(
        &self,
        subscription: &RawPushSubscription,
    ) -> Result<(), NotificationError> {
        self.call("unsubscribe", subscription).await.map(|_| ())
    }

    async fn send_notification(&self, message: &str) -> Result<DeliveryReport, NotificationError> {
        let result = self.call("send", &json!({ "message": message })).await?;
        Ok(result.report.unwrap_or_default())
    }
}
