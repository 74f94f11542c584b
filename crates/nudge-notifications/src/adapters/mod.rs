pub mod push_service;
pub mod remote;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::PushSubscription;
use crate::vapid::VapidCredentials;

/// Delivers one encrypted push message to one subscription
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        vapid: &VapidCredentials,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), NotificationError>;
}

pub use remote::RemotePushActions;
pub use push_service::WebPushAdapter;
