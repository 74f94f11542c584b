pub mod adapters;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod registry;
pub mod scheduler;
pub mod types;
pub mod vapid;
pub mod worker;

pub use adapters::{PushSender, RemotePushActions, WebPushAdapter};
pub use error::{ErrorKind, NotificationError};
pub use gateway::{NotificationGateway, NotificationGatewayBuilder, PushActions};
pub use registry::{PayloadTemplate, PushSubscriptionRegistry};
pub use scheduler::{ReminderScheduler, ReminderSubscription};
pub use types::*;
pub use vapid::{VapidCredentials, VapidKeys};
