pub mod gateway;
pub mod inbox;
pub mod push;

pub use gateway::NotificationGateway;
pub use inbox::{InAppNotificationSink, InMemoryInbox, SupabaseInbox};
pub use push::{FcmPushClient, PushProvider};
