pub mod channels;
pub mod notification;

pub use channels::{
    EventConsumer, EventProducer, TriggerConsumer, TriggerProducer, create_event_channel,
    create_trigger_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
