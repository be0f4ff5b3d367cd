// Notifications surfaced to the UI alongside transport events

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Sample,
    Transport,
    Config,
}

/// Notification stamped with transport clock time
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    pub timestamp_ms: f64,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        category: NotificationCategory,
        message: String,
        timestamp_ms: f64,
    ) -> Self {
        Self {
            level,
            category,
            message,
            timestamp_ms,
        }
    }

    pub fn info(category: NotificationCategory, message: String, timestamp_ms: f64) -> Self {
        Self::new(NotificationLevel::Info, category, message, timestamp_ms)
    }

    pub fn warning(category: NotificationCategory, message: String, timestamp_ms: f64) -> Self {
        Self::new(NotificationLevel::Warning, category, message, timestamp_ms)
    }

    pub fn error(category: NotificationCategory, message: String, timestamp_ms: f64) -> Self {
        Self::new(NotificationLevel::Error, category, message, timestamp_ms)
    }

    /// Check whether the notification is younger than `max_age_ms`
    pub fn is_recent(&self, now_ms: f64, max_age_ms: f64) -> bool {
        now_ms - self.timestamp_ms < max_age_ms
    }
}
