pub mod incident;
pub mod publisher;

// Re-export key types for convenience
pub use incident::{ConfigurationType, ErrorCode, IncidentLog, Severity};
pub use publisher::{BroadcastNotificationSink, TracingNotificationSink};

use std::sync::Arc;

/// Receiver of incident logs.
///
/// Logging is fire-and-forget: it never fails and never blocks a step's outcome.
pub trait NotificationSink: Send + Sync {
    fn log(&self, entry: IncidentLog);
}

/// Sends every incident to each wrapped sink in turn
#[derive(Clone, Default)]
pub struct FanOutNotificationSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanOutNotificationSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanOutNotificationSink {
    fn log(&self, entry: IncidentLog) {
        for sink in &self.sinks {
            sink.log(entry.clone());
        }
    }
}
